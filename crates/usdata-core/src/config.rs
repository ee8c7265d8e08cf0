//! Gateway configuration: per-provider endpoints, timeouts and credentials.
//!
//! Credentials are resolved once, here, and handed to adapters already
//! resolved. Empty environment values count as absent.

use std::fmt::{Debug, Formatter};

use tracing::warn;

use crate::source::ProviderId;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const AIR_QUALITY_TIMEOUT_MS: u64 = 60_000;

pub const CENSUS_BASE_URL: &str = "https://api.census.gov/data";
pub const LABOR_BASE_URL: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";
pub const AIR_QUALITY_BASE_URL: &str = "https://aqs.epa.gov/data/api";
pub const DRUGS_BASE_URL: &str = "https://api.fda.gov";
pub const FILINGS_BASE_URL: &str = "https://data.sec.gov";

pub const FILINGS_DEFAULT_USER_AGENT: &str =
    "US-Data-MCP-SEC-Server/0.1.0 (Contact: user@example.com)";

/// Endpoint settings for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms,
            user_agent: user_agent.into(),
        }
    }

    pub fn defaults_for(provider: ProviderId) -> Self {
        match provider {
            ProviderId::Census => Self::new(
                CENSUS_BASE_URL,
                DEFAULT_TIMEOUT_MS,
                "US-Data-MCP-Census-Server/0.1.0",
            ),
            ProviderId::Labor => Self::new(
                LABOR_BASE_URL,
                DEFAULT_TIMEOUT_MS,
                "US-Data-MCP-BLS-Server/0.1.0",
            ),
            ProviderId::AirQuality => Self::new(
                AIR_QUALITY_BASE_URL,
                AIR_QUALITY_TIMEOUT_MS,
                "US-Data-MCP-EPA-Server/0.1.0",
            ),
            ProviderId::Drugs => Self::new(
                DRUGS_BASE_URL,
                DEFAULT_TIMEOUT_MS,
                "US-Data-MCP-FDA-Server/0.1.0",
            ),
            ProviderId::Filings => Self::new(
                FILINGS_BASE_URL,
                DEFAULT_TIMEOUT_MS,
                FILINGS_DEFAULT_USER_AGENT,
            ),
        }
    }

    /// Joins `path` onto the base URL with exactly one separating slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Already-resolved provider credentials. `Debug` never prints secret values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub census_api_key: Option<String>,
    pub bls_api_key: Option<String>,
    pub aqs_email: Option<String>,
    pub aqs_key: Option<String>,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn mask(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("Credentials")
            .field("census_api_key", &mask(&self.census_api_key))
            .field("bls_api_key", &mask(&self.bls_api_key))
            .field("aqs_email", &mask(&self.aqs_email))
            .field("aqs_key", &mask(&self.aqs_key))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub census: ProviderConfig,
    pub labor: ProviderConfig,
    pub air_quality: ProviderConfig,
    pub drugs: ProviderConfig,
    pub filings: ProviderConfig,
    pub credentials: Credentials,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            census: ProviderConfig::defaults_for(ProviderId::Census),
            labor: ProviderConfig::defaults_for(ProviderId::Labor),
            air_quality: ProviderConfig::defaults_for(ProviderId::AirQuality),
            drugs: ProviderConfig::defaults_for(ProviderId::Drugs),
            filings: ProviderConfig::defaults_for(ProviderId::Filings),
            credentials: Credentials::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self {
            credentials: Credentials {
                census_api_key: read("CENSUS_API_KEY"),
                bls_api_key: read("BLS_API_KEY"),
                aqs_email: read("EPA_AQS_EMAIL"),
                aqs_key: read("EPA_AQS_KEY"),
            },
            ..Self::default()
        };

        if let Some(user_agent) = read("SEC_USER_AGENT") {
            config.filings.user_agent = user_agent;
        }

        if let Some(raw) = read("USDATA_HTTP_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(timeout_ms) if timeout_ms > 0 => {
                    for provider in ProviderId::ALL {
                        config.provider_mut(provider).timeout_ms = timeout_ms;
                    }
                }
                _ => warn!(value = %raw, "ignoring invalid USDATA_HTTP_TIMEOUT_MS"),
            }
        }

        for provider in ProviderId::ALL {
            let name = format!(
                "USDATA_{}_BASE_URL",
                provider.as_str().to_ascii_uppercase()
            );
            if let Some(base_url) = read(&name) {
                config.provider_mut(provider).base_url = base_url;
            }
        }

        config
    }

    pub fn provider(&self, provider: ProviderId) -> &ProviderConfig {
        match provider {
            ProviderId::Census => &self.census,
            ProviderId::Labor => &self.labor,
            ProviderId::AirQuality => &self.air_quality,
            ProviderId::Drugs => &self.drugs,
            ProviderId::Filings => &self.filings,
        }
    }

    pub fn provider_mut(&mut self, provider: ProviderId) -> &mut ProviderConfig {
        match provider {
            ProviderId::Census => &mut self.census,
            ProviderId::Labor => &mut self.labor,
            ProviderId::AirQuality => &mut self.air_quality,
            ProviderId::Drugs => &mut self.drugs,
            ProviderId::Filings => &mut self.filings,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_base_url(mut self, provider: ProviderId, base_url: impl Into<String>) -> Self {
        self.provider_mut(provider).base_url = base_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_give_air_quality_a_longer_timeout() {
        let config = GatewayConfig::default();
        assert_eq!(config.air_quality.timeout_ms, AIR_QUALITY_TIMEOUT_MS);
        assert_eq!(config.census.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.credentials.census_api_key.is_none());
    }

    #[test]
    fn reads_credentials_and_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("CENSUS_API_KEY", "abc"),
            ("EPA_AQS_EMAIL", "  "),
            ("SEC_USER_AGENT", "research bot (ops@example.test)"),
            ("USDATA_FILINGS_BASE_URL", "http://localhost:9000"),
            ("USDATA_HTTP_TIMEOUT_MS", "1500"),
        ]));

        assert_eq!(config.credentials.census_api_key.as_deref(), Some("abc"));
        assert!(config.credentials.aqs_email.is_none());
        assert_eq!(config.filings.user_agent, "research bot (ops@example.test)");
        assert_eq!(config.filings.base_url, "http://localhost:9000");
        assert_eq!(config.air_quality.timeout_ms, 1_500);
    }

    #[test]
    fn invalid_timeout_keeps_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[("USDATA_HTTP_TIMEOUT_MS", "soon")]));
        assert_eq!(config.labor.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn endpoint_joins_with_single_slash() {
        let config = ProviderConfig::defaults_for(ProviderId::Filings);
        assert_eq!(
            config.endpoint("/files/company_tickers.json"),
            "https://data.sec.gov/files/company_tickers.json"
        );
    }

    #[test]
    fn debug_masks_secrets() {
        let credentials = Credentials {
            census_api_key: Some(String::from("super-secret")),
            ..Credentials::default()
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<set>"));
    }
}
