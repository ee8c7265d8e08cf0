use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Canonical provider identifiers used in metadata, logging and the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Census,
    Labor,
    AirQuality,
    Drugs,
    Filings,
}

impl ProviderId {
    pub const ALL: [Self; 5] = [
        Self::Census,
        Self::Labor,
        Self::AirQuality,
        Self::Drugs,
        Self::Filings,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Census => "census",
            Self::Labor => "labor",
            Self::AirQuality => "air_quality",
            Self::Drugs => "drugs",
            Self::Filings => "filings",
        }
    }

    /// Human-readable name of the upstream agency.
    pub const fn agency(self) -> &'static str {
        match self {
            Self::Census => "U.S. Census Bureau",
            Self::Labor => "Bureau of Labor Statistics",
            Self::AirQuality => "EPA Air Quality System",
            Self::Drugs => "FDA openFDA",
            Self::Filings => "SEC EDGAR",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "census" => Ok(Self::Census),
            "labor" | "bls" => Ok(Self::Labor),
            "air_quality" | "epa" | "aqs" => Ok(Self::AirQuality),
            "drugs" | "fda" => Ok(Self::Drugs),
            "filings" | "sec" | "edgar" => Ok(Self::Filings),
            other => Err(GatewayError::invalid_provider(other)),
        }
    }
}
