use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::adapters::fetch_json;
use crate::config::{GatewayConfig, ProviderConfig};
use crate::connection::{ClientFactory, LazyClient};
use crate::envelope::{into_map, Envelope, Row};
use crate::error::{GatewayError, GatewayResult};
use crate::http_client::HttpRequest;
use crate::provider::{unsupported, Provider, ProviderFuture};
use crate::reference::air_quality::{param_description, COMMON_PARAMS};
use crate::registry::OperationSpec;
use crate::source::ProviderId;
use crate::validation::{ArgSchema, FieldSpec, ValidArgs};

const GET_DAILY_AIR_QUALITY: &str = "get_daily_air_quality";
const GET_COMMON_AQS_PARAMETERS: &str = "get_common_aqs_parameters";

const MISSING_CREDENTIALS: &str =
    "EPA AQS email and API key are required. Sign up at https://aqs.epa.gov/data/api/signup";
const UNKNOWN_AQS_ERROR: &str = "Unknown AQS error";

#[derive(Debug, Deserialize)]
struct DailyRequest {
    param_code: String,
    bdate: String,
    edate: String,
    state: String,
    county: Option<String>,
}

impl DailyRequest {
    /// County-scoped when a county filter is present, state-scoped otherwise.
    fn endpoint(&self) -> &'static str {
        if self.county.is_some() {
            "dailyData/byCounty"
        } else {
            "dailyData/byState"
        }
    }
}

#[derive(Debug, Deserialize)]
struct DailyPayload {
    #[serde(rename = "Header", default)]
    header: Vec<PayloadHeader>,
    #[serde(rename = "Data", default)]
    data: Vec<Row>,
}

#[derive(Debug, Default, Deserialize)]
struct PayloadHeader {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_msg: Option<Value>,
}

impl PayloadHeader {
    fn error_message(&self) -> String {
        match &self.error_msg {
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|item| item.as_str().map(str::to_owned).unwrap_or_else(|| item.to_string()))
                .collect::<Vec<_>>()
                .join("; "),
            _ => String::from(UNKNOWN_AQS_ERROR),
        }
    }
}

/// EPA Air Quality System adapter. Needs both a registered email and a key.
pub struct AirQualityAdapter {
    config: ProviderConfig,
    email: Option<String>,
    key: Option<String>,
    client: LazyClient,
}

impl AirQualityAdapter {
    pub fn new(
        config: ProviderConfig,
        email: Option<String>,
        key: Option<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            config,
            email,
            key,
            client: LazyClient::new(ProviderId::AirQuality, factory),
        }
    }

    pub fn from_gateway_config(config: &GatewayConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self::new(
            config.air_quality.clone(),
            config.credentials.aqs_email.clone(),
            config.credentials.aqs_key.clone(),
            factory,
        )
    }

    async fn get_daily_air_quality(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: DailyRequest = args.decode()?;
        let metadata = into_map(json!({
            "param": request.param_code,
            "state": request.state,
            "county": request.county,
            "bdate": request.bdate,
            "edate": request.edate,
        }));

        let (Some(email), Some(key)) = (self.email.as_deref(), self.key.as_deref()) else {
            return Err(GatewayError::precondition(MISSING_CREDENTIALS).with_metadata(metadata));
        };
        let client = self.client.get().await?;

        let mut http_request = HttpRequest::get(self.config.endpoint(request.endpoint()))
            .with_query("email", email)
            .with_query("key", key)
            .with_query("param", &request.param_code)
            .with_query("bdate", &request.bdate)
            .with_query("edate", &request.edate)
            .with_query("state", &request.state);
        if let Some(county) = &request.county {
            http_request = http_request.with_query("county", county);
        }
        let http_request = http_request.with_timeout_ms(self.config.timeout_ms);

        let payload: DailyPayload =
            fetch_json(client.as_ref(), ProviderId::AirQuality, http_request)
                .await
                .map_err(|e| e.with_metadata(metadata.clone()))?;

        let DailyPayload { header, data } = payload;
        let header = header.into_iter().next().unwrap_or_default();
        if header.status.as_deref() != Some("Success") {
            let reason = header.error_message();
            warn!(provider = %ProviderId::AirQuality, reason = %reason, "aqs rejected request");
            return Err(GatewayError::application(reason).with_metadata(metadata));
        }

        let mut metadata = metadata;
        metadata.insert(
            String::from("param_description"),
            Value::String(param_description(&request.param_code).to_owned()),
        );
        metadata.insert(String::from("count"), Value::from(data.len()));
        Ok(Envelope::success(data, metadata))
    }

    fn get_common_parameters(&self) -> Envelope {
        let rows = COMMON_PARAMS
            .entries()
            .iter()
            .map(|(code, description)| into_map(json!({"code": code, "description": description})))
            .collect::<Vec<_>>();
        let metadata = into_map(json!({"count": rows.len()}));
        Envelope::success(rows, metadata)
    }
}

impl Provider for AirQualityAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::AirQuality
    }

    fn operations(&self) -> Vec<OperationSpec> {
        vec![
            OperationSpec::new(
                GET_DAILY_AIR_QUALITY,
                ProviderId::AirQuality,
                "Daily pollutant summaries for a state or county over a date range.",
                ArgSchema::new()
                    .field(
                        FieldSpec::matching("param_code", "5-digit AQS parameter code, e.g. 88101", "^[0-9]{5}$")
                            .required(),
                    )
                    .field(FieldSpec::compact_date("bdate", "Begin date (YYYYMMDD)").required())
                    .field(FieldSpec::compact_date("edate", "End date (YYYYMMDD)").required())
                    .field(FieldSpec::matching("state", "2-digit state FIPS code", "^[0-9]{2}$").required())
                    .field(FieldSpec::matching("county", "3-digit county FIPS code", "^[0-9]{3}$"))
                    .ordered("bdate", "edate"),
            ),
            OperationSpec::new(
                GET_COMMON_AQS_PARAMETERS,
                ProviderId::AirQuality,
                "Reference list of common AQS pollutant parameter codes.",
                ArgSchema::new(),
            ),
        ]
    }

    fn invoke<'a>(&'a self, operation: &'a str, args: ValidArgs) -> ProviderFuture<'a> {
        Box::pin(async move {
            match operation {
                GET_DAILY_AIR_QUALITY => self.get_daily_air_quality(args).await,
                GET_COMMON_AQS_PARAMETERS => Ok(self.get_common_parameters()),
                other => Err(unsupported(ProviderId::AirQuality, other)),
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.client.is_ready()
    }

    fn release(&self) -> bool {
        self.client.release()
    }
}
