use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::adapters::fetch_json;
use crate::config::{GatewayConfig, ProviderConfig};
use crate::connection::{ClientFactory, LazyClient};
use crate::envelope::{into_map, Envelope, Row};
use crate::error::{GatewayError, GatewayResult};
use crate::http_client::HttpRequest;
use crate::provider::{unsupported, Provider, ProviderFuture};
use crate::reference::labor::{series_description, COMMON_SERIES};
use crate::registry::OperationSpec;
use crate::source::ProviderId;
use crate::validation::{ArgSchema, FieldSpec, ValidArgs};

const GET_SERIES_DATA: &str = "get_series_data";
const GET_COMMON_SERIES: &str = "get_common_series";

const NOT_PROCESSED: &str = "REQUEST_NOT_PROCESSED";
const UNKNOWN_API_ERROR: &str = "Unknown API error";
pub const MAX_SERIES_PER_REQUEST: usize = 50;

#[derive(Debug, Deserialize)]
struct SeriesRequest {
    series_ids: Vec<String>,
    start_year: Option<i64>,
    end_year: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SeriesPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Vec<Value>,
    #[serde(rename = "Results", default)]
    results: Option<SeriesResults>,
}

#[derive(Debug, Deserialize)]
struct SeriesResults {
    #[serde(default)]
    series: Vec<Row>,
}

impl SeriesPayload {
    fn messages(&self) -> Vec<String> {
        self.message
            .iter()
            .map(|message| match message {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

fn request_body(request: &SeriesRequest, registration_key: Option<&str>) -> Value {
    let mut body = Map::new();
    body.insert(String::from("seriesid"), json!(request.series_ids));
    if let Some(start_year) = request.start_year {
        body.insert(String::from("startyear"), Value::String(start_year.to_string()));
    }
    if let Some(end_year) = request.end_year {
        body.insert(String::from("endyear"), Value::String(end_year.to_string()));
    }
    if let Some(key) = registration_key {
        body.insert(String::from("registrationkey"), Value::String(key.to_owned()));
    }
    Value::Object(body)
}

fn annotate(mut series: Row) -> Row {
    let description = series
        .get("seriesID")
        .and_then(Value::as_str)
        .and_then(series_description);
    if let Some(description) = description {
        series.insert(
            String::from("description"),
            Value::String(description.to_owned()),
        );
    }
    series
}

/// Bureau of Labor Statistics public timeseries API adapter.
pub struct LaborAdapter {
    config: ProviderConfig,
    registration_key: Option<String>,
    client: LazyClient,
}

impl LaborAdapter {
    pub fn new(
        config: ProviderConfig,
        registration_key: Option<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            config,
            registration_key,
            client: LazyClient::new(ProviderId::Labor, factory),
        }
    }

    pub fn from_gateway_config(config: &GatewayConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self::new(
            config.labor.clone(),
            config.credentials.bls_api_key.clone(),
            factory,
        )
    }

    async fn get_series_data(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: SeriesRequest = args.decode()?;
        let metadata = into_map(json!({
            "series_ids": request.series_ids,
            "start_year": request.start_year,
            "end_year": request.end_year,
        }));
        let client = self.client.get().await?;

        let http_request = HttpRequest::post(self.config.base_url.clone())
            .with_json_body(&request_body(&request, self.registration_key.as_deref()))
            .with_timeout_ms(self.config.timeout_ms);

        let payload: SeriesPayload = fetch_json(client.as_ref(), ProviderId::Labor, http_request)
            .await
            .map_err(|e| e.with_metadata(metadata.clone()))?;

        let messages = payload.messages();
        if payload.status.as_deref() == Some(NOT_PROCESSED) {
            let reason = messages
                .first()
                .cloned()
                .unwrap_or_else(|| String::from(UNKNOWN_API_ERROR));
            warn!(provider = %ProviderId::Labor, reason = %reason, "series request not processed");
            return Err(GatewayError::application(reason).with_metadata(metadata));
        }

        let data: Vec<Row> = payload
            .results
            .map(|results| results.series)
            .unwrap_or_default()
            .into_iter()
            .map(annotate)
            .collect();

        let mut metadata = metadata;
        metadata.insert(
            String::from("status"),
            Value::String(payload.status.unwrap_or_else(|| String::from("OK"))),
        );
        metadata.insert(String::from("message"), json!(messages));
        metadata.insert(String::from("count"), Value::from(data.len()));
        Ok(Envelope::success(data, metadata))
    }

    fn get_common_series(&self) -> Envelope {
        let rows = COMMON_SERIES
            .entries()
            .iter()
            .map(|(series_id, description)| {
                into_map(json!({"series_id": series_id, "description": description}))
            })
            .collect::<Vec<_>>();
        let metadata = into_map(json!({"count": rows.len()}));
        Envelope::success(rows, metadata)
    }
}

impl Provider for LaborAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Labor
    }

    fn operations(&self) -> Vec<OperationSpec> {
        vec![
            OperationSpec::new(
                GET_SERIES_DATA,
                ProviderId::Labor,
                "Observations for one or more BLS series (unemployment, CPI, employment, wages).",
                ArgSchema::new()
                    .field(
                        FieldSpec::string_list(
                            "series_ids",
                            "BLS series identifiers, e.g. LNS14000000",
                            1,
                            MAX_SERIES_PER_REQUEST,
                        )
                        .required(),
                    )
                    .field(FieldSpec::integer("start_year", "First year of data", 1900, 2100))
                    .field(FieldSpec::integer("end_year", "Last year of data", 1900, 2100))
                    .ordered("start_year", "end_year"),
            ),
            OperationSpec::new(
                GET_COMMON_SERIES,
                ProviderId::Labor,
                "Reference list of frequently used BLS series identifiers.",
                ArgSchema::new(),
            ),
        ]
    }

    fn invoke<'a>(&'a self, operation: &'a str, args: ValidArgs) -> ProviderFuture<'a> {
        Box::pin(async move {
            match operation {
                GET_SERIES_DATA => self.get_series_data(args).await,
                GET_COMMON_SERIES => Ok(self.get_common_series()),
                other => Err(unsupported(ProviderId::Labor, other)),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_years_as_strings() {
        let request = SeriesRequest {
            series_ids: vec![String::from("LNS14000000")],
            start_year: Some(2020),
            end_year: None,
        };
        let body = request_body(&request, Some("k"));
        assert_eq!(
            body,
            json!({"seriesid": ["LNS14000000"], "startyear": "2020", "registrationkey": "k"})
        );
    }

    #[test]
    fn known_series_gain_description() {
        let row = annotate(into_map(json!({"seriesID": "CUUR0000SAF1", "data": []})));
        assert_eq!(row["description"], "CPI - Food");
        let row = annotate(into_map(json!({"seriesID": "XYZ"})));
        assert!(row.get("description").is_none());
    }
}
