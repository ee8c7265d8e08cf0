use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::adapters::{ensure_success, fetch_json, parse_json, send};
use crate::config::{GatewayConfig, ProviderConfig};
use crate::connection::{ClientFactory, LazyClient};
use crate::envelope::{into_map, Envelope, Row};
use crate::error::GatewayResult;
use crate::http_client::HttpRequest;
use crate::provider::{unsupported, Provider, ProviderFuture};
use crate::reference::drugs::{
    classification_description, classification_query_value, COMMON_ADVERSE_REACTIONS,
    RECALL_CLASSIFICATIONS,
};
use crate::registry::OperationSpec;
use crate::source::ProviderId;
use crate::validation::{ArgSchema, FieldSpec, ValidArgs};

const SEARCH_DRUGS: &str = "search_drugs";
const SEARCH_DRUG_LABELS: &str = "search_drug_labels";
const SEARCH_RECALLS: &str = "search_recalls";
const SEARCH_ADVERSE_EVENTS: &str = "search_adverse_events";
const SEARCH_DEVICES: &str = "search_devices";
const SEARCH_ALL_RECALLS: &str = "search_all_recalls";
const GET_RECALL_CLASSIFICATIONS: &str = "get_recall_classifications";

const MAX_LIMIT: i64 = 100;
const NO_ADVERSE_EVENTS: &str = "No adverse events found for this drug";
const ADVERSE_EVENTS_NOTE: &str = "Data may include consumer and healthcare professional reports";
const CLASSIFICATION_USAGE: &str = "Use classification codes (I, II, III) in search_recalls";

const CLASSES: &[&str] = &["I", "II", "III"];
const RECALL_CATEGORIES: &[&str] = &["food", "device", "drug"];

#[derive(Debug, Deserialize)]
struct DrugRequest {
    brand_name: Option<String>,
    generic_name: Option<String>,
    application_number: Option<String>,
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct RecallRequest {
    product_description: Option<String>,
    classification: Option<String>,
    status: Option<String>,
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct AdverseEventRequest {
    drug_name: String,
    reaction: Option<String>,
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct DeviceRequest {
    device_name: String,
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct AllRecallsRequest {
    category: String,
    product_description: Option<String>,
    limit: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ResultsPayload {
    #[serde(default)]
    results: Vec<Row>,
}

/// Conjunctive openFDA `search` expression: `field:value+AND+field:value`.
#[derive(Debug, Default)]
struct SearchQuery {
    terms: Vec<(&'static str, String)>,
    echo: Map<String, Value>,
}

impl SearchQuery {
    fn new() -> Self {
        Self::default()
    }

    /// Adds `field:value` with the value percent-encoded; absent values are skipped.
    fn term(self, field: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(value) => {
                let encoded = urlencoding::encode(value).into_owned();
                self.push(field, value.to_owned(), encoded)
            }
            None => self,
        }
    }

    /// Adds a term whose value is already in the provider's encoding.
    fn raw_term(self, field: &'static str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.push(field, value.clone(), value),
            None => self,
        }
    }

    fn push(mut self, field: &'static str, shown: String, encoded: String) -> Self {
        self.echo.insert(field.to_owned(), Value::String(shown));
        self.terms.push((field, encoded));
        self
    }

    fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn render(&self) -> String {
        self.terms
            .iter()
            .map(|(field, value)| format!("{field}:{value}"))
            .collect::<Vec<_>>()
            .join("+AND+")
    }
}

fn annotate_classification(mut row: Row) -> Row {
    let description = row
        .get("classification")
        .and_then(Value::as_str)
        .and_then(classification_description);
    if let Some(description) = description {
        row.insert(
            String::from("classification_description"),
            Value::String(description.to_owned()),
        );
    }
    row
}

/// openFDA drug, device and enforcement adapter. No credentials required.
pub struct DrugsAdapter {
    config: ProviderConfig,
    client: LazyClient,
}

impl DrugsAdapter {
    pub fn new(config: ProviderConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            config,
            client: LazyClient::new(ProviderId::Drugs, factory),
        }
    }

    pub fn from_gateway_config(config: &GatewayConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self::new(config.drugs.clone(), factory)
    }

    fn build_request(&self, source: &str, query: &SearchQuery, limit: i64) -> HttpRequest {
        let mut request = HttpRequest::get(self.config.endpoint(&format!("{source}.json")));
        if !query.is_empty() {
            request = request.with_raw_query("search", query.render());
        }
        request
            .with_raw_query("limit", limit.min(MAX_LIMIT).to_string())
            .with_timeout_ms(self.config.timeout_ms)
    }

    async fn search(
        &self,
        source: &str,
        query: SearchQuery,
        limit: i64,
        annotate: bool,
    ) -> GatewayResult<Envelope> {
        let metadata = into_map(json!({"query": query.echo}));
        let client = self.client.get().await?;
        let request = self.build_request(source, &query, limit);

        let payload: ResultsPayload = fetch_json(client.as_ref(), ProviderId::Drugs, request)
            .await
            .map_err(|e| e.with_metadata(metadata.clone()))?;

        let data: Vec<Row> = if annotate {
            payload
                .results
                .into_iter()
                .map(annotate_classification)
                .collect()
        } else {
            payload.results
        };

        let mut metadata = metadata;
        metadata.insert(String::from("count"), Value::from(data.len()));
        metadata.insert(String::from("source"), Value::String(source.to_owned()));
        Ok(Envelope::success(data, metadata))
    }

    async fn search_drugs(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: DrugRequest = args.decode()?;
        let query = SearchQuery::new()
            .term("openfda.brand_name", request.brand_name.as_deref())
            .term("openfda.generic_name", request.generic_name.as_deref())
            .term("application_number", request.application_number.as_deref());
        self.search("drug/drugsfda", query, request.limit, false).await
    }

    async fn search_drug_labels(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: DrugRequest = args.decode()?;
        let query = SearchQuery::new()
            .term("openfda.brand_name", request.brand_name.as_deref())
            .term("openfda.generic_name", request.generic_name.as_deref());
        self.search("drug/label", query, request.limit, false).await
    }

    async fn search_recalls(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: RecallRequest = args.decode()?;
        let query = SearchQuery::new()
            .term("product_description", request.product_description.as_deref())
            .raw_term(
                "classification",
                request
                    .classification
                    .as_deref()
                    .map(classification_query_value),
            )
            .term("status", request.status.as_deref());
        self.search("drug/enforcement", query, request.limit, true).await
    }

    async fn search_all_recalls(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: AllRecallsRequest = args.decode()?;
        let query = SearchQuery::new()
            .term("product_description", request.product_description.as_deref());
        let source = format!("{}/enforcement", request.category);
        self.search(&source, query, request.limit, true).await
    }

    async fn search_devices(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: DeviceRequest = args.decode()?;
        let query = SearchQuery::new().term("device_name", Some(request.device_name.as_str()));
        self.search("device/510k", query, request.limit, false).await
    }

    async fn search_adverse_events(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: AdverseEventRequest = args.decode()?;
        let metadata = into_map(json!({"drug_name": request.drug_name}));
        let query = SearchQuery::new()
            .term("patient.drug.openfda.brand_name", Some(request.drug_name.as_str()))
            .term("patient.reaction.reactionmeddrapt", request.reaction.as_deref());
        let client = self.client.get().await?;
        let http_request = self.build_request("drug/event", &query, request.limit);

        let response = send(client.as_ref(), ProviderId::Drugs, http_request)
            .await
            .map_err(|e| e.with_metadata(metadata.clone()))?;

        // openFDA reports "no matching reports" as a 404.
        if response.status == 404 {
            debug!(drug = %request.drug_name, "no adverse events on record");
            return Ok(Envelope::empty_with_notice(metadata, NO_ADVERSE_EVENTS));
        }
        ensure_success(ProviderId::Drugs, &response).map_err(|e| e.with_metadata(metadata.clone()))?;
        let payload: ResultsPayload = parse_json(ProviderId::Drugs, &response)
            .map_err(|e| e.with_metadata(metadata.clone()))?;

        let metadata = into_map(json!({
            "drug_name": request.drug_name,
            "reaction": request.reaction,
            "count": payload.results.len(),
            "source": "drug/event",
            "note": ADVERSE_EVENTS_NOTE,
        }));
        Ok(Envelope::success(payload.results, metadata))
    }

    fn get_recall_classifications(&self) -> Envelope {
        let rows = RECALL_CLASSIFICATIONS
            .entries()
            .iter()
            .map(|(code, description)| into_map(json!({"code": code, "description": description})))
            .collect::<Vec<_>>();
        let metadata = into_map(json!({
            "count": rows.len(),
            "common_reactions": COMMON_ADVERSE_REACTIONS,
            "usage": CLASSIFICATION_USAGE,
        }));
        Envelope::success(rows, metadata)
    }
}

impl Provider for DrugsAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Drugs
    }

    fn operations(&self) -> Vec<OperationSpec> {
        let limit = || FieldSpec::integer("limit", "Maximum results", 1, MAX_LIMIT).with_default(10);
        let brand = || FieldSpec::text("brand_name", "Brand or trade name, e.g. Lipitor");
        let generic = || FieldSpec::text("generic_name", "Generic or chemical name, e.g. atorvastatin");

        vec![
            OperationSpec::new(
                SEARCH_DRUGS,
                ProviderId::Drugs,
                "Search FDA-approved drugs by brand name, generic name or application number.",
                ArgSchema::new()
                    .field(brand())
                    .field(generic())
                    .field(FieldSpec::text("application_number", "FDA application number"))
                    .field(limit())
                    .require_any_of(&["brand_name", "generic_name", "application_number"]),
            ),
            OperationSpec::new(
                SEARCH_DRUG_LABELS,
                ProviderId::Drugs,
                "Official drug labeling: indications, dosage, warnings and adverse reactions.",
                ArgSchema::new()
                    .field(brand())
                    .field(generic())
                    .field(limit())
                    .require_any_of(&["brand_name", "generic_name"]),
            ),
            OperationSpec::new(
                SEARCH_RECALLS,
                ProviderId::Drugs,
                "Drug recalls and safety alerts, filterable by classification and status.",
                ArgSchema::new()
                    .field(FieldSpec::text("product_description", "Product description or drug name"))
                    .field(FieldSpec::choice("classification", "Recall classification", CLASSES))
                    .field(FieldSpec::text("status", "Ongoing, Completed or Terminated"))
                    .field(limit()),
            ),
            OperationSpec::new(
                SEARCH_ADVERSE_EVENTS,
                ProviderId::Drugs,
                "Adverse event reports (patient reactions and side effects) for a drug.",
                ArgSchema::new()
                    .field(FieldSpec::text("drug_name", "Drug brand name").required())
                    .field(FieldSpec::text("reaction", "Specific adverse reaction"))
                    .field(limit()),
            ),
            OperationSpec::new(
                SEARCH_DEVICES,
                ProviderId::Drugs,
                "510(k) clearances for FDA-regulated medical devices.",
                ArgSchema::new()
                    .field(FieldSpec::text("device_name", "Device name").required())
                    .field(limit()),
            ),
            OperationSpec::new(
                SEARCH_ALL_RECALLS,
                ProviderId::Drugs,
                "Enforcement reports across food, device and drug recalls.",
                ArgSchema::new()
                    .field(FieldSpec::choice("category", "Recall category", RECALL_CATEGORIES).required())
                    .field(FieldSpec::text("product_description", "Product name or keywords"))
                    .field(limit()),
            ),
            OperationSpec::new(
                GET_RECALL_CLASSIFICATIONS,
                ProviderId::Drugs,
                "Recall severity class definitions and commonly reported reactions.",
                ArgSchema::new(),
            ),
        ]
    }

    fn invoke<'a>(&'a self, operation: &'a str, args: ValidArgs) -> ProviderFuture<'a> {
        Box::pin(async move {
            match operation {
                SEARCH_DRUGS => self.search_drugs(args).await,
                SEARCH_DRUG_LABELS => self.search_drug_labels(args).await,
                SEARCH_RECALLS => self.search_recalls(args).await,
                SEARCH_ADVERSE_EVENTS => self.search_adverse_events(args).await,
                SEARCH_DEVICES => self.search_devices(args).await,
                SEARCH_ALL_RECALLS => self.search_all_recalls(args).await,
                GET_RECALL_CLASSIFICATIONS => Ok(self.get_recall_classifications()),
                other => Err(unsupported(ProviderId::Drugs, other)),
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
