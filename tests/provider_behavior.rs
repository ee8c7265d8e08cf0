//! Behavior tests for the five agency adapters against scripted upstream payloads.

use std::sync::Arc;

use serde_json::{json, Value};
use usdata_core::{
    normalize_cik, ClientFactory, Credentials, FixedClientFactory, Gateway, GatewayConfig,
    HttpError, HttpMethod, HttpResponse, MockHttpClient,
};

fn gateway_with(client: MockHttpClient, credentials: Credentials) -> (Gateway, Arc<MockHttpClient>) {
    let client = Arc::new(client);
    let factory: Arc<dyn ClientFactory> = Arc::new(FixedClientFactory::new(client.clone()));
    let config = GatewayConfig::default().with_credentials(credentials);
    let gateway = Gateway::with_factory(&config, factory).expect("gateway builds");
    (gateway, client)
}

fn keyed() -> Credentials {
    Credentials {
        census_api_key: Some(String::from("census-key")),
        bls_api_key: Some(String::from("bls-key")),
        aqs_email: Some(String::from("analyst@example.test")),
        aqs_key: Some(String::from("aqs-key")),
    }
}

// =============================================================================
// Census
// =============================================================================

#[tokio::test]
async fn when_census_returns_a_table_rows_are_zipped_with_the_header() {
    // Given: The Census API answering one state row
    let (gateway, client) = gateway_with(
        MockHttpClient::new().respond_json(
            "api.census.gov/data/2021/acs/acs5",
            &json!([["NAME", "B01001_001E", "state"], ["California", "39538223", "06"]]),
        ),
        keyed(),
    );

    // When: Population is requested for the state
    let envelope = gateway
        .dispatch(
            "search_population",
            &json!({"year": 2021, "state": "06", "variables": ["NAME", "B01001_001E"]}),
        )
        .await;

    // Then: Exactly one row keyed by the header
    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(
        Value::Object(envelope.data[0].clone()),
        json!({"NAME": "California", "B01001_001E": "39538223", "state": "06"})
    );
    assert_eq!(envelope.metadata["count"], 1);
    assert_eq!(envelope.metadata["for"], "state:06");
    assert_eq!(envelope.metadata["variables"]["B01001_001E"], "Total Population");

    let request = client.last_request().expect("request recorded");
    assert_eq!(request.query_value("key"), Some("census-key"));
    assert!(!request.redacted_url().contains("census-key"));
}

#[tokio::test]
async fn when_census_returns_only_a_header_result_is_empty_success() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond_json(
            "api.census.gov",
            &json!([["NAME", "B19013_001E", "state"]]),
        ),
        keyed(),
    );

    let envelope = gateway
        .dispatch("search_economic", &json!({"year": 2021, "state": "06"}))
        .await;

    assert!(envelope.success, "{:?}", envelope.error);
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.metadata["count"], 0);
}

#[tokio::test]
async fn when_census_answers_no_content_result_is_empty_success() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond("api.census.gov", HttpResponse::new(204, "")),
        keyed(),
    );

    let envelope = gateway
        .dispatch(
            "search_population",
            &json!({"year": 2021, "state": "06", "county": "999"}),
        )
        .await;

    assert!(envelope.success, "{:?}", envelope.error);
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.metadata["for"], "county:999");
    assert_eq!(envelope.metadata["in"], "state:06");
}

#[tokio::test]
async fn when_census_key_is_missing_precondition_fails_before_any_fetch() {
    let (gateway, client) = gateway_with(MockHttpClient::new(), Credentials::default());

    let envelope = gateway
        .dispatch("search_population", &json!({"year": 2021, "state": "06"}))
        .await;

    assert!(!envelope.success);
    assert!(envelope.error.expect("message").contains("CENSUS_API_KEY"));
    assert_eq!(envelope.metadata["year"], 2021);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn when_census_rejects_request_error_carries_status_and_truncated_body() {
    let body = format!("error: {}", "z".repeat(400));
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond("api.census.gov", HttpResponse::new(400, body)),
        keyed(),
    );

    let envelope = gateway
        .dispatch("search_population", &json!({"year": 2021, "state": "06"}))
        .await;

    assert!(!envelope.success);
    let error = envelope.error.expect("message");
    assert!(error.starts_with("HTTP 400: error: zzz"), "{error}");
    assert_eq!(error.chars().count(), "HTTP 400: ".len() + 200);
    assert_eq!(envelope.metadata["dataset"], "acs/acs5");
}

#[tokio::test]
async fn available_variables_are_filtered_sorted_and_limited() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond_json(
            "variables.json",
            &json!({"variables": {
                "B19013_001E": {"label": "Estimate!!Median household income", "concept": "MEDIAN HOUSEHOLD INCOME"},
                "B01001_001E": {"label": "Estimate!!Total:", "concept": "SEX BY AGE", "predicateType": "int"},
                "B01003_001E": {"label": "Estimate!!Total", "concept": "TOTAL POPULATION"},
            }}),
        ),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch(
            "get_available_variables",
            &json!({"year": 2021, "search": "total", "limit": 1}),
        )
        .await;

    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(envelope.count(), 1);
    assert_eq!(envelope.data[0]["code"], "B01001_001E");
    assert_eq!(envelope.data[0]["predicate_type"], "int");
    assert_eq!(envelope.metadata["total"], 2);
}

// =============================================================================
// Labor
// =============================================================================

#[tokio::test]
async fn when_bls_does_not_process_request_first_message_becomes_the_error() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond_json(
            "api.bls.gov",
            &json!({"status": "REQUEST_NOT_PROCESSED", "message": ["bad series"]}),
        ),
        keyed(),
    );

    let envelope = gateway
        .dispatch("get_series_data", &json!({"series_ids": ["NOPE"]}))
        .await;

    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some("bad series"));
    assert_eq!(envelope.metadata["series_ids"], json!(["NOPE"]));
}

#[tokio::test]
async fn when_bls_succeeds_series_are_annotated_and_request_is_posted() {
    let (gateway, client) = gateway_with(
        MockHttpClient::new().respond_json(
            "api.bls.gov",
            &json!({
                "status": "REQUEST_SUCCEEDED",
                "message": [],
                "Results": {"series": [
                    {"seriesID": "LNS14000000", "data": [{"year": "2023", "period": "M12", "value": "3.7"}]}
                ]}
            }),
        ),
        keyed(),
    );

    let envelope = gateway
        .dispatch(
            "get_series_data",
            &json!({"series_ids": "LNS14000000", "start_year": 2022, "end_year": 2023}),
        )
        .await;

    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(
        envelope.data[0]["description"],
        "Unemployment Rate (Seasonally Adjusted) - National"
    );
    assert_eq!(envelope.metadata["status"], "REQUEST_SUCCEEDED");

    let request = client.last_request().expect("request recorded");
    assert_eq!(request.method, HttpMethod::Post);
    let body: Value = serde_json::from_str(request.body.as_deref().expect("json body")).expect("json");
    assert_eq!(body["seriesid"], json!(["LNS14000000"]));
    assert_eq!(body["startyear"], "2022");
    assert_eq!(body["registrationkey"], "bls-key");
}

#[tokio::test]
async fn when_start_year_exceeds_end_year_labor_call_is_rejected() {
    let (gateway, client) = gateway_with(MockHttpClient::new(), keyed());

    let envelope = gateway
        .dispatch(
            "get_series_data",
            &json!({"series_ids": ["LNS14000000"], "start_year": 2024, "end_year": 2020}),
        )
        .await;

    assert!(!envelope.success);
    assert_eq!(client.call_count(), 0);
}

// =============================================================================
// AirQuality
// =============================================================================

fn daily_args() -> Value {
    json!({"param_code": "88101", "bdate": "20240101", "edate": "20240107", "state": "06"})
}

#[tokio::test]
async fn when_aqs_header_reports_failure_its_message_is_surfaced() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond_json(
            "dailyData/byState",
            &json!({"Header": [{"status": "Failed", "error_msg": "Invalid key"}], "Data": []}),
        ),
        keyed(),
    );

    let envelope = gateway.dispatch("get_daily_air_quality", &daily_args()).await;

    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some("Invalid key"));
    assert_eq!(envelope.metadata["param"], "88101");
}

#[tokio::test]
async fn when_aqs_succeeds_rows_and_parameter_description_are_returned() {
    let (gateway, client) = gateway_with(
        MockHttpClient::new().respond_json(
            "dailyData/byCounty",
            &json!({
                "Header": [{"status": "Success"}],
                "Data": [{"date_local": "2024-01-01", "arithmetic_mean": 12.4}]
            }),
        ),
        keyed(),
    );

    let mut args = daily_args();
    args["county"] = json!("037");
    let envelope = gateway.dispatch("get_daily_air_quality", &args).await;

    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(envelope.count(), 1);
    assert_eq!(envelope.metadata["param_description"], "PM2.5 - Local Conditions");

    let request = client.last_request().expect("request recorded");
    assert_eq!(request.query_value("county"), Some("037"));
    let redacted = request.redacted_url();
    assert!(!redacted.contains("aqs-key"));
    assert!(!redacted.contains("analyst"));
}

#[tokio::test]
async fn when_aqs_credentials_are_missing_no_fetch_is_attempted() {
    let credentials = Credentials {
        aqs_email: Some(String::from("analyst@example.test")),
        ..Credentials::default()
    };
    let (gateway, client) = gateway_with(MockHttpClient::new(), credentials);

    let envelope = gateway.dispatch("get_daily_air_quality", &daily_args()).await;

    assert!(!envelope.success);
    assert!(envelope.error.expect("message").contains("aqs.epa.gov/data/api/signup"));
    assert_eq!(client.call_count(), 0);
}

// =============================================================================
// Drugs
// =============================================================================

#[tokio::test]
async fn recall_search_encodes_classification_and_annotates_rows() {
    let (gateway, client) = gateway_with(
        MockHttpClient::new().respond_json(
            "drug/enforcement.json",
            &json!({"results": [
                {"recall_number": "D-1", "classification": "Class II"},
                {"recall_number": "D-2", "classification": "Unclassified"}
            ]}),
        ),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch(
            "search_recalls",
            &json!({"product_description": "blood pressure", "classification": "ii"}),
        )
        .await;

    assert!(envelope.success, "{:?}", envelope.error);
    let description = envelope.data[0]["classification_description"]
        .as_str()
        .expect("annotated");
    assert!(description.starts_with("Class II -"), "{description}");
    assert!(envelope.data[1].get("classification_description").is_none());

    let request = client.last_request().expect("request recorded");
    assert_eq!(
        request.query_value("search"),
        Some("product_description:blood%20pressure+AND+classification:Class+II")
    );
    assert_eq!(request.query_value("limit"), Some("10"));
}

#[tokio::test]
async fn when_no_adverse_events_exist_result_is_success_with_notice() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond("drug/event.json", HttpResponse::new(404, "not found")),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch("search_adverse_events", &json!({"drug_name": "obscurex"}))
        .await;

    assert!(envelope.success);
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.error.as_deref(), Some("No adverse events found for this drug"));
    assert_eq!(envelope.metadata["drug_name"], "obscurex");
}

#[tokio::test]
async fn category_recall_search_targets_the_category_endpoint() {
    let (gateway, client) = gateway_with(
        MockHttpClient::new().respond_json("food/enforcement.json", &json!({"results": []})),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch("search_all_recalls", &json!({"category": "FOOD", "limit": 500}))
        .await;

    // Limit 500 is outside the declared range.
    assert!(!envelope.success);
    assert_eq!(client.call_count(), 0);

    let envelope = gateway
        .dispatch("search_all_recalls", &json!({"category": "FOOD", "limit": 50}))
        .await;
    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(envelope.metadata["source"], "food/enforcement");
    assert!(client.last_request().expect("request").query_value("search").is_none());
}

#[tokio::test]
async fn device_search_queries_510k_clearances() {
    let (gateway, client) = gateway_with(
        MockHttpClient::new().respond_json(
            "device/510k.json",
            &json!({"results": [{"k_number": "K123456", "device_name": "INSULIN PUMP"}]}),
        ),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch("search_devices", &json!({"device_name": "insulin pump", "limit": 3}))
        .await;

    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(envelope.data[0]["k_number"], "K123456");
    assert_eq!(envelope.metadata["source"], "device/510k");
    let request = client.last_request().expect("request recorded");
    assert_eq!(request.query_value("search"), Some("device_name:insulin%20pump"));
    assert_eq!(request.query_value("limit"), Some("3"));
}

#[tokio::test]
async fn openfda_transport_failure_becomes_failed_envelope() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().fail("api.fda.gov", HttpError::new("connection reset")),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch("search_drugs", &json!({"brand_name": "Lipitor"}))
        .await;

    assert!(!envelope.success);
    assert!(envelope.error.expect("message").contains("connection reset"));
    assert_eq!(envelope.metadata["query"]["openfda.brand_name"], "Lipitor");
}

// =============================================================================
// Filings
// =============================================================================

#[test]
fn cik_normalization_pads_and_is_idempotent() {
    assert_eq!(normalize_cik("320-193"), "0000320193");
    assert_eq!(normalize_cik("0000320193"), "0000320193");
    assert_eq!(normalize_cik(&normalize_cik("320-193")), normalize_cik("320-193"));
}

fn submissions() -> Value {
    json!({
        "name": "Apple Inc.",
        "filings": {"recent": {
            "accessionNumber": ["0000320193-24-000001", "0000320193-24-000002", "0000320193-23-000106"],
            "filingDate": ["2024-02-01", "2024-01-15", "2023-11-03"],
            "reportDate": ["", "2023-12-30", "2023-09-30"],
            "form": ["4", "10-Q", "10-K"],
            "primaryDocument": ["xslF345X05/wk-form4.xml", "aapl-20231230.htm", "aapl-20230930.htm"],
            "primaryDocDescription": ["FORM 4", "10-Q", "10-K"]
        }}
    })
}

#[tokio::test]
async fn company_filings_are_listed_with_archive_links() {
    let (gateway, client) = gateway_with(
        MockHttpClient::new().respond_json("submissions/CIK0000320193.json", &submissions()),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch("get_company_filings", &json!({"cik": "320193", "form_type": "10-K"}))
        .await;

    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(envelope.count(), 1);
    let filing = &envelope.data[0];
    assert_eq!(filing["form_description"], "Annual Report");
    assert_eq!(
        filing["filing_url"],
        "https://www.sec.gov/Archives/edgar/data/320193/000032019323000106/"
    );
    assert_eq!(envelope.metadata["company_name"], "Apple Inc.");
    assert_eq!(envelope.metadata["cik"], "0000320193");

    let request = client.last_request().expect("request recorded");
    assert!(request.headers["user-agent"].contains("SEC"));
    assert_eq!(request.headers.get("accept").map(String::as_str), Some("application/json"));
}

#[tokio::test]
async fn insider_trades_are_form_four_filings() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond_json("submissions/", &submissions()),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch("get_insider_trades", &json!({"cik": "0000320193", "limit": 5}))
        .await;

    assert!(envelope.success, "{:?}", envelope.error);
    assert_eq!(envelope.count(), 1);
    assert_eq!(envelope.data[0]["form_type"], "4");
    assert_eq!(envelope.metadata["form_type"], "4");
}

#[tokio::test]
async fn company_without_recent_filings_reports_message() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond_json("submissions/", &json!({"name": "Shell Co", "filings": {}})),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch("get_company_filings", &json!({"cik": "1"}))
        .await;

    assert!(envelope.success);
    assert!(envelope.data.is_empty());
    assert_eq!(envelope.metadata["message"], "No recent filings found");
    assert_eq!(envelope.metadata["cik"], "0000000001");
}

#[tokio::test]
async fn unknown_company_facts_report_cik_in_error() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond("companyfacts/", HttpResponse::new(404, "<html>nope</html>")),
        Credentials::default(),
    );

    let envelope = gateway
        .dispatch("get_company_facts", &json!({"cik": "42"}))
        .await;

    assert!(!envelope.success);
    assert_eq!(
        envelope.error.as_deref(),
        Some("HTTP 404: Company facts not found for CIK 0000000042")
    );
}

#[tokio::test]
async fn company_search_matches_name_ticker_or_cik() {
    let (gateway, _) = gateway_with(
        MockHttpClient::new().respond_json(
            "company_tickers.json",
            &json!({
                "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
                "1": {"cik_str": 789019, "ticker": "MSFT", "title": "MICROSOFT CORP"},
                "2": {"cik_str": 1652044, "ticker": "GOOGL", "title": "Alphabet Inc."}
            }),
        ),
        Credentials::default(),
    );

    let by_name = gateway.dispatch("search_company", &json!({"query": "microsoft"})).await;
    assert_eq!(by_name.count(), 1);
    assert_eq!(by_name.data[0]["cik"], "0000789019");

    let by_ticker = gateway.dispatch("search_company", &json!({"query": "googl"})).await;
    assert_eq!(by_ticker.data[0]["name"], "Alphabet Inc.");

    let by_suffix = gateway.dispatch("search_company", &json!({"query": "Inc."})).await;
    assert_eq!(by_suffix.count(), 2);
    assert_eq!(by_suffix.metadata["query"], "Inc.");
}

#[tokio::test]
async fn daily_filings_is_an_explicit_no_op() {
    let (gateway, client) = gateway_with(MockHttpClient::new(), Credentials::default());

    let envelope = gateway
        .dispatch("get_daily_filings", &json!({"date": "2024-03-01"}))
        .await;

    assert!(envelope.success);
    assert!(envelope.data.is_empty());
    assert!(envelope.metadata["note"].as_str().is_some());
    assert_eq!(client.call_count(), 0);

    let invalid = gateway
        .dispatch("get_daily_filings", &json!({"date": "2024-13-01"}))
        .await;
    assert!(!invalid.success);
}
