use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::adapters::{fetch_json, parse_json, send};
use crate::config::{GatewayConfig, ProviderConfig};
use crate::connection::{ClientFactory, LazyClient};
use crate::envelope::{into_map, Envelope, Row};
use crate::error::{GatewayError, GatewayResult};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider::{unsupported, Provider, ProviderFuture};
use crate::reference::filings::{
    form_description, form_group, COMMON_FORM_TYPES, FORM_GROUPS, INSIDER_FORM,
};
use crate::registry::OperationSpec;
use crate::source::ProviderId;
use crate::validation::{ArgSchema, FieldSpec, ValidArgs};

const SEARCH_COMPANY: &str = "search_company";
const GET_COMPANY_FILINGS: &str = "get_company_filings";
const GET_COMPANY_FACTS: &str = "get_company_facts";
const GET_INSIDER_TRADES: &str = "get_insider_trades";
const GET_DAILY_FILINGS: &str = "get_daily_filings";
const GET_FORM_TYPES: &str = "get_form_types";

pub const CIK_WIDTH: usize = 10;
/// One to ten digits, any other characters ignored.
const CIK_PATTERN: &str = "^[^0-9]*([0-9][^0-9]*){1,10}$";
const ARCHIVE_BASE: &str = "https://www.sec.gov/Archives/edgar/data";

const NO_RECENT_FILINGS: &str = "No recent filings found";
const DAILY_FILINGS_NOTE: &str = "Daily filings retrieval is restricted to recent logs";
const FORM_TYPES_USAGE: &str =
    "Use these form type codes in the 'form_type' parameter of get_company_filings";

/// Strips non-digits and left-pads with zeros to the canonical ten-digit CIK.
pub fn normalize_cik(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    format!("{digits:0>width$}", width = CIK_WIDTH)
}

/// EDGAR archive folder holding every document of one accession.
fn filing_url(cik: &str, accession_number: &str) -> String {
    let numeric = cik.trim_start_matches('0');
    let numeric = if numeric.is_empty() { "0" } else { numeric };
    format!(
        "{ARCHIVE_BASE}/{numeric}/{}/",
        accession_number.replace('-', "")
    )
}

#[derive(Debug, Deserialize)]
struct CompanyRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct FilingsRequest {
    cik: String,
    form_type: Option<String>,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct CikRequest {
    cik: String,
}

#[derive(Debug, Deserialize)]
struct InsiderRequest {
    cik: String,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct DailyRequest {
    date: String,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    #[serde(default)]
    cik_str: Value,
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    exchange: Option<String>,
}

impl TickerEntry {
    fn cik_text(&self) -> String {
        match &self.cik_str {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Case-insensitive name substring, exact ticker, or raw CIK substring.
    fn matches(&self, query: &str) -> bool {
        let lowered = query.to_lowercase();
        self.title.to_lowercase().contains(&lowered)
            || self.ticker.to_lowercase() == lowered
            || self.cik_text().contains(query)
    }

    fn into_row(self) -> Row {
        into_map(json!({
            "cik": normalize_cik(&self.cik_text()),
            "name": self.title,
            "ticker": self.ticker.to_uppercase(),
            "exchange": self.exchange.unwrap_or_default(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct Submissions {
    #[serde(default)]
    name: String,
    #[serde(default)]
    filings: Option<SubmissionFilings>,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    #[serde(default)]
    recent: Option<Map<String, Value>>,
}

/// EDGAR's column-oriented listing of recent filings.
#[derive(Debug, Default, Deserialize)]
struct RecentFilings {
    #[serde(rename = "accessionNumber", default)]
    accession_numbers: Vec<Value>,
    #[serde(rename = "filingDate", default)]
    filing_dates: Vec<Value>,
    #[serde(rename = "reportDate", default)]
    report_dates: Vec<Value>,
    #[serde(rename = "form", default)]
    forms: Vec<Value>,
    #[serde(rename = "primaryDocument", default)]
    primary_documents: Vec<Value>,
    #[serde(rename = "primaryDocDescription", default)]
    primary_doc_descriptions: Vec<Value>,
}

impl RecentFilings {
    /// Zips the parallel columns by index, filters by form, then truncates.
    /// A column shorter than the form column yields `null` at that index.
    fn rows(&self, cik: &str, form_type: Option<&str>, count: usize) -> Vec<Row> {
        let at = |column: &[Value], index: usize| column.get(index).cloned().unwrap_or(Value::Null);
        let len = self.accession_numbers.len().min(self.forms.len());

        (0..len)
            .filter_map(|index| {
                let form = self.forms[index].as_str().unwrap_or_default();
                if form_type.is_some_and(|wanted| wanted != form) {
                    return None;
                }
                let accession = self.accession_numbers[index].as_str().unwrap_or_default();
                Some(into_map(json!({
                    "accession_number": self.accession_numbers[index],
                    "filing_date": at(&self.filing_dates, index),
                    "report_date": at(&self.report_dates, index),
                    "form_type": form,
                    "form_description": form_description(form),
                    "primary_document": at(&self.primary_documents, index),
                    "primary_doc_description": at(&self.primary_doc_descriptions, index),
                    "filing_url": filing_url(cik, accession),
                })))
            })
            .take(count)
            .collect()
    }
}

/// SEC EDGAR adapter. Every request carries the descriptive user agent EDGAR requires.
pub struct FilingsAdapter {
    config: ProviderConfig,
    client: LazyClient,
}

impl FilingsAdapter {
    pub fn new(config: ProviderConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            config,
            client: LazyClient::new(ProviderId::Filings, factory),
        }
    }

    pub fn from_gateway_config(config: &GatewayConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self::new(config.filings.clone(), factory)
    }

    fn request(&self, path: &str) -> HttpRequest {
        HttpRequest::get(self.config.endpoint(path))
            .with_header("user-agent", self.config.user_agent.clone())
            .with_header("accept", "application/json")
            .with_timeout_ms(self.config.timeout_ms)
    }

    /// GET whose non-2xx replies carry `message` instead of the body.
    async fn fetch_with_message<T: serde::de::DeserializeOwned>(
        &self,
        client: &dyn HttpClient,
        path: &str,
        message: String,
    ) -> GatewayResult<T> {
        let response = send(client, ProviderId::Filings, self.request(path)).await?;
        if !response.is_success() {
            return Err(GatewayError::http_status_with_message(response.status, message));
        }
        parse_json(ProviderId::Filings, &response)
    }

    async fn search_company(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: CompanyRequest = args.decode()?;
        let metadata = into_map(json!({"query": request.query}));
        let client = self.client.get().await?;

        let index: Map<String, Value> = fetch_json(
            client.as_ref(),
            ProviderId::Filings,
            self.request("files/company_tickers.json"),
        )
        .await
        .map_err(|e| e.with_metadata(metadata.clone()))?;

        let data: Vec<Row> = index
            .into_iter()
            .filter_map(|(_, entry)| serde_json::from_value::<TickerEntry>(entry).ok())
            .filter(|entry| entry.matches(&request.query))
            .map(TickerEntry::into_row)
            .collect();

        let mut metadata = metadata;
        metadata.insert(String::from("count"), Value::from(data.len()));
        Ok(Envelope::success(data, metadata))
    }

    async fn company_filings(
        &self,
        raw_cik: &str,
        form_type: Option<String>,
        count: usize,
    ) -> GatewayResult<Envelope> {
        let cik = normalize_cik(raw_cik);
        let metadata = into_map(json!({"cik": cik, "form_type": form_type}));
        let client = self.client.get().await?;

        let submissions: Submissions = self
            .fetch_with_message(
                client.as_ref(),
                &format!("submissions/CIK{cik}.json"),
                format!("Company CIK {cik} not found or inaccessible"),
            )
            .await
            .map_err(|e| e.with_metadata(metadata.clone()))?;

        let recent = submissions
            .filings
            .and_then(|filings| filings.recent)
            .filter(|recent| !recent.is_empty());
        let Some(recent) = recent else {
            let metadata = into_map(json!({"cik": cik, "message": NO_RECENT_FILINGS}));
            return Ok(Envelope::success(Vec::new(), metadata));
        };
        let recent: RecentFilings = serde_json::from_value(Value::Object(recent)).map_err(|e| {
            GatewayError::transport(format!("malformed filings listing: {e}"))
                .with_metadata(metadata.clone())
        })?;

        let data = recent.rows(&cik, form_type.as_deref(), count);
        let metadata = into_map(json!({
            "cik": cik,
            "company_name": submissions.name,
            "form_type": form_type,
            "count": data.len(),
        }));
        Ok(Envelope::success(data, metadata))
    }

    async fn get_company_filings(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: FilingsRequest = args.decode()?;
        self.company_filings(&request.cik, request.form_type, request.count)
            .await
    }

    async fn get_insider_trades(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: InsiderRequest = args.decode()?;
        self.company_filings(&request.cik, Some(String::from(INSIDER_FORM)), request.limit)
            .await
    }

    async fn get_company_facts(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: CikRequest = args.decode()?;
        let cik = normalize_cik(&request.cik);
        let metadata = into_map(json!({"cik": cik}));
        let client = self.client.get().await?;

        let facts: Row = self
            .fetch_with_message(
                client.as_ref(),
                &format!("api/xbrl/companyfacts/CIK{cik}.json"),
                format!("Company facts not found for CIK {cik}"),
            )
            .await
            .map_err(|e| e.with_metadata(metadata.clone()))?;

        let mut metadata = metadata;
        metadata.insert(String::from("source"), json!("company_facts"));
        metadata.insert(String::from("description"), json!("XBRL financial data"));
        Ok(Envelope::success(vec![facts], metadata))
    }

    // TODO: back this with the EDGAR daily index (`/Archives/edgar/daily-index/`) once its
    // form.idx layout is parsed; until then the operation never touches the network.
    fn get_daily_filings(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: DailyRequest = args.decode()?;
        let metadata = into_map(json!({"date": request.date, "note": DAILY_FILINGS_NOTE}));
        Ok(Envelope::success(Vec::new(), metadata))
    }

    fn get_form_types(&self) -> Envelope {
        let rows = COMMON_FORM_TYPES
            .entries()
            .iter()
            .map(|(form, description)| {
                into_map(json!({
                    "form_type": form,
                    "description": description,
                    "group": form_group(form),
                }))
            })
            .collect::<Vec<_>>();
        let groups: Vec<&str> = FORM_GROUPS.iter().map(|(group, _)| *group).collect();
        let metadata = into_map(json!({
            "count": rows.len(),
            "groups": groups,
            "usage": FORM_TYPES_USAGE,
        }));
        Envelope::success(rows, metadata)
    }
}

impl Provider for FilingsAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Filings
    }

    fn operations(&self) -> Vec<OperationSpec> {
        let cik = || {
            FieldSpec::matching("cik", "Central Index Key; non-digits are ignored", CIK_PATTERN)
                .required()
        };

        vec![
            OperationSpec::new(
                SEARCH_COMPANY,
                ProviderId::Filings,
                "Find companies by name, ticker symbol or CIK.",
                ArgSchema::new()
                    .field(FieldSpec::text("query", "Company name, ticker or CIK").required()),
            ),
            OperationSpec::new(
                GET_COMPANY_FILINGS,
                ProviderId::Filings,
                "Recent filings of a company, optionally restricted to one form type.",
                ArgSchema::new()
                    .field(cik())
                    .field(FieldSpec::text("form_type", "Form type such as 10-K or 8-K"))
                    .field(FieldSpec::integer("count", "Number of filings", 1, 100).with_default(10)),
            ),
            OperationSpec::new(
                GET_COMPANY_FACTS,
                ProviderId::Filings,
                "XBRL financial facts reported by a company.",
                ArgSchema::new().field(cik()),
            ),
            OperationSpec::new(
                GET_INSIDER_TRADES,
                ProviderId::Filings,
                "Insider transaction reports (Form 4) filed for a company.",
                ArgSchema::new()
                    .field(cik())
                    .field(FieldSpec::integer("limit", "Maximum reports", 1, 100).with_default(20)),
            ),
            OperationSpec::new(
                GET_DAILY_FILINGS,
                ProviderId::Filings,
                "Filings submitted on one date. Currently always returns an empty listing.",
                ArgSchema::new().field(FieldSpec::iso_date("date", "Filing date (YYYY-MM-DD)").required()),
            ),
            OperationSpec::new(
                GET_FORM_TYPES,
                ProviderId::Filings,
                "Reference list of common SEC form types and their descriptions.",
                ArgSchema::new(),
            ),
        ]
    }

    fn invoke<'a>(&'a self, operation: &'a str, args: ValidArgs) -> ProviderFuture<'a> {
        Box::pin(async move {
            match operation {
                SEARCH_COMPANY => self.search_company(args).await,
                GET_COMPANY_FILINGS => self.get_company_filings(args).await,
                GET_COMPANY_FACTS => self.get_company_facts(args).await,
                GET_INSIDER_TRADES => self.get_insider_trades(args).await,
                GET_DAILY_FILINGS => self.get_daily_filings(args),
                GET_FORM_TYPES => Ok(self.get_form_types()),
                other => Err(unsupported(ProviderId::Filings, other)),
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
