use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::adapters::{ensure_success, fetch_json, parse_json, send};
use crate::config::{GatewayConfig, ProviderConfig};
use crate::connection::{ClientFactory, LazyClient};
use crate::envelope::{into_map, Envelope, Row};
use crate::error::{GatewayError, GatewayResult};
use crate::http_client::HttpRequest;
use crate::provider::{unsupported, Provider, ProviderFuture};
use crate::reference::census::{state_fips, variable_category, variable_label, COMMON_VARIABLES, STATE_FIPS};
use crate::registry::OperationSpec;
use crate::source::ProviderId;
use crate::validation::{ArgSchema, FieldSpec, ValidArgs};

const SEARCH_POPULATION: &str = "search_population";
const SEARCH_ECONOMIC: &str = "search_economic";
const GET_AVAILABLE_VARIABLES: &str = "get_available_variables";
const GET_COMMON_VARIABLES: &str = "get_common_variables";
const GET_STATE_FIPS: &str = "get_state_fips";

const DEFAULT_DATASET: &str = "acs/acs5";
const POPULATION_VARIABLES: [&str; 3] = ["NAME", "B01001_001E", "B01002_001E"];
const ECONOMIC_VARIABLES: [&str; 4] = ["NAME", "B19013_001E", "B17001_002E", "B23025_005E"];

const MISSING_KEY: &str = "Census API key is required. Set CENSUS_API_KEY environment variable or pass api_key parameter. Get your key at: https://api.census.gov/data/key_signup.html";
const VARIABLES_USAGE: &str = "Use these variable codes in the 'variables' parameter of search_population or search_economic tools";

#[derive(Debug, Deserialize)]
struct PopulationRequest {
    year: u16,
    state: String,
    county: Option<String>,
    variables: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct EconomicRequest {
    year: u16,
    dataset: String,
    variables: Option<Vec<String>>,
    geography: String,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VariablesRequest {
    year: u16,
    dataset: String,
    search: Option<String>,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct StateFipsRequest {
    state_name: Option<String>,
}

/// Fully resolved table query: dataset path, variable list and geography filter.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TableQuery {
    year: u16,
    dataset: String,
    variables: Vec<String>,
    geo_for: String,
    geo_in: Option<String>,
}

impl TableQuery {
    fn new(
        year: u16,
        dataset: String,
        variables: Vec<String>,
        geography: &str,
        state: Option<&str>,
        county: Option<&str>,
    ) -> Self {
        let (geo_for, geo_in) = geography_filter(geography, state, county);
        Self {
            year,
            dataset,
            variables: with_name_first(variables),
            geo_for,
            geo_in,
        }
    }

    fn base_metadata(&self) -> Map<String, Value> {
        into_map(json!({"year": self.year, "dataset": self.dataset}))
    }
}

/// Census `for` / `in` parameters, most specific filter first.
fn geography_filter(
    geography: &str,
    state: Option<&str>,
    county: Option<&str>,
) -> (String, Option<String>) {
    match (state, county) {
        (Some(state), Some(county)) => (format!("county:{county}"), Some(format!("state:{state}"))),
        (Some(state), None) if geography.starts_with("county") => {
            (String::from("county:*"), Some(format!("state:{state}")))
        }
        (Some(state), None) => (format!("state:{state}"), None),
        (None, _) => (geography.to_owned(), None),
    }
}

fn with_name_first(variables: Vec<String>) -> Vec<String> {
    if variables.iter().any(|variable| variable == "NAME") {
        return variables;
    }
    let mut with_name = Vec::with_capacity(variables.len() + 1);
    with_name.push(String::from("NAME"));
    with_name.extend(variables);
    with_name
}

/// Zips the header row with every following row. Short rows lose trailing fields.
fn zip_table(table: Vec<Vec<Value>>) -> Vec<Row> {
    let mut rows = table.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let header: Vec<String> = header
        .into_iter()
        .map(|cell| match cell {
            Value::String(text) => text,
            other => other.to_string(),
        })
        .collect();

    rows.map(|row| header.iter().cloned().zip(row).collect::<Row>())
        .collect()
}

fn defaults(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

/// Census Bureau data API adapter.
pub struct CensusAdapter {
    config: ProviderConfig,
    api_key: Option<String>,
    client: LazyClient,
}

impl CensusAdapter {
    pub fn new(
        config: ProviderConfig,
        api_key: Option<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            config,
            api_key,
            client: LazyClient::new(ProviderId::Census, factory),
        }
    }

    pub fn from_gateway_config(config: &GatewayConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self::new(
            config.census.clone(),
            config.credentials.census_api_key.clone(),
            factory,
        )
    }

    async fn search_population(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: PopulationRequest = args.decode()?;
        let geography = if request.county.is_some() {
            String::from("county:*")
        } else {
            format!("state:{}", request.state)
        };
        let query = TableQuery::new(
            request.year,
            String::from(DEFAULT_DATASET),
            request
                .variables
                .unwrap_or_else(|| defaults(&POPULATION_VARIABLES)),
            &geography,
            Some(&request.state),
            request.county.as_deref(),
        );
        self.get_table(query).await
    }

    async fn search_economic(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: EconomicRequest = args.decode()?;
        let query = TableQuery::new(
            request.year,
            request.dataset,
            request
                .variables
                .unwrap_or_else(|| defaults(&ECONOMIC_VARIABLES)),
            &request.geography,
            request.state.as_deref(),
            None,
        );
        self.get_table(query).await
    }

    async fn get_table(&self, query: TableQuery) -> GatewayResult<Envelope> {
        let metadata = query.base_metadata();
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::precondition(MISSING_KEY).with_metadata(metadata.clone()))?;
        let client = self.client.get().await?;

        let mut request = HttpRequest::get(
            self.config
                .endpoint(&format!("{}/{}", query.year, query.dataset)),
        )
        .with_query("get", query.variables.join(","))
        .with_query("for", &query.geo_for);
        if let Some(geo_in) = &query.geo_in {
            request = request.with_query("in", geo_in);
        }
        let request = request
            .with_query("key", api_key)
            .with_timeout_ms(self.config.timeout_ms);

        let response = send(client.as_ref(), ProviderId::Census, request)
            .await
            .map_err(|e| e.with_metadata(metadata.clone()))?;
        ensure_success(ProviderId::Census, &response)
            .map_err(|e| e.with_metadata(metadata.clone()))?;

        // No matching geography comes back as an empty 204.
        let table: Vec<Vec<Value>> = if response.body.trim().is_empty() {
            Vec::new()
        } else {
            parse_json(ProviderId::Census, &response).map_err(|e| e.with_metadata(metadata.clone()))?
        };

        let data = if table.len() < 2 {
            Vec::new()
        } else {
            zip_table(table)
        };

        let variables: Map<String, Value> = query
            .variables
            .iter()
            .map(|code| (code.clone(), Value::String(variable_label(code))))
            .collect();
        let mut metadata = metadata;
        metadata.insert(String::from("variables"), Value::Object(variables));
        metadata.insert(String::from("for"), Value::String(query.geo_for.clone()));
        if let Some(geo_in) = &query.geo_in {
            metadata.insert(String::from("in"), Value::String(geo_in.clone()));
        }
        metadata.insert(String::from("count"), Value::from(data.len()));

        Ok(Envelope::success(data, metadata))
    }

    async fn get_available_variables(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        #[derive(Deserialize)]
        struct VariablesPayload {
            #[serde(default)]
            variables: Map<String, Value>,
        }

        let request: VariablesRequest = args.decode()?;
        let metadata = into_map(json!({"year": request.year, "dataset": request.dataset}));
        let client = self.client.get().await?;

        let http_request = HttpRequest::get(self.config.endpoint(&format!(
            "{}/{}/variables.json",
            request.year, request.dataset
        )))
        .with_timeout_ms(self.config.timeout_ms);

        let payload: VariablesPayload =
            fetch_json(client.as_ref(), ProviderId::Census, http_request)
                .await
                .map_err(|e| e.with_metadata(metadata.clone()))?;

        let needle = request.search.as_deref().map(str::to_lowercase);
        let mut rows: Vec<Row> = payload
            .variables
            .into_iter()
            .map(|(code, detail)| {
                let text = |key: &str| detail.get(key).and_then(Value::as_str).map(str::to_owned);
                into_map(json!({
                    "code": code,
                    "label": text("label"),
                    "concept": text("concept"),
                    "predicate_type": text("predicateType"),
                }))
            })
            .filter(|row| match &needle {
                Some(needle) => ["code", "label", "concept"].iter().any(|key| {
                    row.get(*key)
                        .and_then(Value::as_str)
                        .is_some_and(|value| value.to_lowercase().contains(needle.as_str()))
                }),
                None => true,
            })
            .collect();
        rows.sort_by(|a, b| {
            let code = |row: &Row| row.get("code").and_then(Value::as_str).unwrap_or_default().to_owned();
            code(a).cmp(&code(b))
        });

        let total = rows.len();
        rows.truncate(request.limit);

        let mut metadata = metadata;
        metadata.insert(String::from("search"), json!(request.search));
        metadata.insert(String::from("total"), Value::from(total));
        metadata.insert(String::from("count"), Value::from(rows.len()));
        Ok(Envelope::success(rows, metadata))
    }

    fn get_common_variables(&self) -> Envelope {
        let rows = COMMON_VARIABLES
            .entries()
            .iter()
            .map(|(code, description)| {
                into_map(json!({
                    "code": code,
                    "description": description,
                    "category": variable_category(code),
                }))
            })
            .collect::<Vec<_>>();
        let metadata = into_map(json!({"count": rows.len(), "usage": VARIABLES_USAGE}));
        Envelope::success(rows, metadata)
    }

    fn get_state_fips(&self, args: ValidArgs) -> GatewayResult<Envelope> {
        let request: StateFipsRequest = args.decode()?;
        let row = |state: &str, code: &str| into_map(json!({"state": state, "fips_code": code}));

        match request.state_name {
            Some(name) => {
                let (state, code) = state_fips(&name).ok_or_else(|| {
                    GatewayError::application(format!("State '{name}' not found"))
                        .with_meta("state_name", name.clone())
                })?;
                Ok(Envelope::success(
                    vec![row(state, code)],
                    into_map(json!({"state_name": name, "count": 1})),
                ))
            }
            None => {
                let rows = STATE_FIPS
                    .entries()
                    .iter()
                    .map(|(state, code)| row(state, code))
                    .collect::<Vec<_>>();
                let metadata = into_map(json!({"count": rows.len()}));
                Ok(Envelope::success(rows, metadata))
            }
        }
    }
}

impl Provider for CensusAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Census
    }

    fn operations(&self) -> Vec<OperationSpec> {
        let year = || FieldSpec::integer("year", "Data year (e.g. 2021)", 2000, 2030).required();
        let variables = || {
            FieldSpec::string_list(
                "variables",
                "Census variable codes; NAME is always included",
                1,
                50,
            )
        };
        let dataset = || {
            FieldSpec::text("dataset", "Dataset path such as acs/acs5")
                .with_default(DEFAULT_DATASET)
        };

        vec![
            OperationSpec::new(
                SEARCH_POPULATION,
                ProviderId::Census,
                "Population and median age from the 5-year American Community Survey for a state or county.",
                ArgSchema::new()
                    .field(year())
                    .field(FieldSpec::matching("state", "2-digit state FIPS code", "^[0-9]{2}$").required())
                    .field(FieldSpec::matching("county", "3-digit county FIPS code", "^[0-9]{3}$"))
                    .field(variables()),
            ),
            OperationSpec::new(
                SEARCH_ECONOMIC,
                ProviderId::Census,
                "Income, poverty and unemployment indicators for a geography.",
                ArgSchema::new()
                    .field(year())
                    .field(dataset())
                    .field(variables())
                    .field(
                        FieldSpec::text("geography", "Census geography clause, e.g. state:* or county:*")
                            .with_default("state:*"),
                    )
                    .field(FieldSpec::matching("state", "2-digit state FIPS code", "^[0-9]{2}$")),
            ),
            OperationSpec::new(
                GET_AVAILABLE_VARIABLES,
                ProviderId::Census,
                "List the variables a dataset publishes, optionally filtered by a search term.",
                ArgSchema::new()
                    .field(year())
                    .field(dataset())
                    .field(FieldSpec::text("search", "Case-insensitive filter on code, label or concept"))
                    .field(FieldSpec::integer("limit", "Maximum variables returned", 1, 500).with_default(100)),
            ),
            OperationSpec::new(
                GET_COMMON_VARIABLES,
                ProviderId::Census,
                "Reference list of commonly used Census variables grouped by category.",
                ArgSchema::new(),
            ),
            OperationSpec::new(
                GET_STATE_FIPS,
                ProviderId::Census,
                "FIPS codes for U.S. states, or the code of one state by name.",
                ArgSchema::new().field(FieldSpec::text("state_name", "State name to look up")),
            ),
        ]
    }

    fn invoke<'a>(&'a self, operation: &'a str, args: ValidArgs) -> ProviderFuture<'a> {
        Box::pin(async move {
            match operation {
                SEARCH_POPULATION => self.search_population(args).await,
                SEARCH_ECONOMIC => self.search_economic(args).await,
                GET_AVAILABLE_VARIABLES => self.get_available_variables(args).await,
                GET_COMMON_VARIABLES => Ok(self.get_common_variables()),
                GET_STATE_FIPS => self.get_state_fips(args),
                other => Err(unsupported(ProviderId::Census, other)),
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
