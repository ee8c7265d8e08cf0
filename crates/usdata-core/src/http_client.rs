use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Query parameter names whose values are credentials and must never be logged.
const SECRET_PARAMS: [&str; 3] = ["key", "email", "registrationkey"];

/// Minimal HTTP method set needed by provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// HTTP request envelope used by adapter transport calls.
///
/// Query values are stored already percent-encoded, in insertion order, so the
/// final URL is reproduced byte-for-byte by every transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: 30_000,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Appends a query parameter, percent-encoding the value.
    pub fn with_query(mut self, name: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.query.push((
            name.into(),
            urlencoding::encode(value.as_ref()).into_owned(),
        ));
        self
    }

    /// Appends a query parameter whose value is already in the provider's encoding.
    pub fn with_raw_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_json_body(self, body: &serde_json::Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.url)
    }

    /// URL safe for logs: credential parameters are replaced with `***`.
    pub fn redacted_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(name, value)| {
                if SECRET_PARAMS.contains(&name.as_str()) {
                    format!("{name}=***")
                } else {
                    format!("{name}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.url)
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP response envelope returned by an adapter transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    retryable: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// The injected fetch capability: one request in, one response or transport failure out.
///
/// Implementations must be reentrant; one handle serves every concurrent
/// operation routed to its adapter.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;

    /// Releases pooled connections. Requests issued afterwards fail.
    fn close(&self) {}
}

/// Production HTTP client using reqwest.
#[derive(Debug)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    closed: AtomicBool,
}

impl ReqwestHttpClient {
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpError::non_retryable(format!("failed to build http client: {e}")))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            if self.closed.load(Ordering::Acquire) {
                return Err(HttpError::non_retryable("http client has been closed"));
            }

            let url = request.full_url();
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&url),
                HttpMethod::Post => self.client.post(&url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            builder = builder.timeout(Duration::from_millis(request.timeout_ms));

            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::new(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
struct MockRoute {
    fragment: String,
    response: Result<HttpResponse, HttpError>,
}

/// Scripted offline transport for tests.
///
/// Routes are matched in insertion order against the full request URL; an
/// unmatched request yields a 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    routes: Vec<MockRoute>,
    delay: Option<Duration>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
    closes: AtomicUsize,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, fragment: impl Into<String>, response: HttpResponse) -> Self {
        self.routes.push(MockRoute {
            fragment: fragment.into(),
            response: Ok(response),
        });
        self
    }

    pub fn respond_json(self, fragment: impl Into<String>, body: &serde_json::Value) -> Self {
        self.respond(fragment, HttpResponse::ok_json(body.to_string()))
    }

    pub fn fail(mut self, fragment: impl Into<String>, error: HttpError) -> Self {
        self.routes.push(MockRoute {
            fragment: fragment.into(),
            response: Err(error),
        });
        self
    }

    /// Every request sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests().pop()
    }

    fn resolve(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.routes
            .iter()
            .find(|route| url.contains(&route.fragment))
            .map(|route| route.response.clone())
            .unwrap_or_else(|| Ok(HttpResponse::new(404, "no mock route")))
    }
}

impl HttpClient for MockHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.resolve(&request.full_url());
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            response
        })
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_encoded_in_insertion_order() {
        let request = HttpRequest::get("https://example.test/data")
            .with_query("get", "NAME,B01001_001E")
            .with_query("for", "county:*")
            .with_raw_query("search", "a:b+AND+c:d");

        assert_eq!(
            request.full_url(),
            "https://example.test/data?get=NAME%2CB01001_001E&for=county%3A%2A&search=a:b+AND+c:d"
        );
    }

    #[test]
    fn redacted_url_hides_credentials() {
        let request = HttpRequest::get("https://example.test/daily")
            .with_query("email", "me@example.test")
            .with_query("key", "secret")
            .with_query("param", "44201");

        let redacted = request.redacted_url();
        assert!(!redacted.contains("secret"));
        assert!(!redacted.contains("example.test&"));
        assert!(redacted.ends_with("email=***&key=***&param=44201"));
    }

    #[tokio::test]
    async fn mock_client_matches_first_route_and_records_requests() {
        let client = MockHttpClient::new()
            .respond("/a", HttpResponse::ok_json("first"))
            .respond("/", HttpResponse::ok_json("fallback"));

        let response = client
            .execute(HttpRequest::get("https://example.test/a"))
            .await
            .expect("mock responds");
        assert_eq!(response.body, "first");

        let missing = client
            .execute(HttpRequest::get("https://other.test"))
            .await
            .expect("mock responds");
        assert_eq!(missing.status, 404);
        assert_eq!(client.call_count(), 2);
        assert_eq!(client.requests().len(), 2);
    }
}
