//! Concrete provider adapters and the fetch helpers they share.

mod air_quality;
mod census;
mod drugs;
mod filings;
mod labor;

pub use air_quality::AirQualityAdapter;
pub use census::CensusAdapter;
pub use drugs::DrugsAdapter;
pub use filings::{normalize_cik, FilingsAdapter};
pub use labor::LaborAdapter;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::source::ProviderId;

/// Issues one request, mapping transport failures into gateway errors.
pub(crate) async fn send(
    client: &dyn HttpClient,
    provider: ProviderId,
    request: HttpRequest,
) -> GatewayResult<HttpResponse> {
    debug!(
        provider = %provider,
        method = ?request.method,
        url = %request.redacted_url(),
        "sending upstream request"
    );
    let response = client.execute(request).await.map_err(|e| {
        warn!(provider = %provider, error = %e, "upstream transport failure");
        GatewayError::transport(format!("{provider} request failed: {}", e.message()))
    })?;
    debug!(provider = %provider, status = response.status, "upstream replied");
    Ok(response)
}

/// Rejects non-2xx replies with `HTTP {status}: {truncated body}`.
pub(crate) fn ensure_success(provider: ProviderId, response: &HttpResponse) -> GatewayResult<()> {
    if response.is_success() {
        return Ok(());
    }
    warn!(provider = %provider, status = response.status, "upstream returned error status");
    Err(GatewayError::http_status(response.status, &response.body))
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    provider: ProviderId,
    response: &HttpResponse,
) -> GatewayResult<T> {
    serde_json::from_str(&response.body).map_err(|e| {
        warn!(provider = %provider, error = %e, "malformed upstream body");
        GatewayError::transport(format!("malformed {provider} response body: {e}"))
    })
}

/// `send`, `ensure_success` and `parse_json` in one step.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &dyn HttpClient,
    provider: ProviderId,
    request: HttpRequest,
) -> GatewayResult<T> {
    let response = send(client, provider, request).await?;
    ensure_success(provider, &response)?;
    parse_json(provider, &response)
}
