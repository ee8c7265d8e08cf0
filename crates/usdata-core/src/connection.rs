//! Lazily constructed, exactly-once released HTTP client handles.
//!
//! Each adapter owns one [`LazyClient`]. The handle is built on the first
//! operation routed to the adapter; concurrent first calls wait on the same
//! initialization and share the result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::http_client::{HttpClient, HttpError, ReqwestHttpClient};
use crate::source::ProviderId;

/// Builds the long-lived transport for one provider.
pub trait ClientFactory: Send + Sync {
    fn build(&self, provider: ProviderId) -> Result<Arc<dyn HttpClient>, HttpError>;
}

/// Production factory: one reqwest client per provider, carrying that
/// provider's descriptive user agent.
#[derive(Debug, Clone)]
pub struct ReqwestClientFactory {
    user_agents: HashMap<ProviderId, String>,
}

impl ReqwestClientFactory {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let user_agents = ProviderId::ALL
            .into_iter()
            .map(|provider| (provider, config.provider(provider).user_agent.clone()))
            .collect();
        Self { user_agents }
    }
}

impl ClientFactory for ReqwestClientFactory {
    fn build(&self, provider: ProviderId) -> Result<Arc<dyn HttpClient>, HttpError> {
        let user_agent = self
            .user_agents
            .get(&provider)
            .map(String::as_str)
            .unwrap_or("usdata-gateway/0.1.0");
        let client = ReqwestHttpClient::new(user_agent)?;
        Ok(Arc::new(client))
    }
}

/// Hands out one shared client and counts how many times it was asked to.
pub struct FixedClientFactory {
    client: Arc<dyn HttpClient>,
    builds: AtomicUsize,
}

impl FixedClientFactory {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ClientFactory for FixedClientFactory {
    fn build(&self, _provider: ProviderId) -> Result<Arc<dyn HttpClient>, HttpError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.client))
    }
}

/// Per-adapter handle slot: uninitialized until first use, then ready until released.
pub struct LazyClient {
    provider: ProviderId,
    factory: Arc<dyn ClientFactory>,
    cell: OnceCell<Arc<dyn HttpClient>>,
    released: AtomicBool,
}

impl LazyClient {
    pub fn new(provider: ProviderId, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            provider,
            factory,
            cell: OnceCell::new(),
            released: AtomicBool::new(false),
        }
    }

    pub async fn get(&self) -> GatewayResult<Arc<dyn HttpClient>> {
        if self.released.load(Ordering::Acquire) {
            return Err(GatewayError::internal(format!(
                "{} connection handle has already been released",
                self.provider
            )));
        }

        let client = self
            .cell
            .get_or_try_init(|| async {
                let client = self.factory.build(self.provider)?;
                info!(provider = %self.provider, "constructed http client handle");
                Ok::<_, HttpError>(client)
            })
            .await
            .map_err(|e| {
                GatewayError::transport(format!(
                    "failed to create {} http client: {}",
                    self.provider,
                    e.message()
                ))
            })?;

        Ok(Arc::clone(client))
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized() && !self.released.load(Ordering::Acquire)
    }

    /// Closes the handle if one was built. Returns `true` only on the call
    /// that actually closed it; later calls are no-ops.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        match self.cell.get() {
            Some(client) => {
                client.close();
                info!(provider = %self.provider, "released http client handle");
                true
            }
            None => false,
        }
    }
}
