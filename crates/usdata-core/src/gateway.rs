use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn, Instrument};

use crate::adapters::{AirQualityAdapter, CensusAdapter, DrugsAdapter, FilingsAdapter, LaborAdapter};
use crate::config::GatewayConfig;
use crate::connection::{ClientFactory, ReqwestClientFactory};
use crate::envelope::Envelope;
use crate::error::{GatewayError, GatewayResult};
use crate::provider::Provider;
use crate::registry::{OperationRegistry, OperationSpec};
use crate::source::ProviderId;

/// Connection state of one provider, as reported by [`Gateway::snapshots`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSnapshot {
    pub id: ProviderId,
    pub operations: usize,
    pub connected: bool,
}

impl ProviderSnapshot {
    pub fn status_label(self) -> &'static str {
        if self.connected {
            "connected"
        } else {
            "idle"
        }
    }
}

/// Operation registry plus the adapters it dispatches to.
pub struct Gateway {
    registry: OperationRegistry,
    providers: HashMap<ProviderId, Arc<dyn Provider>>,
    order: Vec<ProviderId>,
}

/// Registers providers in order; their operation names must not collide.
#[derive(Default)]
pub struct GatewayBuilder {
    providers: Vec<Arc<dyn Provider>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// All five agency adapters, sharing one client factory.
    pub fn with_default_providers(
        self,
        config: &GatewayConfig,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        self.with_provider(Arc::new(CensusAdapter::from_gateway_config(
            config,
            Arc::clone(&factory),
        )))
        .with_provider(Arc::new(LaborAdapter::from_gateway_config(
            config,
            Arc::clone(&factory),
        )))
        .with_provider(Arc::new(AirQualityAdapter::from_gateway_config(
            config,
            Arc::clone(&factory),
        )))
        .with_provider(Arc::new(DrugsAdapter::from_gateway_config(
            config,
            Arc::clone(&factory),
        )))
        .with_provider(Arc::new(FilingsAdapter::from_gateway_config(config, factory)))
    }

    pub fn build(self) -> GatewayResult<Gateway> {
        let mut registry = OperationRegistry::new();
        let mut providers = HashMap::new();
        let mut order = Vec::new();

        for provider in self.providers {
            let id = provider.id();
            if providers.contains_key(&id) {
                return Err(GatewayError::internal(format!(
                    "provider '{id}' is registered twice"
                )));
            }
            for spec in provider.operations() {
                if spec.provider != id {
                    return Err(GatewayError::internal(format!(
                        "operation '{}' declared by {id} is bound to {}",
                        spec.name, spec.provider
                    )));
                }
                registry.register(spec)?;
            }
            order.push(id);
            providers.insert(id, provider);
        }

        debug!(operations = registry.len(), providers = order.len(), "gateway assembled");
        Ok(Gateway {
            registry,
            providers,
            order,
        })
    }
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Production gateway backed by reqwest clients.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let factory: Arc<dyn ClientFactory> = Arc::new(ReqwestClientFactory::from_config(config));
        Self::with_factory(config, factory)
    }

    pub fn with_factory(
        config: &GatewayConfig,
        factory: Arc<dyn ClientFactory>,
    ) -> GatewayResult<Self> {
        GatewayBuilder::new()
            .with_default_providers(config, factory)
            .build()
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn operation(&self, name: &str) -> Option<&OperationSpec> {
        self.registry.get(name)
    }

    pub fn provider(&self, id: ProviderId) -> Option<&Arc<dyn Provider>> {
        self.providers.get(&id)
    }

    pub fn snapshots(&self) -> Vec<ProviderSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.providers.get(id))
            .map(|provider| ProviderSnapshot {
                id: provider.id(),
                operations: self.registry.for_provider(provider.id()).count(),
                connected: provider.is_connected(),
            })
            .collect()
    }

    /// Lookup, validation and invocation, with failures kept as errors.
    ///
    /// Validation runs before the provider is touched, so a rejected call
    /// never constructs a connection handle.
    pub async fn try_dispatch(&self, name: &str, args: &Value) -> GatewayResult<Envelope> {
        let spec = self
            .registry
            .get(name)
            .ok_or_else(|| GatewayError::unknown_operation(name))?;
        let provider = self
            .providers
            .get(&spec.provider)
            .ok_or_else(|| {
                GatewayError::internal(format!("no adapter registered for {}", spec.provider))
            })?;

        let valid = spec.validate(args)?;
        provider.invoke(spec.name, valid).await
    }

    /// Runs one operation and always returns an envelope.
    pub async fn dispatch(&self, name: &str, args: &Value) -> Envelope {
        let provider = self
            .registry
            .get(name)
            .map(|spec| spec.provider.as_str())
            .unwrap_or("none");
        let span = tracing::debug_span!("dispatch", operation = name, provider);

        async {
            let result = self.try_dispatch(name, args).await;
            match &result {
                Ok(envelope) => debug!(count = envelope.count(), "operation completed"),
                Err(error) => warn!(code = error.code(), error = %error.message(), "operation failed"),
            }
            Envelope::from_result(result)
        }
        .instrument(span)
        .await
    }

    /// Releases every constructed handle. Returns how many were actually closed.
    pub fn shutdown(&self) -> usize {
        let released = self
            .order
            .iter()
            .filter_map(|id| self.providers.get(id))
            .filter(|provider| provider.release())
            .count();
        info!(released, "gateway shut down");
        released
    }
}

/// Calls [`Gateway::shutdown`] when dropped, covering early returns and panics.
pub struct ShutdownGuard {
    gateway: Arc<Gateway>,
}

impl ShutdownGuard {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.gateway.shutdown();
    }
}
