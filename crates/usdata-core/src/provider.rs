//! Provider adapter contract.
//!
//! Every upstream agency is reached through one [`Provider`]. A provider
//! declares the operations it serves, receives arguments that already passed
//! validation, and reports failures as [`GatewayError`] values. It never
//! panics or raises past its boundary.

use std::future::Future;
use std::pin::Pin;

use crate::envelope::Envelope;
use crate::error::{GatewayError, GatewayResult};
use crate::registry::OperationSpec;
use crate::source::ProviderId;
use crate::validation::ValidArgs;

pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = GatewayResult<Envelope>> + Send + 'a>>;

/// Provider adapter trait object used by the gateway.
pub trait Provider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Operations bound to this provider. Names are unique across all providers.
    fn operations(&self) -> Vec<OperationSpec>;

    /// Runs one validated operation.
    fn invoke<'a>(&'a self, operation: &'a str, args: ValidArgs) -> ProviderFuture<'a>;

    /// Whether the provider's connection handle has been constructed and not yet released.
    fn is_connected(&self) -> bool;

    /// Releases the connection handle. Returns `true` only when a live handle was closed.
    fn release(&self) -> bool;
}

/// Error for an operation name that reached a provider which does not serve it.
pub(crate) fn unsupported(provider: ProviderId, operation: &str) -> GatewayError {
    GatewayError::internal(format!(
        "operation '{operation}' is not served by the {provider} adapter"
    ))
}
