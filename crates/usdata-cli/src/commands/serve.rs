use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use usdata_core::ShutdownGuard;

use crate::transport::{ProtocolHandler, StdioTransport};

/// Serves until stdin closes. Handles are released when `guard` drops,
/// including on error returns.
pub async fn run(guard: ShutdownGuard, operation_timeout_ms: u64) -> anyhow::Result<()> {
    let gateway = Arc::clone(guard.gateway());
    info!(
        operations = gateway.registry().len(),
        operation_timeout_ms, "starting usdata server"
    );

    let handler = ProtocolHandler::new(
        Arc::clone(&gateway),
        Duration::from_millis(operation_timeout_ms),
    );
    StdioTransport::new(handler)
        .run()
        .await
        .context("stdio transport failed")?;

    for snapshot in gateway.snapshots().into_iter().filter(|s| s.connected) {
        info!(provider = %snapshot.id, status = snapshot.status_label(), "releasing provider handle");
    }
    drop(guard);
    Ok(())
}
