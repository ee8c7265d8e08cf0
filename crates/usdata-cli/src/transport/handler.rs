//! Request dispatcher: maps JSON-RPC methods onto the gateway.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{info, warn};
use usdata_core::{Envelope, Gateway};

use super::message::{RpcError, RpcResult, ToolCallParams};

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "usdata";

#[derive(Clone)]
pub struct ProtocolHandler {
    gateway: Arc<Gateway>,
    operation_timeout: Duration,
}

impl ProtocolHandler {
    pub fn new(gateway: Arc<Gateway>, operation_timeout: Duration) -> Self {
        Self {
            gateway,
            operation_timeout,
        }
    }

    /// Methods answered inline. `tools/call` is scheduled separately by the transport.
    pub fn handle_request(&self, method: &str, params: Option<Value>) -> RpcResult<Value> {
        match method {
            "initialize" => Ok(self.initialize(params)),
            "tools/list" => Ok(self.tools_list()),
            "ping" => Ok(Value::Object(Map::new())),
            other => Err(RpcError::MethodNotFound(other.to_owned())),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Value {
        let requested = params
            .as_ref()
            .and_then(|params| params.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        info!(protocol_version = requested, "client initialized");

        json!({
            "protocolVersion": requested,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
        })
    }

    fn tools_list(&self) -> Value {
        let tools: Vec<Value> = self
            .gateway
            .registry()
            .iter()
            .map(|spec| spec.describe())
            .collect();
        json!({ "tools": tools })
    }

    pub fn parse_tool_call(params: Option<Value>) -> RpcResult<ToolCallParams> {
        params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| RpcError::InvalidParams(e.to_string()))?
            .ok_or_else(|| RpcError::InvalidParams(String::from("Tool call params required")))
    }

    /// Runs one operation within the timeout budget and wraps the envelope as tool content.
    pub async fn call_tool(&self, params: ToolCallParams) -> Value {
        let arguments = params.arguments.unwrap_or_else(|| Value::Object(Map::new()));
        let dispatched = tokio::time::timeout(
            self.operation_timeout,
            self.gateway.dispatch(&params.name, &arguments),
        )
        .await;

        let envelope = dispatched.unwrap_or_else(|_| {
            let budget_ms = self.operation_timeout.as_millis();
            warn!(operation = %params.name, budget_ms, "operation timed out");
            let mut metadata = Map::new();
            metadata.insert(String::from("operation"), Value::String(params.name.clone()));
            Envelope::failure(
                format!("Operation '{}' timed out after {budget_ms} ms", params.name),
                metadata,
            )
        });

        tool_result(&envelope)
    }
}

fn tool_result(envelope: &Envelope) -> Value {
    let text = envelope
        .to_json(true)
        .unwrap_or_else(|e| format!("{{\"success\":false,\"error\":\"{e}\"}}"));
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": !envelope.success,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    #[test]
    fn tool_result_flags_failed_envelopes() {
        let failed = tool_result(&Envelope::failure("Unknown operation: nope", Map::new()));
        assert_eq!(failed["isError"], true);
        let text = failed["content"][0]["text"].as_str().expect("text content");
        assert!(text.contains("Unknown operation: nope"));

        let ok = tool_result(&Envelope::success(Vec::new(), Map::new()));
        assert_eq!(ok["isError"], false);
    }

    #[test]
    fn tool_call_requires_params() {
        assert!(matches!(
            ProtocolHandler::parse_tool_call(None),
            Err(RpcError::InvalidParams(_))
        ));
        let params = ProtocolHandler::parse_tool_call(Some(json!({"name": "get_form_types"})))
            .expect("params");
        assert!(params.arguments.is_none());
    }
}
