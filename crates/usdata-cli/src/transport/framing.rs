//! Message framing for newline-delimited JSON.

use super::message::{IncomingMessage, RpcError, RpcResult};

/// Parse a single line of text as a JSON-RPC message.
pub fn parse_message(line: &str) -> RpcResult<IncomingMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(RpcError::ParseError(String::from("Empty message")));
    }

    serde_json::from_str(trimmed).map_err(|e| RpcError::ParseError(e.to_string()))
}

/// Serialize a value to a JSON line (with trailing newline).
pub fn frame_message(value: &serde_json::Value) -> RpcResult<String> {
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::message::RequestId;

    #[test]
    fn parses_requests_and_notifications() {
        let request = parse_message(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).expect("request");
        assert_eq!(request.id, Some(RequestId::Number(7)));

        let notification =
            parse_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).expect("notification");
        assert!(notification.id.is_none());

        assert!(matches!(parse_message("   "), Err(RpcError::ParseError(_))));
        assert!(matches!(parse_message("{oops"), Err(RpcError::ParseError(_))));
    }

    #[test]
    fn frames_end_with_newline() {
        let frame = frame_message(&json!({"ok": true})).expect("frames");
        assert_eq!(frame, "{\"ok\":true}\n");
    }
}
