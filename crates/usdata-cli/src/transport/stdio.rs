//! Stdio transport: reads JSON-RPC from stdin, writes to stdout.
//!
//! Each `tools/call` runs as its own task so slow upstreams never block the
//! read loop. `notifications/cancelled` aborts the matching task, which then
//! produces no response. On EOF the loop waits for every in-flight call
//! before returning.

use std::collections::HashMap;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use super::framing;
use super::handler::ProtocolHandler;
use super::message::{success_response, CancelledParams, IncomingMessage, RequestId, RpcError, RpcResult};

pub struct StdioTransport {
    handler: ProtocolHandler,
}

/// In-flight bookkeeping for one read loop.
struct Calls {
    tasks: JoinSet<Option<Value>>,
    by_id: HashMap<RequestId, AbortHandle>,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self { handler }
    }

    pub async fn run(&self) -> RpcResult<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> RpcResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut calls = Calls {
            tasks: JoinSet::new(),
            by_id: HashMap::new(),
        };

        info!("stdio transport started");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!(in_flight = calls.tasks.len(), "EOF on stdin, draining calls");
                        break;
                    };
                    if let Some(frame) = self.on_line(&line, &mut calls) {
                        write_frame(&mut writer, &frame).await?;
                    }
                }
                Some(joined) = calls.tasks.join_next(), if !calls.tasks.is_empty() => {
                    if let Some(frame) = completed(joined) {
                        write_frame(&mut writer, &frame).await?;
                    }
                }
            }
        }

        while let Some(joined) = calls.tasks.join_next().await {
            if let Some(frame) = completed(joined) {
                write_frame(&mut writer, &frame).await?;
            }
        }
        Ok(())
    }

    fn on_line(&self, line: &str, calls: &mut Calls) -> Option<Value> {
        if line.trim().is_empty() {
            return None;
        }

        let message = match framing::parse_message(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Parse error: {e}");
                return Some(e.to_response(None));
            }
        };
        if message.jsonrpc.as_deref().is_some_and(|version| version != "2.0") {
            let e = RpcError::InvalidRequest(String::from("jsonrpc must be \"2.0\""));
            return Some(e.to_response(message.id.as_ref()));
        }

        match (message.id.clone(), message.method.clone()) {
            (Some(id), Some(method)) => self.on_request(id, &method, message, calls),
            (None, Some(method)) => {
                on_notification(&method, message.params, calls);
                None
            }
            (id, None) => {
                warn!("Received message without a method");
                id.map(|id| {
                    RpcError::InvalidRequest(String::from("method is required"))
                        .to_response(Some(&id))
                })
            }
        }
    }

    fn on_request(
        &self,
        id: RequestId,
        method: &str,
        message: IncomingMessage,
        calls: &mut Calls,
    ) -> Option<Value> {
        if method != "tools/call" {
            return Some(match self.handler.handle_request(method, message.params) {
                Ok(result) => success_response(&id, result),
                Err(e) => e.to_response(Some(&id)),
            });
        }

        let params = match ProtocolHandler::parse_tool_call(message.params) {
            Ok(params) => params,
            Err(e) => return Some(e.to_response(Some(&id))),
        };

        let span = tracing::info_span!(
            "tool_call",
            call_id = %Uuid::new_v4(),
            request = %id,
            tool = %params.name
        );
        let handler = self.handler.clone();
        let response_id = id.clone();
        let abort = calls.tasks.spawn(
            async move {
                let result = handler.call_tool(params).await;
                Some(success_response(&response_id, result))
            }
            .instrument(span),
        );

        calls.by_id.retain(|_, handle| !handle.is_finished());
        calls.by_id.insert(id, abort);
        None
    }
}

fn on_notification(method: &str, params: Option<Value>, calls: &mut Calls) {
    match method {
        "notifications/cancelled" => {
            let Some(cancel) = params.and_then(|p| serde_json::from_value::<CancelledParams>(p).ok())
            else {
                warn!("cancellation without a usable requestId");
                return;
            };
            match calls.by_id.remove(&cancel.request_id) {
                Some(handle) => {
                    handle.abort();
                    info!(
                        request = %cancel.request_id,
                        reason = cancel.reason.as_deref().unwrap_or(""),
                        "cancelled in-flight call"
                    );
                }
                None => debug!(request = %cancel.request_id, "cancellation for unknown call"),
            }
        }
        "notifications/initialized" | "initialized" => debug!("client finished initialization"),
        other => debug!("Unknown notification: {other}"),
    }
}

fn completed(joined: Result<Option<Value>, JoinError>) -> Option<Value> {
    match joined {
        Ok(frame) => frame,
        Err(e) if e.is_cancelled() => None,
        Err(e) => {
            error!("tool call task failed: {e}");
            None
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) -> RpcResult<()> {
    let framed = framing::frame_message(value)?;
    writer.write_all(framed.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use usdata_core::{ClientFactory, FixedClientFactory, Gateway, GatewayConfig, MockHttpClient};

    use super::*;

    fn transport(client: MockHttpClient, timeout: Duration) -> (StdioTransport, Arc<Gateway>) {
        let factory: Arc<dyn ClientFactory> = Arc::new(FixedClientFactory::new(Arc::new(client)));
        let gateway = Arc::new(
            Gateway::with_factory(&GatewayConfig::default(), factory).expect("gateway builds"),
        );
        let handler = ProtocolHandler::new(Arc::clone(&gateway), timeout);
        (StdioTransport::new(handler), gateway)
    }

    async fn exchange(transport: &StdioTransport, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        transport
            .serve(BufReader::new(input.as_bytes()), &mut output)
            .await
            .expect("transport runs");
        String::from_utf8(output)
            .expect("utf-8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json frame"))
            .collect()
    }

    fn by_id(frames: &[Value], id: i64) -> Option<&Value> {
        frames.iter().find(|frame| frame["id"] == json!(id))
    }

    #[tokio::test]
    async fn answers_handshake_listing_and_ping() {
        let (transport, gateway) = transport(MockHttpClient::new(), Duration::from_secs(5));
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#, "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#, "\n",
        );

        let frames = exchange(&transport, input).await;
        assert_eq!(frames.len(), 3);
        assert_eq!(by_id(&frames, 1).expect("init")["result"]["serverInfo"]["name"], "usdata");
        let tools = by_id(&frames, 2).expect("list")["result"]["tools"]
            .as_array()
            .expect("tools")
            .len();
        assert_eq!(tools, gateway.registry().len());
        assert_eq!(by_id(&frames, 3).expect("ping")["result"], json!({}));
    }

    #[tokio::test]
    async fn reports_protocol_errors() {
        let (transport, _) = transport(MockHttpClient::new(), Duration::from_secs(5));
        let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":4,\"method\":\"resources/list\"}\n";

        let frames = exchange(&transport, input).await;
        assert_eq!(frames[0]["id"], Value::Null);
        assert_eq!(frames[0]["error"]["code"], -32700);
        assert_eq!(by_id(&frames, 4).expect("error")["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn tool_call_returns_envelope_text() {
        let (transport, _) = transport(MockHttpClient::new(), Duration::from_secs(5));
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"get_state_fips","arguments":{"state_name":"texas"}}}"#, "\n",
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"no_such_tool"}}"#, "\n",
        );

        let frames = exchange(&transport, input).await;
        let found = &by_id(&frames, 5).expect("call")["result"];
        assert_eq!(found["isError"], false);
        let envelope: Value =
            serde_json::from_str(found["content"][0]["text"].as_str().expect("text")).expect("envelope");
        assert_eq!(envelope["data"][0]["fips_code"], "48");

        let unknown = &by_id(&frames, 6).expect("call")["result"];
        assert_eq!(unknown["isError"], true);
        assert!(unknown["content"][0]["text"]
            .as_str()
            .expect("text")
            .contains("Unknown operation: no_such_tool"));
    }

    #[tokio::test]
    async fn slow_call_times_out_into_failed_envelope() {
        let client = MockHttpClient::new().with_delay(Duration::from_secs(5));
        let (transport, _) = transport(client, Duration::from_millis(20));
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"get_company_facts","arguments":{"cik":"320193"}}}"#, "\n",
        );

        let frames = exchange(&transport, input).await;
        let result = &by_id(&frames, 7).expect("call")["result"];
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().expect("text").contains("timed out"));
    }

    #[tokio::test]
    async fn cancelled_call_produces_no_response() {
        let client = MockHttpClient::new().with_delay(Duration::from_secs(30));
        let (transport, _) = transport(client, Duration::from_secs(60));
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"get_company_facts","arguments":{"cik":"320193"}}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":8,"reason":"user abort"}}"#, "\n",
            r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#, "\n",
        );

        let frames = tokio::time::timeout(Duration::from_secs(10), exchange(&transport, input))
            .await
            .expect("cancelled call does not hold the drain");
        assert!(by_id(&frames, 8).is_none());
        assert!(by_id(&frames, 9).is_some());
    }
}
