use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, BufReader};
use tracing::warn;

use crate::context::ToolkitContext;

mod jsonrpc;
mod tools;
mod transport;

pub use jsonrpc::{err, ok, tool_err, tool_ok, JsonRpcResponse};
pub use tools::{call_tool, list_tools_result, tool_schemas};

pub const MAX_JSONRPC_LINE_BYTES: usize = 1_000_000;
const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcNotification {
    jsonrpc: String,
}

/// Parse one line. `None` means skip it (bad JSON or a notification).
fn parse_line(line: &str) -> Option<Result<JsonRpcRequest, JsonRpcResponse>> {
    let v: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "invalid json on stdin");
            return None;
        }
    };

    // Ignore notifications (no "id").
    if v.get("id").is_none() {
        if let Ok(note) = serde_json::from_value::<JsonRpcNotification>(v.clone()) {
            if note.jsonrpc == "2.0" {
                return None;
            }
        }
    }

    let req: JsonRpcRequest = match serde_json::from_value(v) {
        Ok(parsed_req) => parsed_req,
        Err(e) => {
            warn!(error = %e, "failed to parse jsonrpc request");
            return None;
        }
    };

    if req.jsonrpc != "2.0" {
        return Some(Err(err(
            req.id,
            jsonrpc::INVALID_REQUEST,
            "invalid jsonrpc version",
        )));
    }
    Some(Ok(req))
}

async fn handle_request(ctx: &ToolkitContext, req: JsonRpcRequest) -> JsonRpcResponse {
    match req.method.as_str() {
        "initialize" => ok(
            req.id,
            json!({
              "protocolVersion": PROTOCOL_VERSION,
              "serverInfo": { "name": "dlmm-toolkit", "version": env!("CARGO_PKG_VERSION") },
              "capabilities": { "tools": {} }
            }),
        ),
        "ping" => ok(req.id, json!({})),
        "tools/list" => ok(req.id, list_tools_result()),
        "tools/call" => {
            let name = req
                .params
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("");
            let args = req.params.get("arguments").cloned().unwrap_or(Value::Null);
            let result = match call_tool(ctx, name, args).await {
                Ok(payload) => tool_ok(&payload),
                Err(te) => tool_err(&te),
            };
            ok(req.id, result)
        }
        _ => err(req.id, jsonrpc::METHOD_NOT_FOUND, "method not found"),
    }
}

/// Serve newline-delimited JSON-RPC until EOF or an oversized line.
pub async fn serve<R, W>(ctx: &ToolkitContext, input: R, out: &mut W) -> eyre::Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.len() > MAX_JSONRPC_LINE_BYTES {
            warn!(bytes = line.len(), "oversized jsonrpc line, closing session");
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let resp = match parse_line(&line) {
            Some(Ok(req)) => handle_request(ctx, req).await,
            Some(Err(resp)) => resp,
            None => continue,
        };
        transport::write_frame(out, &resp).await?;
    }
    Ok(())
}

pub async fn run(ctx: &ToolkitContext) -> eyre::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    serve(ctx, stdin, &mut stdout).await
}
