use crate::errors::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

pub fn ok(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: Some(result),
        error: None,
    }
}

pub fn err(id: Value, code: i64, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
        }),
    }
}

/// MCP tool result carrying `payload` as JSON text content.
pub fn tool_ok(payload: &Value) -> Value {
    json!({
      "content": [{ "type": "text", "text": payload.to_string() }],
      "isError": false
    })
}

pub fn tool_err(tool_error: &ToolError) -> Value {
    let text = serde_json::to_string(tool_error).unwrap_or_else(|_e| {
        "{\"code\":\"error\",\"message\":\"failed to serialize error\"}".into()
    });
    json!({
      "content": [{ "type": "text", "text": text }],
      "isError": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_results_embed_serialized_tool_error() -> eyre::Result<()> {
        let v = tool_err(&ToolError::new("zero_liquidity", "nothing to add"));
        assert_eq!(v.get("isError"), Some(&Value::Bool(true)));
        let text = v
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| eyre::eyre!("missing text content"))?;
        let inner: Value = serde_json::from_str(text)?;
        assert_eq!(inner.get("code").and_then(Value::as_str), Some("zero_liquidity"));
        assert!(inner.get("data").is_none(), "null data is omitted");
        Ok(())
    }

    #[test]
    fn responses_omit_the_unused_half() -> eyre::Result<()> {
        let s = serde_json::to_string(&ok(json!(1), json!({})))?;
        assert!(!s.contains("error"), "{s}");
        let s = serde_json::to_string(&err(json!(2), METHOD_NOT_FOUND, "method not found"))?;
        assert!(!s.contains("result"), "{s}");
        Ok(())
    }
}
