use eyre::Context as _;
use serde_json::{Map, Value};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::fsutil::open_private_append;

// Every audit line carries these keys; unknown ones are null.
const REQUIRED_KEYS: [&str; 8] = [
    "id",
    "ts",
    "op",
    "pool",
    "position",
    "signature",
    "result",
    "error_code",
];

pub fn utc_now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn normalize_entry(v: Value) -> Value {
    let mut obj = match v {
        Value::Object(m) => m,
        other @ (Value::Null
        | Value::Bool(_)
        | Value::Number(_)
        | Value::String(_)
        | Value::Array(_)) => {
            let mut m = Map::new();
            m.insert("raw".to_owned(), other);
            m
        }
    };

    if !obj.contains_key("id") {
        obj.insert(
            "id".to_owned(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    if !obj.contains_key("ts") {
        obj.insert("ts".to_owned(), Value::String(utc_now_iso()));
    }
    for k in REQUIRED_KEYS {
        if !obj.contains_key(k) {
            obj.insert(k.to_owned(), Value::Null);
        }
    }

    Value::Object(obj)
}

/// Append-only JSONL record of submitted transactions.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &Value) -> eyre::Result<()> {
        let entry = normalize_entry(entry.clone());
        let mut f = open_private_append(&self.path).context("open audit log")?;
        writeln!(f, "{entry}").context("write audit log")?;
        Ok(())
    }

    /// Append, logging instead of failing.
    pub fn record(&self, entry: &Value) {
        if let Err(e) = self.append(entry) {
            tracing::warn!(path = %self.path.display(), error = %e, "audit log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_get_id_ts_and_null_defaults() {
        let v = normalize_entry(json!({ "op": "add_liquidity", "signature": "abc" }));
        assert!(v.get("id").and_then(Value::as_str).is_some(), "id is generated");
        assert!(v.get("ts").and_then(Value::as_str).is_some(), "ts is generated");
        assert_eq!(v.get("error_code"), Some(&Value::Null));
        assert_eq!(v.get("signature").and_then(Value::as_str), Some("abc"));

        let raw = normalize_entry(json!("bare"));
        assert_eq!(raw.get("raw").and_then(Value::as_str), Some("bare"));
    }

    #[test]
    fn append_writes_one_line_per_entry() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = AuditLog::new(dir.path().join("data").join("audit.jsonl"));
        log.append(&json!({ "op": "claim_fees" }))?;
        log.record(&json!({ "op": "remove_liquidity", "result": "ok" }));
        let text = std::fs::read_to_string(log.path())?;
        let lines: Vec<Value> = text
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines.get(1).and_then(|v| v.get("result")).and_then(Value::as_str),
            Some("ok")
        );
        Ok(())
    }
}
