//! User-facing CLI output: JSON results on stdout, operator notes on stderr.

use eyre::Context as _;
use serde::Serialize;
use std::io::{IsTerminal as _, Write as _};

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

/// Write one JSON document to stdout.
pub fn print_json<T: Serialize>(v: &T) -> eyre::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write output")?;
    Ok(())
}

fn mcp_banner_enabled() -> bool {
    // Default: only when stderr is a terminal. Force with DLMM_TOOLKIT_BANNER.
    match std::env::var("DLMM_TOOLKIT_BANNER") {
        Ok(v) => {
            let v = v.trim().to_ascii_lowercase();
            !(v.is_empty() || v == "0" || v == "false" || v == "no" || v == "off")
        }
        Err(_) => std::io::stderr().is_terminal(),
    }
}

/// MCP startup banner on stderr; MCP clients read stdout.
pub fn print_mcp_banner(version: &str, adapter_configured: bool) {
    if !mcp_banner_enabled() {
        return;
    }
    let adapter = if adapter_configured {
        "configured"
    } else {
        "missing (liquidity tools disabled)"
    };
    stderr_writeln(&format!(
        "dlmm-toolkit MCP\n================\nVersion : v{version}\nAdapter : {adapter}\nMode    : stdio"
    ));
}
