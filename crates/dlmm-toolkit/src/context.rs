//! Wires configuration into concrete collaborators for the CLI and the MCP server.

use solana_sdk::signature::Keypair;
use std::sync::Arc;

use crate::adapter::{ensure_https_or_loopback, HttpPoolClient};
use crate::audit::AuditLog;
use crate::chain::RpcConnection;
use crate::config::ToolkitConfig;
use crate::engine::DlmmEngine;
use crate::errors::DlmmError;
use crate::meteora_api::MeteoraApi;
use crate::paths::ToolkitPaths;
use crate::store::ConfigStore;
use crate::wallet::{keypair_from_base58, keypair_from_json_file, KeypairWallet};

pub const PRIVATE_KEY_ENV: &str = "DLMM_TOOLKIT_SOLANA_PRIVATE_KEY";

#[derive(Debug, Clone)]
pub struct ToolkitContext {
    pub paths: ToolkitPaths,
    pub cfg: ToolkitConfig,
}

impl ToolkitContext {
    pub fn load(paths: ToolkitPaths) -> eyre::Result<Self> {
        paths.ensure_private_dirs()?;
        let cfg = ConfigStore::new(&paths).load_or_init_default()?;
        Ok(Self { paths, cfg })
    }

    /// The signing key: `DLMM_TOOLKIT_SOLANA_PRIVATE_KEY` first, then the configured keypair file.
    pub fn keypair(&self) -> Result<Keypair, DlmmError> {
        if let Ok(secret) = std::env::var(PRIVATE_KEY_ENV) {
            if !secret.trim().is_empty() {
                return keypair_from_base58(&secret)
                    .map_err(|e| DlmmError::Validation(format!("{PRIVATE_KEY_ENV}: {e:#}")));
            }
        }
        let path = self.cfg.wallet.keypair_path.as_ref().ok_or_else(|| {
            DlmmError::Validation(format!(
                "no wallet configured: set {PRIVATE_KEY_ENV} or wallet.keypair_path"
            ))
        })?;
        keypair_from_json_file(path).map_err(|e| DlmmError::Validation(format!("{e:#}")))
    }

    pub fn engine(&self) -> Result<DlmmEngine, DlmmError> {
        let adapter_url = self
            .cfg
            .http
            .dlmm_adapter_base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                DlmmError::Validation(
                    "http.dlmm_adapter_base_url is not configured (or set DLMM_TOOLKIT_DLMM_ADAPTER_BASE_URL)"
                        .into(),
                )
            })?;
        ensure_https_or_loopback(&self.cfg.rpc.solana_rpc_url, "solana rpc url")?;
        let pools = Arc::new(HttpPoolClient::new(adapter_url, self.cfg.http_timeout())?);
        let keypair = self.keypair()?;

        let rpc = Arc::new(RpcConnection::new(
            &self.cfg.rpc.solana_rpc_url,
            &self.cfg.rpc.solana_fallback_rpc_urls,
            self.cfg.rpc_timeout(),
        ));
        let wallet = Arc::new(KeypairWallet::new(keypair, Arc::clone(&rpc)));
        Ok(DlmmEngine::new(
            wallet,
            rpc,
            pools,
            self.cfg.engine.to_engine_config(),
        )
        .with_audit_log(AuditLog::new(self.paths.audit_log())))
    }

    pub fn meteora(&self) -> Result<MeteoraApi, DlmmError> {
        MeteoraApi::new(&self.cfg.http.meteora_api_base_url, self.cfg.http_timeout())
    }
}
