use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{EngineConfig, DEFAULT_MAX_ADD_ATTEMPTS, DLMM_PROGRAM_ID};
use crate::meteora_api::DEFAULT_METEORA_API_BASE_URL;
use crate::resolver::DEFAULT_RANGE_INTERVAL;
use crate::retry::ReadRetryConfig;

pub const SOLANA_MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Solana RPC endpoint URL.
    pub solana_rpc_url: String,
    /// Additional Solana RPC endpoints tried, in order, when the primary times out or refuses.
    pub solana_fallback_rpc_urls: Vec<String>,
    pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            solana_rpc_url: SOLANA_MAINNET_RPC_URL.into(),
            solana_fallback_rpc_urls: vec![
                "https://solana-rpc.publicnode.com".into(),
                "https://rpc.ankr.com/solana".into(),
            ],
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// DLMM transaction-construction adapter base URL.
    ///
    /// Required for every operation that touches a pool. Must be `https`, except
    /// `http://localhost` / `http://127.0.0.1` / `http://[::1]` for local testing.
    pub dlmm_adapter_base_url: Option<String>,
    /// Public DLMM API used for pool discovery.
    pub meteora_api_base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            dlmm_adapter_base_url: None,
            meteora_api_base_url: DEFAULT_METEORA_API_BASE_URL.into(),
            request_timeout_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Solana CLI keypair file (JSON array of 64 bytes).
    pub keypair_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub range_interval: u32,
    pub max_add_attempts: u32,
    pub confirmation_timeout_ms: u64,
    pub confirmation_poll_interval_ms: u64,
    pub read_retry_attempts: u32,
    pub read_retry_base_delay_ms: u64,
    pub tx_fetch_attempts: u32,
    pub tx_fetch_base_delay_ms: u64,
    pub dlmm_program_id: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            range_interval: DEFAULT_RANGE_INTERVAL,
            max_add_attempts: DEFAULT_MAX_ADD_ATTEMPTS,
            confirmation_timeout_ms: 120_000,
            confirmation_poll_interval_ms: 2_000,
            read_retry_attempts: 3,
            read_retry_base_delay_ms: 1_000,
            tx_fetch_attempts: 5,
            tx_fetch_base_delay_ms: 1_000,
            dlmm_program_id: DLMM_PROGRAM_ID.into(),
        }
    }
}

impl EngineSettings {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            range_interval: self.range_interval,
            max_add_attempts: self.max_add_attempts.max(1),
            confirmation_timeout: Duration::from_millis(self.confirmation_timeout_ms),
            confirmation_poll_interval: Duration::from_millis(self.confirmation_poll_interval_ms),
            read_retry: ReadRetryConfig {
                attempts: self.read_retry_attempts.max(1),
                base_delay: Duration::from_millis(self.read_retry_base_delay_ms),
            },
            tx_fetch: ReadRetryConfig {
                attempts: self.tx_fetch_attempts.max(1),
                base_delay: Duration::from_millis(self.tx_fetch_base_delay_ms),
            },
            dlmm_program_id: self.dlmm_program_id.trim().to_owned(),
            ..EngineConfig::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub rpc: RpcConfig,
    pub http: HttpConfig,
    pub wallet: WalletConfig,
    pub engine: EngineSettings,
}

impl ToolkitConfig {
    pub const fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc.request_timeout_ms)
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http.request_timeout_ms)
    }
}
