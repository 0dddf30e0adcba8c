//! `PoolClient` backed by a DLMM transaction-construction service over HTTP.

use async_trait::async_trait;
use base64::Engine as _;
use bincode::Options as _;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, transaction::Transaction};
use std::time::Duration;

use crate::errors::{DlmmError, FailureClass};
use crate::pool::{PoolClient, PoolHandle};
use crate::types::{
    pubkey_str, ActiveBin, AddLiquidityByStrategy, Position, RemoveLiquidityRequest, TokenInfo,
};

pub const MAX_REMOTE_TX_BYTES: u64 = 2 * 1024 * 1024;

fn is_loopback_http(url: &str) -> bool {
    fn host_prefix_ok(s: &str, prefix: &str) -> bool {
        if !s.starts_with(prefix) {
            return false;
        }
        matches!(s.as_bytes().get(prefix.len()), None | Some(b':' | b'/'))
    }
    let u = url.trim();
    host_prefix_ok(u, "http://127.0.0.1")
        || host_prefix_ok(u, "http://localhost")
        || host_prefix_ok(u, "http://[::1]")
}

pub fn ensure_https_or_loopback(url: &str, name: &str) -> Result<(), DlmmError> {
    let u = url.trim();
    if u.starts_with("https://") || is_loopback_http(u) {
        return Ok(());
    }
    Err(DlmmError::Validation(format!(
        "{name} must use https (or http://localhost for local testing)"
    )))
}

/// Decode a base64 bincode legacy transaction, bounded in size.
pub fn decode_tx_b64(b64: &str) -> Result<Transaction, DlmmError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|e| DlmmError::Decode(format!("transaction base64: {e}")))?;
    bincode::DefaultOptions::new()
        .with_limit(MAX_REMOTE_TX_BYTES)
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .deserialize(&bytes)
        .map_err(|e| DlmmError::Decode(format!("deserialize transaction: {e}")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TxEnvelope {
    One { tx_b64: String },
    Many { txs_b64: Vec<String> },
}

impl TxEnvelope {
    fn into_transactions(self) -> Result<Vec<Transaction>, DlmmError> {
        match self {
            Self::One { tx_b64 } => Ok(vec![decode_tx_b64(&tx_b64)?]),
            Self::Many { txs_b64 } => txs_b64.iter().map(|s| decode_tx_b64(s)).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PairInfo {
    #[serde(with = "pubkey_str")]
    address: Pubkey,
    #[serde(default)]
    bin_step: u16,
    token_x: TokenInfo,
    token_y: TokenInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct UserPositions {
    #[serde(default)]
    user_positions: Vec<Position>,
}

#[derive(Debug, Serialize)]
struct ClaimRequest {
    #[serde(with = "pubkey_str")]
    owner: Pubkey,
    #[serde(with = "pubkey_str")]
    position: Pubkey,
}

#[derive(Debug, Clone)]
pub struct HttpPoolClient {
    base_url: String,
    http: Client,
}

impl HttpPoolClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DlmmError> {
        ensure_https_or_loopback(base_url, "dlmm adapter base url")?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DlmmError::Validation(format!("build http client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            http,
        })
    }
}

#[derive(Debug, Clone)]
struct Api {
    base_url: String,
    http: Client,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a JSON resource; 404 maps to `Ok(None)`.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        context: &'static str,
        path: &str,
    ) -> Result<Option<T>, DlmmError> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| DlmmError::read(context, &e, FailureClass::from_reqwest(&e)))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(DlmmError::read(
                context,
                format!("dlmm adapter http {}", resp.status()),
                FailureClass::Other,
            ));
        }
        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|e| DlmmError::read(context, &e, FailureClass::from_reqwest(&e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        context: &'static str,
        path: &str,
    ) -> Result<T, DlmmError> {
        self.get_optional(context, path).await?.ok_or_else(|| {
            DlmmError::read(context, format!("{path} not found"), FailureClass::Other)
        })
    }

    async fn build<B: Serialize + Sync>(
        &self,
        context: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Vec<Transaction>, DlmmError> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| DlmmError::protocol(context, e))?;
        if !resp.status().is_success() {
            return Err(DlmmError::protocol(
                context,
                format!("dlmm adapter http {}", resp.status()),
            ));
        }
        let envelope: TxEnvelope = resp
            .json()
            .await
            .map_err(|e| DlmmError::protocol(context, format!("decode tx envelope: {e}")))?;
        envelope.into_transactions()
    }

    async fn build_one<B: Serialize + Sync>(
        &self,
        context: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Transaction, DlmmError> {
        let mut txs = self.build(context, path, body).await?;
        if txs.len() != 1 {
            return Err(DlmmError::protocol(
                context,
                format!("expected one transaction, got {}", txs.len()),
            ));
        }
        txs.pop()
            .ok_or_else(|| DlmmError::protocol(context, "empty transaction list"))
    }
}

#[async_trait]
impl PoolClient for HttpPoolClient {
    async fn open(&self, pool: &Pubkey) -> Result<Box<dyn PoolHandle>, DlmmError> {
        let api = Api {
            base_url: self.base_url.clone(),
            http: self.http.clone(),
        };
        let info: PairInfo = api.get("get pool", &format!("/dlmm/pairs/{pool}")).await?;
        if info.address != *pool {
            return Err(DlmmError::protocol(
                "get pool",
                format!("adapter returned pool {} for {pool}", info.address),
            ));
        }
        tracing::debug!(pool = %pool, bin_step = info.bin_step, "opened pool");
        Ok(Box::new(HttpPool { api, info }))
    }
}

struct HttpPool {
    api: Api,
    info: PairInfo,
}

#[async_trait]
impl PoolHandle for HttpPool {
    fn address(&self) -> Pubkey {
        self.info.address
    }

    fn token_x(&self) -> TokenInfo {
        self.info.token_x
    }

    fn token_y(&self) -> TokenInfo {
        self.info.token_y
    }

    async fn get_active_bin(&self) -> Result<ActiveBin, DlmmError> {
        self.api
            .get(
                "get active bin",
                &format!("/dlmm/pairs/{}/active-bin", self.info.address),
            )
            .await
    }

    async fn get_positions_by_user(&self, user: &Pubkey) -> Result<Vec<Position>, DlmmError> {
        let out: UserPositions = self
            .api
            .get(
                "get positions",
                &format!("/dlmm/pairs/{}/positions?user={user}", self.info.address),
            )
            .await?;
        Ok(out.user_positions)
    }

    async fn get_position(&self, position: &Pubkey) -> Result<Option<Position>, DlmmError> {
        self.api
            .get_optional("get position", &format!("/dlmm/positions/{position}"))
            .await
    }

    async fn initialize_position_and_add_liquidity_by_strategy(
        &self,
        params: &AddLiquidityByStrategy,
    ) -> Result<Transaction, DlmmError> {
        self.api
            .build_one(
                "build initialize position transaction",
                &format!(
                    "/dlmm/pairs/{}/initialize-position-and-add-liquidity",
                    self.info.address
                ),
                params,
            )
            .await
    }

    async fn add_liquidity_by_strategy(
        &self,
        params: &AddLiquidityByStrategy,
    ) -> Result<Transaction, DlmmError> {
        self.api
            .build_one(
                "build add liquidity transaction",
                &format!("/dlmm/pairs/{}/add-liquidity", self.info.address),
                params,
            )
            .await
    }

    async fn remove_liquidity(
        &self,
        req: &RemoveLiquidityRequest,
    ) -> Result<Vec<Transaction>, DlmmError> {
        self.api
            .build(
                "build remove liquidity transaction",
                &format!("/dlmm/pairs/{}/remove-liquidity", self.info.address),
                req,
            )
            .await
    }

    async fn claim_swap_fee(
        &self,
        owner: &Pubkey,
        position: &Pubkey,
    ) -> Result<Vec<Transaction>, DlmmError> {
        self.api
            .build(
                "build claim fee transaction",
                &format!("/dlmm/pairs/{}/claim-swap-fee", self.info.address),
                &ClaimRequest {
                    owner: *owner,
                    position: *position,
                },
            )
            .await
    }
}
