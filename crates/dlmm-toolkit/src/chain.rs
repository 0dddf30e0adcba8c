use async_trait::async_trait;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::RpcRequest;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    hash::Hash, program_pack::Pack as _, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use spl_associated_token_account::get_associated_token_address;
use std::future::Future;
use std::time::Duration;

use crate::decode::{ParsedTransaction, SignatureStatus, SimulationResponse};
use crate::errors::{DlmmError, FailureClass};
use crate::retry::try_endpoints;

/// Read-side chain access the engine depends on.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Simulate without signature verification, with inner-instruction tracing.
    async fn simulate_transaction(&self, tx: &Transaction)
        -> Result<SimulationResponse, DlmmError>;

    /// `Ok(None)` when the node does not (yet) know the transaction.
    async fn get_parsed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ParsedTransaction>, DlmmError>;

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, DlmmError>;
}

#[derive(Debug, Deserialize)]
struct RpcValue<T> {
    value: T,
}

pub fn classify_client_error(e: &ClientError) -> FailureClass {
    match e.kind() {
        ClientErrorKind::Io(_) => FailureClass::Connection,
        ClientErrorKind::Reqwest(re) if re.is_timeout() => FailureClass::Timeout,
        ClientErrorKind::Reqwest(re) if re.is_connect() || re.is_request() => {
            FailureClass::Connection
        }
        _ => FailureClass::Other,
    }
}

/// Solana JSON-RPC over a primary URL plus ordered fallbacks.
#[derive(Debug, Clone)]
pub struct RpcConnection {
    pub rpc_url: String,
    pub fallback_rpc_urls: Vec<String>,
    pub timeout: Duration,
}

impl RpcConnection {
    pub fn new(rpc_url: &str, fallback_rpc_urls: &[String], timeout: Duration) -> Self {
        Self {
            rpc_url: rpc_url.to_owned(),
            fallback_rpc_urls: fallback_rpc_urls.to_vec(),
            timeout,
        }
    }

    fn all_rpc_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(1 + self.fallback_rpc_urls.len());
        for u in std::iter::once(&self.rpc_url).chain(&self.fallback_rpc_urls) {
            let t = u.trim();
            if t.is_empty() || urls.iter().any(|x| x == t) {
                continue;
            }
            urls.push(t.to_owned());
        }
        urls
    }

    fn rpc_for_url(&self, url: &str) -> RpcClient {
        RpcClient::new_with_timeout_and_commitment(
            url.to_owned(),
            self.timeout,
            CommitmentConfig::confirmed(),
        )
    }

    async fn with_fallback<T, Fut>(
        &self,
        context: &'static str,
        f: impl Fn(RpcClient) -> Fut + Sync + Send,
    ) -> Result<T, DlmmError>
    where
        T: Send,
        Fut: Future<Output = Result<T, ClientError>> + Send,
    {
        let urls = self.all_rpc_urls();
        try_endpoints(&urls, |u| {
            let rpc = self.rpc_for_url(u);
            let f = &f;
            async move {
                f(rpc)
                    .await
                    .map_err(|e| DlmmError::read(context, &e, classify_client_error(&e)))
            }
        })
        .await
    }

    async fn call<T>(
        &self,
        context: &'static str,
        request: RpcRequest,
        params: serde_json::Value,
    ) -> Result<T, DlmmError>
    where
        T: DeserializeOwned + Send,
    {
        self.with_fallback(context, |rpc| {
            let params = params.clone();
            async move { rpc.send::<T>(request, params).await }
        })
        .await
    }

    pub async fn latest_blockhash(&self) -> Result<Hash, DlmmError> {
        self.with_fallback("latest blockhash", |rpc| async move {
            rpc.get_latest_blockhash().await
        })
        .await
    }

    pub async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, DlmmError> {
        self.with_fallback("send transaction", |rpc| {
            let tx = tx.clone();
            async move { rpc.send_transaction(&tx).await }
        })
        .await
        .map_err(|e| DlmmError::Submit {
            message: e.to_string(),
        })
    }

    pub async fn get_sol_balance(&self, owner: Pubkey) -> Result<u64, DlmmError> {
        self.with_fallback("get balance", |rpc| async move {
            rpc.get_balance(&owner).await
        })
        .await
    }

    /// Balance of the owner's associated token account; a missing account is zero.
    pub async fn get_spl_balance(&self, owner: Pubkey, mint: Pubkey) -> Result<u64, DlmmError> {
        let ata = get_associated_token_address(&owner, &mint);
        let account = self
            .with_fallback("get token account", |rpc| async move {
                rpc.get_account_with_commitment(&ata, CommitmentConfig::confirmed())
                    .await
                    .map(|r| r.value)
            })
            .await?;
        let Some(account) = account else {
            return Ok(0);
        };
        let token = spl_token::state::Account::unpack(&account.data)
            .map_err(|e| DlmmError::Decode(format!("unpack token account {ata}: {e}")))?;
        Ok(token.amount)
    }
}

#[async_trait]
impl Connection for RpcConnection {
    async fn simulate_transaction(
        &self,
        tx: &Transaction,
    ) -> Result<SimulationResponse, DlmmError> {
        let bytes = bincode::serialize(tx)
            .map_err(|e| DlmmError::Simulation(format!("serialize transaction: {e}")))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let resp: RpcValue<SimulationResponse> = self
            .call(
                "simulate transaction",
                RpcRequest::SimulateTransaction,
                json!([encoded, {
                  "encoding": "base64",
                  "sigVerify": false,
                  "replaceRecentBlockhash": true,
                  "innerInstructions": true,
                  "commitment": "confirmed",
                }]),
            )
            .await?;
        Ok(resp.value)
    }

    async fn get_parsed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<ParsedTransaction>, DlmmError> {
        self.call(
            "get transaction",
            RpcRequest::GetTransaction,
            json!([signature.to_string(), {
              "encoding": "jsonParsed",
              "commitment": "confirmed",
              "maxSupportedTransactionVersion": 0,
            }]),
        )
        .await
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, DlmmError> {
        let resp: RpcValue<Vec<Option<SignatureStatus>>> = self
            .call(
                "get signature status",
                RpcRequest::GetSignatureStatuses,
                json!([[signature.to_string()], { "searchTransactionHistory": true }]),
            )
            .await?;
        Ok(resp.value.into_iter().next().flatten())
    }
}
