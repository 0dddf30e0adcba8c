use async_trait::async_trait;
use eyre::Context as _;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer as _,
    transaction::Transaction,
};
use std::path::Path;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::amount::base_to_ui;
use crate::chain::RpcConnection;
use crate::errors::DlmmError;
use crate::types::TokenInfo;

pub const WRAPPED_SOL_MINT: Pubkey = spl_token::native_mint::ID;

/// Signing and balance checks for the fee payer / position owner.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn public_key(&self) -> Pubkey;

    /// Sign with the wallet plus `extra_signers` against a fresh blockhash and submit.
    async fn send_transaction(
        &self,
        tx: Transaction,
        extra_signers: &[&Keypair],
    ) -> Result<Signature, DlmmError>;

    /// Fail with `InsufficientBalance` unless the wallet holds at least `required`
    /// base units of `token`.
    async fn verify_balance(&self, token: &TokenInfo, required: u64) -> Result<(), DlmmError>;
}

pub fn insufficient_balance(token: &TokenInfo, required: u64, available: u64) -> DlmmError {
    let ui = |v: u64| base_to_ui(v, token.decimals).map_or_else(|_| v.to_string(), |d| d.to_string());
    DlmmError::InsufficientBalance {
        asset: token.mint.to_string(),
        required: ui(required),
        available: ui(available),
    }
}

/// Parse a Solana CLI keypair file (JSON array of 64 bytes).
pub fn keypair_from_json_file(path: &Path) -> eyre::Result<Keypair> {
    let raw = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("read keypair file {}", path.display()))?,
    );
    let bytes: Zeroizing<Vec<u8>> =
        Zeroizing::new(serde_json::from_str(&raw).context("parse keypair file as byte array")?);
    solana_keypair::Keypair::try_from(bytes.as_slice()).context("parse solana keypair bytes")
}

/// Parse a base58-encoded 64-byte secret key.
pub fn keypair_from_base58(s: &str) -> eyre::Result<Keypair> {
    let bytes = Zeroizing::new(
        bs58::decode(s.trim())
            .into_vec()
            .context("decode base58 private key")?,
    );
    solana_keypair::Keypair::try_from(bytes.as_slice()).context("parse solana keypair bytes")
}

pub struct KeypairWallet {
    keypair: Keypair,
    rpc: Arc<RpcConnection>,
}

impl KeypairWallet {
    pub const fn new(keypair: Keypair, rpc: Arc<RpcConnection>) -> Self {
        Self { keypair, rpc }
    }
}

#[async_trait]
impl Wallet for KeypairWallet {
    fn public_key(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn send_transaction(
        &self,
        mut tx: Transaction,
        extra_signers: &[&Keypair],
    ) -> Result<Signature, DlmmError> {
        let blockhash = self.rpc.latest_blockhash().await?;
        let mut signers: Vec<&Keypair> = Vec::with_capacity(1 + extra_signers.len());
        signers.push(&self.keypair);
        signers.extend_from_slice(extra_signers);
        tx.try_sign(signers.as_slice(), blockhash)
            .map_err(|e| DlmmError::Submit {
                message: format!("sign transaction: {e}"),
            })?;
        let sig = self.rpc.send_transaction(&tx).await?;
        tracing::info!(signature = %sig, "transaction submitted");
        Ok(sig)
    }

    async fn verify_balance(&self, token: &TokenInfo, required: u64) -> Result<(), DlmmError> {
        let owner = self.keypair.pubkey();
        let available = if token.mint == WRAPPED_SOL_MINT {
            self.rpc.get_sol_balance(owner).await?
        } else {
            self.rpc.get_spl_balance(owner, token.mint).await?
        };
        if available < required {
            return Err(insufficient_balance(token, required, available));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_file_and_base58_agree() -> eyre::Result<()> {
        let kp = Keypair::new();
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("id.json");
        std::fs::write(&path, serde_json::to_string(&kp.to_bytes().to_vec())?)?;

        let from_file = keypair_from_json_file(&path)?;
        let from_b58 = keypair_from_base58(&kp.to_base58_string())?;
        assert_eq!(from_file.pubkey(), kp.pubkey());
        assert_eq!(from_b58.pubkey(), kp.pubkey());
        Ok(())
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(keypair_from_base58("not-base58-0OIl").is_err(), "bad alphabet");
        assert!(keypair_from_base58("3yZe7d").is_err(), "too short");
    }

    #[test]
    fn insufficient_balance_reports_ui_units() {
        let token = TokenInfo {
            mint: WRAPPED_SOL_MINT,
            decimals: 9,
        };
        let e = insufficient_balance(&token, 10_000_000_000, 2_500_000_000);
        assert!(
            matches!(
                &e,
                DlmmError::InsufficientBalance { required, available, .. }
                    if required == "10" && available == "2.5"
            ),
            "got {e:?}"
        );
    }
}
