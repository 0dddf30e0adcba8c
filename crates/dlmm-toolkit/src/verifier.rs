use rust_decimal::Decimal;
use solana_sdk::signature::Signature;

use crate::chain::Connection;
use crate::decode::{extract_balance_changes, inner_transfers, ParsedTransaction};
use crate::errors::DlmmError;
use crate::retry::{linear_delay, ReadRetryConfig};
use crate::types::{RemoveLiquidityResult, TokenInfo};

/// Fetch a confirmed transaction record, treating "not found yet" and
/// transient read failures as another attempt.
pub async fn get_parsed_transaction_with_retries(
    conn: &dyn Connection,
    signature: &Signature,
    cfg: ReadRetryConfig,
) -> Result<ParsedTransaction, DlmmError> {
    let attempts = cfg.attempts.max(1);
    for attempt in 1..=attempts {
        match conn.get_parsed_transaction(signature).await {
            Ok(Some(tx)) => return Ok(tx),
            Ok(None) => {
                tracing::debug!(signature = %signature, attempt, "transaction not available yet");
            }
            Err(e) if e.is_transient_read() => {
                tracing::warn!(signature = %signature, attempt, error = %e, "transaction fetch failed");
            }
            Err(e) => return Err(e),
        }
        if attempt < attempts {
            tokio::time::sleep(linear_delay(cfg.base_delay, attempt)).await;
        }
    }
    Err(DlmmError::TransactionNotFound {
        signature: signature.to_string(),
        attempts,
    })
}

/// Amounts actually transferred by a confirmed add-liquidity transaction, as
/// `[x, y]` in UI units.
pub async fn verify_add_liquidity_token_amounts(
    conn: &dyn Connection,
    signature: &Signature,
    token_x: &TokenInfo,
    token_y: &TokenInfo,
    cfg: ReadRetryConfig,
) -> Result<[Decimal; 2], DlmmError> {
    let tx = get_parsed_transaction_with_retries(conn, signature, cfg).await?;
    let meta = tx
        .meta
        .as_ref()
        .ok_or_else(|| DlmmError::Decode(format!("transaction {signature} has no meta")))?;
    let transfers = inner_transfers(meta.inner_instructions.as_deref().unwrap_or_default())?;
    if transfers.len() != 2 {
        return Err(DlmmError::Decode(format!(
            "expected 2 token transfers in {signature}, got {}",
            transfers.len()
        )));
    }

    let mint_x = token_x.mint.to_string();
    let mint_y = token_y.mint.to_string();
    let (mut x, mut y) = (Decimal::ZERO, Decimal::ZERO);
    for t in &transfers {
        if t.mint == mint_x {
            x += t.amount;
        } else if t.mint == mint_y {
            y += t.amount;
        } else {
            return Err(DlmmError::Decode(format!(
                "unexpected mint {} in {signature}",
                t.mint
            )));
        }
    }
    Ok([x, y])
}

/// Liquidity removed and fees claimed by one confirmed removal transaction.
pub async fn verify_remove_liquidity(
    conn: &dyn Connection,
    signature: &Signature,
    program_id: &str,
    token_x: &TokenInfo,
    token_y: &TokenInfo,
    expect_fee_claim: bool,
    cfg: ReadRetryConfig,
) -> Result<RemoveLiquidityResult, DlmmError> {
    let tx = get_parsed_transaction_with_retries(conn, signature, cfg).await?;
    extract_balance_changes(
        &tx,
        program_id,
        &token_x.mint.to_string(),
        &token_y.mint.to_string(),
        expect_fee_claim,
    )
}
