use solana_sdk::signature::Signature;
use std::time::Duration;

use crate::chain::Connection;
use crate::decode::SignatureStatus;
use crate::errors::DlmmError;

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll the signature status until it is confirmed or finalized.
///
/// An on-chain error aborts immediately with `TransactionFailed`. Transient
/// polling failures keep the loop going; anything else aborts the wait.
pub async fn wait_for_confirmation_gracefully(
    conn: &dyn Connection,
    signature: &Signature,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<SignatureStatus, DlmmError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let poll_interval = poll_interval.max(Duration::from_millis(1));

    while tokio::time::Instant::now() < deadline {
        match conn.get_signature_status(signature).await {
            Ok(Some(status)) => {
                if let Some(err) = status.err.as_ref() {
                    return Err(DlmmError::TransactionFailed {
                        signature: signature.to_string(),
                        error: err.to_string(),
                    });
                }
                if status.is_terminal() {
                    return Ok(status);
                }
            }
            Ok(None) => {}
            Err(e) if e.is_transient_read() => {
                tracing::debug!(signature = %signature, error = %e, "status poll failed, will retry");
            }
            Err(e) => return Err(e),
        }
        tokio::time::sleep_until(deadline.min(tokio::time::Instant::now() + poll_interval)).await;
    }

    Err(DlmmError::ConfirmationTimeout {
        signature: signature.to_string(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    })
}
