use std::future::Future;
use std::time::Duration;

use crate::errors::DlmmError;

/// Bounded retry for reads against external data sources.
///
/// Only transient failures (timeouts, connection errors) are retried; the
/// delay before retry `n` is `n * base_delay`.
#[derive(Debug, Clone, Copy)]
pub struct ReadRetryConfig {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReadRetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

pub fn linear_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

pub async fn with_read_retry<T, Fut>(
    cfg: ReadRetryConfig,
    label: &'static str,
    mut op: impl FnMut() -> Fut + Send,
) -> Result<T, DlmmError>
where
    Fut: Future<Output = Result<T, DlmmError>> + Send,
{
    let attempts = cfg.attempts.max(1);
    let mut attempt = 1_u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient_read() && attempt < attempts => {
                tracing::warn!(label, attempt, error = %e, "transient read failure, retrying");
                tokio::time::sleep(linear_delay(cfg.base_delay, attempt)).await;
                attempt = attempt.saturating_add(1);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Try `op(item)` across `items` in order, advancing to the next item only on
/// a transient failure.
pub async fn try_endpoints<I, T, Fut>(
    items: &[I],
    mut op: impl FnMut(&I) -> Fut + Send,
) -> Result<T, DlmmError>
where
    I: Sync,
    Fut: Future<Output = Result<T, DlmmError>> + Send,
{
    let mut last_err: Option<DlmmError> = None;
    for item in items {
        match op(item).await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient_read() => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| DlmmError::Validation("no endpoints configured".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureClass;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn timeout() -> DlmmError {
        DlmmError::read("read", "timed out", FailureClass::Timeout)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_reads_with_linear_backoff() -> eyre::Result<()> {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let start = tokio::time::Instant::now();
        let out = with_read_retry(ReadRetryConfig::default(), "positions", move || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(timeout())
                } else {
                    Ok(7_u8)
                }
            }
        })
        .await?;
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_configured_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let r: Result<(), _> = with_read_retry(ReadRetryConfig::default(), "positions", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout()) }
        })
        .await;
        assert!(r.is_err(), "expected final timeout");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_propagate_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let r: Result<(), _> = with_read_retry(ReadRetryConfig::default(), "positions", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(DlmmError::read("read", "invalid param", FailureClass::Other)) }
        })
        .await;
        assert!(
            matches!(r, Err(DlmmError::ProtocolRead { class: FailureClass::Other, .. })),
            "got {r:?}"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn endpoints_advance_only_on_transient_errors() -> eyre::Result<()> {
        let items = vec!["a", "b", "c"];
        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(vec![]));
        let s = Arc::clone(&seen);
        let out = try_endpoints(&items, move |i| {
            let i = *i;
            let s = Arc::clone(&s);
            async move {
                s.lock()
                    .map_err(|e| DlmmError::Validation(format!("mutex poisoned: {e}")))?
                    .push(i);
                if i == "b" {
                    Ok(42_i32)
                } else {
                    Err(timeout())
                }
            }
        })
        .await?;
        assert_eq!(out, 42);
        let got = seen
            .lock()
            .map_err(|e| eyre::eyre!("mutex poisoned: {e}"))?
            .clone();
        assert_eq!(got, vec!["a", "b"]);

        let stop = try_endpoints(&items, |_| async {
            Err::<(), _>(DlmmError::read("read", "bad", FailureClass::Other))
        })
        .await;
        assert!(
            matches!(stop, Err(DlmmError::ProtocolRead { class: FailureClass::Other, .. })),
            "got {stop:?}"
        );
        Ok(())
    }
}
