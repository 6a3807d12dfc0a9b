//! Bounded retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Default number of attempts (the first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry; doubles per attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Runs `operation` up to `max_attempts` times, sleeping
/// `base_delay * 2^attempt_index` between attempts. The final attempt's
/// error propagates to the caller unmodified. At least one attempt is
/// always made.
///
/// Delays suspend on the runtime timer; nothing blocks the executor.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = base_delay * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "operation failed; retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn succeeds_without_delay_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<u32, String> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            },
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result: Result<&str, String> = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(format!("boom {n}"))
                    } else {
                        Ok("recovered")
                    }
                }
            },
            3,
            Duration::from_millis(5),
        )
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_propagate_final_error_after_backoff() {
        let calls = AtomicU32::new(0);
        let base = Duration::from_millis(20);
        let started = Instant::now();

        let result: Result<(), String> = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("network error {n}")) }
            },
            3,
            base,
        )
        .await;

        assert_eq!(result.unwrap_err(), "network error 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Waited ~base then ~2*base between the three attempts
        assert!(started.elapsed() >= base * 3);
    }
}
