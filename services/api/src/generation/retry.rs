//! A bounded retry combinator for idempotent async operations.

use std::fmt::Display;
use std::future::Future;
use tracing::warn;

/// Runs `op` up to `max_attempts` times, stopping at the first success.
///
/// `op` receives the 1-based attempt number. The last error is returned when
/// every attempt fails. `max_attempts` of zero is treated as one.
pub async fn retry_bounded<T, E, F, Fut>(label: &str, max_attempts: usize, mut op: F) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                warn!("{} attempt {}/{} failed: {}", label, attempt, max_attempts, e);
                attempt += 1;
            }
            Err(e) => {
                warn!("{} failed after {} attempts: {}", label, max_attempts, e);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<usize, String> = retry_bounded("test", 3, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), String> = retry_bounded("test", 3, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {}", attempt)) }
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicUsize::new(0);
        let _: Result<(), String> = retry_bounded("test", 0, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope".to_string()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
