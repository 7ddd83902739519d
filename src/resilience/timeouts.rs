//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a deadline
//! - Keep timeout errors distinct from the wrapped operation's errors

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The wrapped operation did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Run `future` with a deadline.
pub async fn with_deadline<F, T>(limit: Duration, future: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| TimedOut(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn passes_through_fast_futures() {
        let value = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_slow_futures() {
        let result = with_deadline(
            Duration::from_millis(50),
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await;
        assert_eq!(result, Err(TimedOut(Duration::from_millis(50))));
    }
}
