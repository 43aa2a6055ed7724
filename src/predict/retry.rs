//! Bounded retry with randomized exponential backoff.
//!
//! Hosted clients wrap each network call in `retry`: up to 5 attempts, with
//! the wait before each retry drawn uniformly from an exponentially widening
//! window clamped between the policy's min and max delay. Every error type
//! consumes retry budget - authentication failures are not distinguished
//! from timeouts. That matches the behavior this harness replicates; a
//! terminal-vs-transient split would be the improvement (see DESIGN.md).

use anyhow::{Context, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry schedule for hosted backends.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub attempts: u32,
    /// Shortest wait between attempts.
    pub min_delay: Duration,
    /// Longest wait between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// The wait before the retry following attempt `attempt` (1-based):
    /// uniform over [min_delay, min(min_delay * 2^(attempt-1), max_delay)].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let window = self
            .min_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
            .min(self.max_delay);
        if window <= self.min_delay {
            return self.min_delay;
        }
        let secs = rand::thread_rng().gen_range(self.min_delay.as_secs_f64()..=window.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Run `op` under `policy`, sleeping between attempts. Returns the first
/// success, or the last error once the budget is spent.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.attempts => {
                return Err(err).with_context(|| format!("giving up after {attempt} attempts"));
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
