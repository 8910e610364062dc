//! Retry with exponential backoff around a single matching attempt.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep base ──▶ attempt 2 ──fail──▶ sleep base×m ──▶ attempt 3
//! ```
//!
//! Each attempt is bounded by `attempt_timeout`. A timed-out attempt's
//! future is dropped before the backoff sleep, so whatever it owns (a child
//! process with `kill_on_drop`, an aborting task handle) is torn down
//! instead of finishing in the background.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::RecommendError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
            multiplier: config.backoff_multiplier.max(1),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Sleep before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, RecommendError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RecommendError>>,
    {
        let mut last_err = None;

        for attempt in 1..=self.max_attempts() {
            if attempt > 1 {
                let delay = self.delay_for(attempt - 1);
                tracing::info!(attempt, ?delay, "retrying matching attempt");
                tokio::time::sleep(delay).await;
            }

            let outcome = match tokio::time::timeout(self.attempt_timeout, op(attempt)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RecommendError::Transient(format!(
                    "attempt timed out after {:?}",
                    self.attempt_timeout
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(attempt, error = %e, "matching attempt failed");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(RecommendError::RetriesExhausted {
            attempts: self.max_attempts(),
            last: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }
}
