//! # Bounded retries inside one cycle.
//!
//! Services use [`RetryPolicy`] around a single remote call (posting a log
//! event, replying with a command result). The runner never retries a cycle;
//! once the attempts are spent the last error fails the cycle.
//!
//! Waiting between attempts races against the cycle token, so an interrupted
//! shutdown does not sit out a backoff.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::TaskError;
use crate::policies::backoff::BackoffPolicy;

/// Attempt budget plus delay schedule.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1).
    pub attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Runs `op` until it succeeds, the attempts run out, or `ctx` is cancelled.
    ///
    /// [`TaskError::Canceled`] from `op` is returned immediately.
    pub async fn run<T, F, Fut>(
        &self,
        ctx: &CancellationToken,
        what: &str,
        mut op: F,
    ) -> Result<T, TaskError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(TaskError::Canceled) => return Err(TaskError::Canceled),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.backoff.next(attempt - 1);
                    warn!(
                        what,
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = ctx.cancelled() => return Err(TaskError::Canceled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}
