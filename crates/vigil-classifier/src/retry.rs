// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with exponential backoff and jitter.
//!
//! Only transient failures are retried; validation-class failures return
//! immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use vigil_core::VigilError;

/// Retry policy for classifier calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base: Duration,
    /// Cap on any single delay.
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_retries,
            base,
            cap,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// plus jitter in `[0, base)`, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let jitter_ms = if self.base.as_millis() > 0 {
            rand::thread_rng().gen_range(0..self.base.as_millis() as u64)
        } else {
            0
        };
        (exp + Duration::from_millis(jitter_ms)).min(self.cap)
    }

    /// Runs `op`, retrying transient failures up to `max_retries` times.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, VigilError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VigilError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient classifier failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
