// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared exponential-backoff retry policy.
//!
//! Both the upstream bridge reconnect loop and the store writer use
//! this policy instead of scattering backoff arithmetic inline. Delays
//! grow as `base * multiplier^attempt`, with optional additive jitter
//! bounded below half the base delay so the sequence stays strictly
//! increasing.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::SwitchboardError;

/// Exponential-backoff retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy for durable-store writes: 100ms base, doubling, 5 attempts.
    pub fn store_writes() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_attempts: 5,
            jitter: true,
        }
    }

    /// Policy for upstream reconnection: 1s base, doubling, 5 attempts.
    pub fn upstream_reconnect() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 5,
            jitter: true,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// Without jitter the sequence is exactly exponential; with jitter
    /// an offset in `[0, base/2)` is added, which keeps consecutive
    /// delays strictly increasing for any multiplier >= 1.5.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let jitter = if self.jitter {
            rand::thread_rng().gen_range(0.0..self.base_delay.as_secs_f64() / 2.0)
        } else {
            0.0
        };
        Duration::from_secs_f64(exp + jitter)
    }

    /// Run `op` until it succeeds or `max_attempts` attempts have failed,
    /// sleeping the backoff delay between attempts. The last error is
    /// returned on exhaustion.
    pub async fn run<T, F, Fut>(
        &self,
        op_name: &str,
        mut op: F,
    ) -> Result<T, SwitchboardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SwitchboardError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        op = op_name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_are_strictly_increasing_without_jitter() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 5,
            jitter: false,
        };
        let delays: Vec<_> = (0..5).map(|a| policy.delay_for(a)).collect();
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[4], Duration::from_secs(16));
        for pair in delays.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn jitter_never_breaks_monotonicity() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 5,
            jitter: true,
        };
        for _ in 0..100 {
            let delays: Vec<_> = (0..5).map(|a| policy.delay_for(a)).collect();
            for pair in delays.windows(2) {
                assert!(pair[1] > pair[0]);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_after_max_attempts() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(10),
            multiplier: 2.0,
            max_attempts: 3,
            jitter: false,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run("always-fails", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SwitchboardError::Internal("boom".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_first_success() {
        let policy = RetryPolicy::store_writes();
        let calls = AtomicU32::new(0);
        let result = policy
            .run("succeeds-second", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(SwitchboardError::Internal("transient".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
