// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Retry with exponential backoff for provider calls.
//!
//! Rate limits, transient upstream failures and timeouts are retried; all
//! other errors propagate on the first attempt.  The whole sequence of
//! attempts (including backoff sleeps) runs under a single deadline so
//! retries can never exceed the per-call budget.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::ProviderError;

/// Retry parameters for one driver.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (1 = no retries).
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single backoff sleep.
    pub max_backoff: Duration,
    /// Overall deadline for the call including sleeps.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            deadline: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// Scale the deadline for the request's thinking budget.
    ///
    /// A model reasoning at `max` budget legitimately takes far longer than
    /// one at `minimal`; the base deadline covers the medium case.
    pub fn with_thinking(mut self, mode: Option<crate::types::ThinkingMode>) -> Self {
        if let Some(mode) = mode {
            self.deadline = self.deadline.mul_f32(0.5 + 1.5 * mode.budget_fraction());
        }
        self
    }

    /// Backoff before retry number `attempt` (1-based), doubling each time
    /// and capped at `max_backoff`.  A server-supplied `retry_after`
    /// overrides the computed value (still capped).
    pub fn backoff_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_backoff);
        }
        let exp = self.initial_backoff.saturating_mul(1 << (attempt - 1).min(16));
        exp.min(self.max_backoff)
    }
}

/// Run `op` under `policy`, retrying retryable failures with backoff.
///
/// `op` is a factory producing one attempt's future, so each retry issues a
/// fresh request.
pub async fn with_retries<T, F, Fut>(
    provider: &str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let run = async {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    let retry_after = match &err {
                        ProviderError::RateLimited { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    let backoff = policy.backoff_for(attempt, retry_after);
                    debug!(
                        provider,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying provider call"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    };

    match tokio::time::timeout(policy.deadline, run).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(policy.deadline)),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            deadline: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_needs_no_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_retries("test", quick_policy(), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ProviderError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_retries("test", quick_policy(), move || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(ProviderError::Transient("flaky".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_at_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = with_retries("test", quick_policy(), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Transient("always".into()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3, "max_attempts bounds calls");
    }

    #[tokio::test(start_paused = true)]
    async fn auth_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = with_retries("test", quick_policy(), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Auth {
                    provider: "test".into(),
                    message: "bad key".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Auth { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_converts_to_timeout_error() {
        let policy = RetryPolicy {
            max_attempts: 100,
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(10),
            deadline: Duration::from_millis(50),
        };
        let result: Result<(), _> = with_retries("test", policy, || async {
            Err(ProviderError::Transient("never succeeds".into()))
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = quick_policy();
        assert_eq!(p.backoff_for(1, None), Duration::from_millis(10));
        assert_eq!(p.backoff_for(2, None), Duration::from_millis(20));
        assert_eq!(p.backoff_for(3, None), Duration::from_millis(40));
        assert_eq!(p.backoff_for(4, None), Duration::from_millis(40), "capped");
    }

    #[test]
    fn thinking_mode_scales_the_deadline() {
        use crate::types::ThinkingMode;
        let base = quick_policy();
        let minimal = base.with_thinking(Some(ThinkingMode::Minimal));
        let max = base.with_thinking(Some(ThinkingMode::Max));
        assert!(minimal.deadline < base.deadline);
        assert!(max.deadline > base.deadline);
        assert_eq!(base.with_thinking(None).deadline, base.deadline);
    }

    #[test]
    fn retry_after_hint_overrides_backoff() {
        let p = quick_policy();
        let hinted = p.backoff_for(1, Some(Duration::from_millis(25)));
        assert_eq!(hinted, Duration::from_millis(25));
        // Still capped by max_backoff.
        let capped = p.backoff_for(1, Some(Duration::from_secs(60)));
        assert_eq!(capped, Duration::from_millis(40));
    }
}
