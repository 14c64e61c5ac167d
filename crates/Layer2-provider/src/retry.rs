//! Retry logic with exponential backoff
//!
//! 호출당 [`RetryState`]를 새로 만들고, 성공하거나 최종 실패하면 버린다.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use wayfarer_foundation::RetrySettings;

/// Which failures are retried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// 모든 실패를 동일하게 재시도
    #[default]
    Always,
    /// [`RetryableError::classify`] 결과를 따름 (인증/검증 에러는 즉시 반환)
    Classified,
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first call included
    pub max_attempts: u32,

    /// Delay before the second attempt (milliseconds)
    pub base_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Maximum delay between attempts (milliseconds)
    pub max_delay_ms: u64,

    /// Whether to add ±20% jitter
    pub jitter: bool,

    pub policy: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30000,
            jitter: false,
            policy: RetryPolicy::Always,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay_ms: settings.base_delay_ms,
            backoff_multiplier: settings.backoff_multiplier,
            max_delay_ms: settings.max_delay_ms,
            jitter: settings.jitter(),
            policy: if settings.classify_errors() {
                RetryPolicy::Classified
            } else {
                RetryPolicy::Always
            },
        }
    }
}

impl RetryConfig {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Calculate delay after failed attempt `attempt` (0-indexed)
    ///
    /// Without jitter the sequence is non-decreasing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.max(1.0);
        let base_delay = self.base_delay_ms as f64 * multiplier.powi(attempt.min(64) as i32);

        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let final_delay = if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.8..=1.2);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    fn delay_for(&self, classification: RetryClassification, attempt: u32) -> Duration {
        match classification {
            RetryClassification::RateLimited {
                retry_after_ms: Some(ms),
            } => Duration::from_millis(ms.min(self.max_delay_ms)),
            _ => self.delay_for_attempt(attempt),
        }
    }

    fn classify<E: RetryableError>(&self, error: &E) -> RetryClassification {
        match self.policy {
            RetryPolicy::Always => RetryClassification::Retry,
            RetryPolicy::Classified => error.classify(),
        }
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    /// Should retry (transient error)
    Retry,

    /// Should not retry (permanent error)
    NoRetry,

    /// Rate limited - use provided delay if available
    RateLimited { retry_after_ms: Option<u64> },
}

/// Trait for errors that can be classified for retry
pub trait RetryableError {
    fn classify(&self) -> RetryClassification;
}

// ============================================================================
// Per-invocation state
// ============================================================================

/// Attempt counter for one invocation
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Attempts started so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Start the next attempt, returning its 1-based number
    pub fn begin(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn has_remaining(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

/// Notices emitted by [`with_retry`]
#[derive(Debug)]
pub enum RetryEvent<'a, E> {
    /// A retry attempt is about to start
    Retrying { attempt: u32, max_attempts: u32 },

    /// An attempt failed; `next_delay` is `None` when no retry follows
    Failed {
        attempt: u32,
        max_attempts: u32,
        error: &'a E,
        next_delay: Option<Duration>,
    },
}

/// Final failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Display + fmt::Debug> {
    #[error("failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    #[error("not retried after attempt {attempt}: {error}")]
    Rejected { attempt: u32, error: E },
}

/// Execute an async operation with retry logic
///
/// `on_event` sees every retry and failure in order and cannot change the outcome.
pub async fn with_retry<T, E, F, Fut, H>(
    config: &RetryConfig,
    operation_name: &str,
    mut on_event: H,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: RetryableError + fmt::Display + fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    H: FnMut(RetryEvent<'_, E>),
{
    let mut state = RetryState::new(config);
    let max_attempts = state.max_attempts();

    loop {
        let attempt = state.begin();
        if attempt > 1 {
            on_event(RetryEvent::Retrying {
                attempt,
                max_attempts,
            });
        }

        let error = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "Succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        let classification = config.classify(&error);
        if classification == RetryClassification::NoRetry {
            on_event(RetryEvent::Failed {
                attempt,
                max_attempts,
                error: &error,
                next_delay: None,
            });
            debug!(
                operation = operation_name,
                attempt,
                error = %error,
                "Non-retryable error"
            );
            return Err(RetryError::Rejected { attempt, error });
        }

        if !state.has_remaining() {
            on_event(RetryEvent::Failed {
                attempt,
                max_attempts,
                error: &error,
                next_delay: None,
            });
            warn!(
                operation = operation_name,
                max_attempts,
                error = %error,
                "Max attempts exceeded"
            );
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last_error: error,
            });
        }

        let delay = config.delay_for(classification, attempt - 1);
        on_event(RetryEvent::Failed {
            attempt,
            max_attempts,
            error: &error,
            next_delay: Some(delay),
        });
        warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying after error"
        );

        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::default();

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(30000)); // capped
        assert_eq!(config.delay_for_attempt(500), Duration::from_millis(30000));
    }

    #[test]
    fn test_delays_non_decreasing() {
        let config = RetryConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        let delays: Vec<_> = (0..10).map(|a| config.delay_for_attempt(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RetryConfig {
            jitter: true,
            ..Default::default()
        };
        for _ in 0..50 {
            let delay = config.delay_for_attempt(0).as_millis();
            assert!((800..=1200).contains(&delay), "delay {}", delay);
        }
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            classify_errors: Some(true),
            ..Default::default()
        };
        let config = RetryConfig::from(&settings);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.policy, RetryPolicy::Classified);
        assert_eq!(
            RetryConfig::from(&RetrySettings::default()).policy,
            RetryPolicy::Always
        );
    }

    #[test]
    fn test_state_counts_attempts() {
        let mut state = RetryState::new(&RetryConfig {
            max_attempts: 0,
            ..Default::default()
        });
        assert_eq!(state.max_attempts(), 1);
        assert_eq!(state.begin(), 1);
        assert!(!state.has_remaining());
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let result = with_retry(&fast(), "test", |_| {}, || async {
            Ok::<_, ProviderError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_success_after_failure() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast(), "test", |_| {}, || {
            let c = counter_clone.clone();
            async move {
                let count = c.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(ProviderError::ServerError("busy".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<i32, _> = with_retry(&fast(), "test", |_| {}, || {
            let c = counter_clone.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Network("Always fails".to_string()))
            }
        })
        .await;

        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, ProviderError::Network("Always fails".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_policy_retries_auth_errors() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<i32, _> = with_retry(&fast(), "test", |_| {}, || {
            let c = counter_clone.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Authentication("Bad key".to_string()))
            }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_classified_policy_rejects_immediately() {
        let config = fast().with_policy(RetryPolicy::Classified);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<i32, _> = with_retry(&config, "test", |_| {}, || {
            let c = counter_clone.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Authentication("Bad key".to_string()))
            }
        })
        .await;

        // 인증 실패는 재시도하지 않으므로 즉시 반환
        assert!(matches!(result, Err(RetryError::Rejected { attempt: 1, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let mut events = Vec::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(
            &fast(),
            "test",
            |event| match event {
                RetryEvent::Retrying {
                    attempt,
                    max_attempts,
                } => events.push(format!("retry {}/{}", attempt, max_attempts)),
                RetryEvent::Failed {
                    attempt,
                    next_delay,
                    ..
                } => events.push(format!("failed {} {}", attempt, next_delay.is_some())),
            },
            || {
                let c = counter_clone.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ProviderError::ServerError("once".to_string()))
                    } else {
                        Ok("done")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(events, vec!["failed 1 true", "retry 2/3"]);
    }
}
