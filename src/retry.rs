//! Bounded retry with backoff for rate-limited model APIs.
//!
//! Every network call to an LLM or vision backend goes through
//! [`with_retry`]: a fixed escalating delay schedule, substring-based error
//! classification, and an explicit per-attempt timeout. This is a local,
//! per-call policy; there is no global circuit breaker.
//!
//! Exhausted retries produce a [`RetryError`] that callers render into the
//! tool's output content, so the orchestration loop can react to the failure
//! as a conversation turn instead of crashing.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Classification of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The backend signalled throttling; wait longer before the next attempt.
    RateLimited,
    /// Any other failure, retried on the base schedule.
    Transient,
}

/// Classify a failure from its rendered error message.
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        FailureKind::RateLimited
    } else {
        FailureKind::Transient
    }
}

/// Retry schedule for backend calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before each retry. The attempt count is `intervals.len()`.
    pub intervals: Vec<Duration>,
    /// Additional wait applied when the failure is rate-limit flavored.
    pub rate_limit_extra: Duration,
    /// Wall-clock timeout for each individual attempt.
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            intervals: vec![Duration::from_secs(10), Duration::from_secs(15)],
            rate_limit_extra: Duration::from_secs(30),
            call_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts this policy allows.
    pub fn attempts(&self) -> usize {
        self.intervals.len().max(1)
    }
}

/// Failure after the final retry attempt.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Final attempt failed after {attempts} attempts: {message}")]
pub struct RetryError {
    pub attempts: usize,
    pub message: String,
}

/// Run `op` under the retry policy, returning the last error once the
/// schedule is exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> std::result::Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts();

    for attempt in 1..=attempts {
        let outcome = match policy.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("request timed out after {}s", limit.as_secs())),
            },
            None => op().await.map_err(|e| e.to_string()),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(message) => {
                if attempt == attempts {
                    return Err(RetryError { attempts, message });
                }

                let mut wait = policy.intervals[attempt - 1];
                if classify_failure(&message) == FailureKind::RateLimited {
                    wait += policy.rate_limit_extra;
                }
                warn!(
                    "Attempt {} failed: {}. Retrying in {}s...",
                    attempt,
                    message,
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
            }
        }
    }

    unreachable!("retry loop returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GlimtError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("429 Too Many Requests"),
            FailureKind::RateLimited
        );
        assert_eq!(
            classify_failure("OpenAI API error: rate limit exceeded"),
            FailureKind::RateLimited
        );
        assert_eq!(classify_failure("connection reset"), FailureKind::Transient);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failure() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(&RetryPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(GlimtError::OpenAI("connection reset".to_string()))
                } else {
                    Ok("answer".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_error() {
        let calls = AtomicUsize::new(0);
        let result: std::result::Result<String, RetryError> =
            with_retry(&RetryPolicy::default(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GlimtError::OpenAI("boom".to_string())) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert!(err.to_string().contains("Final attempt failed"));
        assert!(err.to_string().contains("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_transient() {
        let policy = RetryPolicy {
            intervals: vec![Duration::from_secs(1)],
            rate_limit_extra: Duration::from_secs(0),
            call_timeout: Some(Duration::from_secs(2)),
        };

        let result: std::result::Result<String, RetryError> = with_retry(&policy, || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("never".to_string())
        })
        .await;

        assert!(result.unwrap_err().message.contains("timed out"));
    }
}
