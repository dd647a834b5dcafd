//! Retry loop: re-invoke an async operation until success or the policy says stop.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use super::abort::AbortToken;
use super::classify::{analyze, ErrorInfo};
use super::error::RequestError;
use super::policy::{RetryDecision, RetryPolicy};

/// Failure surfaced by the retry executor. Always carries the last raw error and its classification.
#[derive(Debug, Clone, Error)]
pub enum RetryError {
    /// The last attempt failed and the policy declined another.
    #[error("{info}")]
    Failed {
        #[source]
        error: RequestError,
        info: ErrorInfo,
        attempts: u32,
    },
    /// The caller aborted while waiting to retry.
    #[error("retry aborted after {attempts} attempt(s): {info}")]
    Aborted {
        #[source]
        error: RequestError,
        info: ErrorInfo,
        attempts: u32,
    },
}

impl RetryError {
    pub fn info(&self) -> &ErrorInfo {
        match self {
            RetryError::Failed { info, .. } | RetryError::Aborted { info, .. } => info,
        }
    }

    pub fn error(&self) -> &RequestError {
        match self {
            RetryError::Failed { error, .. } | RetryError::Aborted { error, .. } => error,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Failed { attempts, .. } | RetryError::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, RetryError::Aborted { .. })
    }
}

/// Apply a deadline to a request future. An elapsed deadline is reported as
/// [`RequestError::Timeout`]; the dropped future's eventual outcome is ignored.
pub async fn with_timeout<T, Fut>(deadline: Duration, fut: Fut) -> Result<T, RequestError>
where
    Fut: Future<Output = Result<T, RequestError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(outcome) => outcome,
        Err(_) => Err(RequestError::Timeout(deadline)),
    }
}

/// Runs an async operation until it succeeds or the retry policy says to stop.
/// On retryable failure, waits for the backoff duration then tries again.
pub async fn run_with_retry<F, Fut, T>(policy: &RetryPolicy, f: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    retry_loop(policy, None, f).await
}

/// Like [`run_with_retry`], but a pending backoff wait ends early when `abort` fires.
pub async fn run_with_retry_abortable<F, Fut, T>(
    policy: &RetryPolicy,
    abort: &AbortToken,
    f: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    retry_loop(policy, Some(abort), f).await
}

async fn retry_loop<F, Fut, T>(
    policy: &RetryPolicy,
    abort: Option<&AbortToken>,
    mut f: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut attempt = 1u32;
    loop {
        tracing::debug!(attempt, max_attempts = policy.max_attempts, "starting attempt");
        let outcome = match policy.attempt_timeout {
            Some(deadline) => with_timeout(deadline, f()).await,
            None => f().await,
        };
        let error = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let info = analyze(&error);
        match policy.decide(attempt, &info) {
            RetryDecision::NoRetry => {
                if info.can_retry {
                    tracing::error!(attempts = attempt, error = %error, "retries exhausted");
                } else {
                    tracing::debug!(attempt, kind = ?info.kind, error = %error, "not retryable");
                }
                return Err(RetryError::Failed {
                    error,
                    info,
                    attempts: attempt,
                });
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    attempt,
                    kind = ?info.kind,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "attempt failed, backing off"
                );
                let completed = match abort {
                    Some(token) => token.sleep(delay).await,
                    None => {
                        tokio::time::sleep(delay).await;
                        true
                    }
                };
                if !completed {
                    tracing::debug!(attempt, "backoff aborted");
                    return Err(RetryError::Aborted {
                        error,
                        info,
                        attempts: attempt,
                    });
                }
                attempt += 1;
            }
        }
    }
}

/// A zero-argument async operation bundled with its retry policy.
///
/// The operation is re-invoked from scratch on every attempt; it must be safe to repeat.
#[derive(Debug, Clone)]
pub struct Retryable<F> {
    op: F,
    policy: RetryPolicy,
}

/// Wrap `op` so that each call retries it per `policy`.
pub fn make_retryable<F>(op: F, policy: RetryPolicy) -> Retryable<F> {
    Retryable { op, policy }
}

impl<F, Fut, T> Retryable<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    pub async fn call(&self) -> Result<T, RetryError> {
        run_with_retry(&self.policy, &self.op).await
    }

    pub async fn call_with_abort(&self, abort: &AbortToken) -> Result<T, RetryError> {
        run_with_retry_abortable(&self.policy, abort, &self.op).await
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
