//! Retry and backoff policy.
//!
//! This module encapsulates error classification (network, timeout, HTTP
//! status, validation) and exponential backoff decisions so that every
//! network-dependent command (login, upload, ask) shares one policy and never
//! retries failures that retrying cannot fix.

mod abort;
mod classify;
mod error;
mod policy;
mod run;

pub use abort::AbortToken;
pub use classify::{analyze, classify_curl_error, classify_http_status, ErrorInfo, ErrorKind};
pub use error::{ErrorPayload, NetworkFailure, RequestError};
pub use policy::{exponential_delay, RetryDecision, RetryPolicy};
pub use run::{
    make_retryable, run_with_retry, run_with_retry_abortable, with_timeout, RetryError, Retryable,
};
