//! Classify request failures into user-facing error info and retry eligibility.

use super::error::{NetworkFailure, RequestError};
use std::fmt;
use std::time::Duration;

/// High-level failure category shown to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response reached the server.
    Network,
    /// Deadline elapsed before a response arrived.
    Timeout,
    /// HTTP 4xx (except 429).
    ClientError,
    /// HTTP 5xx, and 429 throttling.
    ServerError,
    /// The request itself was rejected as malformed.
    Validation,
    /// Unrecognized failure shape.
    Unknown,
}

/// Classified failure: what happened, what to tell the user, and whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub user_message: String,
    pub can_retry: bool,
    /// HTTP status when the server answered.
    pub status: Option<u16>,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message)
    }
}

impl ErrorInfo {
    fn new(kind: ErrorKind, user_message: impl Into<String>, can_retry: bool) -> Self {
        Self {
            kind,
            user_message: user_message.into(),
            can_retry,
            status: None,
        }
    }
}

const NETWORK_MESSAGE: &str =
    "Unable to reach the server. Check your internet connection and try again.";
const TIMEOUT_MESSAGE: &str = "The request took too long to complete. Please try again.";
const SERVER_MESSAGE: &str = "The server encountered an error. Please try again in a moment.";
const UNKNOWN_MESSAGE: &str = "An unexpected error occurred.";

/// Classify a raw failure. Pure and total: every input maps to an [`ErrorInfo`].
pub fn analyze(error: &RequestError) -> ErrorInfo {
    match error {
        RequestError::Network { kind, .. } => {
            let message = match kind {
                NetworkFailure::DnsResolution => {
                    "Could not resolve the server address. Check your internet connection and the API URL."
                }
                NetworkFailure::Cors => {
                    "The server rejected the cross-origin request. Check that the API URL is correct."
                }
                NetworkFailure::Tls => {
                    "A secure connection to the server could not be established. Check your network and try again."
                }
                NetworkFailure::ConnectionRefused | NetworkFailure::ConnectionReset => {
                    NETWORK_MESSAGE
                }
            };
            ErrorInfo::new(ErrorKind::Network, message, true)
        }
        RequestError::Timeout(_) => ErrorInfo::new(ErrorKind::Timeout, TIMEOUT_MESSAGE, true),
        RequestError::Http { status, payload } => {
            let (kind, can_retry) = classify_http_status(*status);
            let kind = match payload {
                Some(p) if p.is_validation() => ErrorKind::Validation,
                _ => kind,
            };
            let can_retry = can_retry && kind != ErrorKind::Validation;
            let message = payload
                .as_ref()
                .and_then(|p| p.text())
                .map(str::to_string)
                .unwrap_or_else(|| default_http_message(*status, kind).to_string());
            ErrorInfo {
                kind,
                user_message: message,
                can_retry,
                status: Some(*status),
            }
        }
        RequestError::Validation(detail) => ErrorInfo::new(
            ErrorKind::Validation,
            format!("Please check your input: {}", detail),
            false,
        ),
        RequestError::TokenInvalidated => ErrorInfo::new(
            ErrorKind::ClientError,
            "Your session changed or expired. Please sign in again.",
            false,
        ),
        RequestError::Other { retryable, .. } => {
            ErrorInfo::new(ErrorKind::Unknown, UNKNOWN_MESSAGE, *retryable)
        }
    }
}

/// Classify an HTTP status code: returns the kind and whether it is worth retrying.
pub fn classify_http_status(status: u16) -> (ErrorKind, bool) {
    match status {
        429 => (ErrorKind::ServerError, true),
        422 => (ErrorKind::Validation, false),
        400..=499 => (ErrorKind::ClientError, false),
        500..=599 => (ErrorKind::ServerError, true),
        _ => (ErrorKind::Unknown, false),
    }
}

fn default_http_message(status: u16, kind: ErrorKind) -> &'static str {
    match (status, kind) {
        (_, ErrorKind::Validation) => {
            "Some of the submitted data was invalid. Please check it and try again."
        }
        (401, _) => "Your session has expired. Please sign in again.",
        (403, _) => "You don't have permission to do that.",
        (404, _) => "The requested resource was not found.",
        (413, _) => "The file is too large to upload.",
        (429, _) => "Too many requests. Please wait a moment and try again.",
        (503, _) => "The service is temporarily unavailable. Please try again shortly.",
        (_, ErrorKind::ServerError) => SERVER_MESSAGE,
        (_, ErrorKind::ClientError) => "The request could not be processed.",
        _ => UNKNOWN_MESSAGE,
    }
}

/// Map a curl error into a [`RequestError`]. `timeout` is the deadline that was configured
/// on the transfer, reported back if curl gave up on it.
pub fn classify_curl_error(e: &curl::Error, timeout: Duration) -> RequestError {
    if e.is_operation_timedout() {
        return RequestError::Timeout(timeout);
    }
    let kind = if e.is_couldnt_connect() {
        NetworkFailure::ConnectionRefused
    } else if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        NetworkFailure::DnsResolution
    } else if e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        NetworkFailure::ConnectionReset
    } else if e.is_ssl_connect_error() {
        NetworkFailure::Tls
    } else {
        return RequestError::other(e.to_string());
    };
    RequestError::network(kind, e.to_string())
}
