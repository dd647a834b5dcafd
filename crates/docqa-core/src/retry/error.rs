//! Raw request failures, before classification.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Why a request never produced an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// Nothing was listening (connection refused).
    ConnectionRefused,
    /// Host name could not be resolved.
    DnsResolution,
    /// Connection dropped mid-exchange (reset, empty reply, send/recv error).
    ConnectionReset,
    /// A cross-origin preflight was rejected before the request was sent.
    Cors,
    /// TLS handshake failed.
    Tls,
}

/// Structured error body returned by the backend.
///
/// The backend emits either `{error, detail, timestamp}` or
/// `{error, message, details}`; both shapes deserialize here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
    /// Usually a string; request validation failures send a list instead.
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorPayload {
    /// Best human-readable text in the payload: `detail` first, then `message`.
    pub fn text(&self) -> Option<&str> {
        let detail = match &self.detail {
            Some(serde_json::Value::String(s)) => Some(s.as_str()),
            _ => None,
        };
        detail
            .or(self.message.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// True if the backend tagged this as a request validation failure.
    pub fn is_validation(&self) -> bool {
        self.error.as_deref() == Some("validation_error")
    }
}

/// A failed request as reported by the transport or the API layer.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// The request never reached the server.
    #[error("network failure ({kind:?}): {message}")]
    Network {
        kind: NetworkFailure,
        message: String,
    },
    /// The caller's deadline elapsed before a response arrived.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    Http {
        status: u16,
        payload: Option<ErrorPayload>,
    },
    /// The request was rejected locally before being sent.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The session token changed or disappeared while the request was being retried.
    #[error("session token was invalidated")]
    TokenInvalidated,
    /// Anything else. `retryable` opts an unknown failure into retries.
    #[error("{message}")]
    Other { message: String, retryable: bool },
}

impl RequestError {
    pub fn network(kind: NetworkFailure, message: impl Into<String>) -> Self {
        RequestError::Network {
            kind,
            message: message.into(),
        }
    }

    pub fn http(status: u16) -> Self {
        RequestError::Http {
            status,
            payload: None,
        }
    }

    /// Build an HTTP error, decoding the response body as an [`ErrorPayload`] when possible.
    pub fn http_with_body(status: u16, body: &[u8]) -> Self {
        RequestError::Http {
            status,
            payload: serde_json::from_slice(body).ok(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        RequestError::Other {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
