//! Turning classified failures into CLI errors.

use docqa_core::retry::{ErrorInfo, RetryError};

pub(crate) fn failure(info: &ErrorInfo) -> anyhow::Error {
    if info.can_retry {
        anyhow::anyhow!("{} You can retry.", info.user_message)
    } else {
        anyhow::anyhow!("{}", info.user_message)
    }
}

pub(crate) fn request_failed(err: RetryError) -> anyhow::Error {
    tracing::debug!(attempts = err.attempts(), error = %err.error(), "request failed");
    failure(err.info())
}
