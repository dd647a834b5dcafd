use async_trait::async_trait;

use super::snapshot::HealthSnapshot;
use crate::retry::RequestError;

/// One outbound health check against the backend.
///
/// Implemented by the HTTP backend; tests supply scripted probes.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<HealthSnapshot, RequestError>;
}
