//! Backend API surface.
//!
//! [`BackendApi`] is the seam the CLI and session layer talk to; [`HttpBackend`]
//! implements it over libcurl and also serves as the monitor's health probe.

mod http;
mod types;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::retry::RequestError;

pub use http::HttpBackend;
pub use types::{
    Credentials, LoginResponse, QueryResponse, SourceDocument, UploadProgress, UploadResponse,
    User,
};

/// Callback receiving upload progress. Invoked from a blocking worker thread.
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, RequestError>;

    async fn register(&self, credentials: &Credentials) -> Result<User, RequestError>;

    async fn current_user(&self, token: &str) -> Result<User, RequestError>;

    async fn upload(
        &self,
        token: &str,
        path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<UploadResponse, RequestError>;

    /// `timeout` overrides the configured request timeout for this call only.
    async fn ask(
        &self,
        token: &str,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryResponse, RequestError>;
}
