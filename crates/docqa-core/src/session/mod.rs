//! Bearer token storage and authorized request execution.
//!
//! A [`TokenStore`] holds at most one token plus a generation counter that is
//! bumped on every change (login, logout, or a change made by another process).
//! [`authorized`] pins the generation seen at the first attempt and refuses to
//! retry with credentials that changed underneath it.

mod file;
mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::api::LoginResponse;
use crate::observers::Subscription;
use crate::retry::{run_with_retry, RequestError, RetryError, RetryPolicy};

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl StoredToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn from_login(login: &LoginResponse) -> Self {
        Self {
            access_token: login.access_token.clone(),
            token_type: login
                .token_type
                .clone()
                .unwrap_or_else(default_token_type),
            expires_at: login.expiry(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("token file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token file is malformed: {0}")]
    Format(#[from] serde_json::Error),
    #[error("state directory unavailable: {0}")]
    StateDir(#[from] xdg::BaseDirectoriesError),
}

/// Called with the new token (or `None` after a clear).
pub type TokenCallback = Box<dyn Fn(Option<&StoredToken>) + Send + Sync>;

pub trait TokenStore: Send + Sync {
    fn get_token(&self) -> Option<StoredToken>;

    fn set_token(&self, token: StoredToken) -> Result<(), TokenStoreError>;

    fn clear_token(&self) -> Result<(), TokenStoreError>;

    /// Bumped on every change to the stored token.
    fn generation(&self) -> u64;

    fn on_change(&self, callback: TokenCallback) -> Subscription;

    fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.get_token().and_then(|t| t.expires_at)
    }

    fn has_valid_token(&self) -> bool {
        self.get_token().is_some_and(|t| !t.is_expired())
    }
}

/// Run `op` with the current access token under the retry executor.
///
/// Every attempt re-reads the store. If the token is gone, expired, or the
/// generation moved since the first attempt, the attempt fails with
/// [`RequestError::TokenInvalidated`], which is not retried. A 401 from the
/// backend clears the stored token, unless it was replaced while the request
/// was in flight.
pub async fn authorized<S, F, Fut, T>(
    store: &S,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryError>
where
    S: TokenStore + ?Sized,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let pinned = store.generation();
    let result = run_with_retry(policy, || {
        let token = store
            .get_token()
            .filter(|t| !t.is_expired() && store.generation() == pinned);
        let attempt = token.map(|t| op(t.access_token));
        async move {
            match attempt {
                Some(fut) => fut.await,
                None => Err(RequestError::TokenInvalidated),
            }
        }
    })
    .await;

    if let Err(err) = &result {
        if err.error().status() == Some(401) {
            if store.generation() == pinned {
                tracing::info!("backend rejected token; clearing stored session");
                if let Err(e) = store.clear_token() {
                    tracing::warn!("failed to clear rejected token: {}", e);
                }
            } else {
                tracing::debug!("rejected token already replaced; keeping the newer session");
            }
        }
    }
    result
}
