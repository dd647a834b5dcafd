//! Request and response bodies of the DocQA backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Email/password pair used for login and registration.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// RFC 3339 or naive UTC timestamp; absent when the backend does not report it.
    #[serde(default)]
    pub expires_at: Option<String>,
}

impl LoginResponse {
    /// Parsed `expires_at`, if present and understood.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        let raw = self.expires_at.as_deref()?.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Some(t.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    #[serde(default, alias = "chunks_count")]
    pub num_chunks_stored: u32,
}

/// Bytes sent so far for an upload in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.sent as f64 / self.total as f64).min(1.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default, alias = "sources")]
    pub source_documents: Vec<SourceDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_expiry_accepts_rfc3339_and_naive() {
        let rfc: LoginResponse = serde_json::from_str(
            r#"{"access_token":"t","token_type":"bearer","expires_at":"2030-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(rfc.expiry().unwrap().to_rfc3339(), "2030-01-02T03:04:05+00:00");

        let naive: LoginResponse = serde_json::from_str(
            r#"{"access_token":"t","expires_at":"2030-01-02T03:04:05.250000"}"#,
        )
        .unwrap();
        assert!(naive.expiry().is_some());

        let missing: LoginResponse = serde_json::from_str(r#"{"access_token":"t"}"#).unwrap();
        assert!(missing.expiry().is_none());
    }

    #[test]
    fn query_response_accepts_sources_alias() {
        let r: QueryResponse = serde_json::from_str(
            r#"{"answer":"42","sources":[{"filename":"a.pdf","chunk_index":3,"score":0.9}],"query":"q"}"#,
        )
        .unwrap();
        assert_eq!(r.source_documents.len(), 1);
        assert_eq!(r.source_documents[0].chunk_index, 3);
    }

    #[test]
    fn upload_progress_fraction() {
        assert_eq!(UploadProgress { sent: 0, total: 0 }.fraction(), 0.0);
        assert_eq!(UploadProgress { sent: 50, total: 100 }.fraction(), 0.5);
        assert_eq!(UploadProgress { sent: 150, total: 100 }.fraction(), 1.0);
    }
}
