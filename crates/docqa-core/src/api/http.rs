//! libcurl-backed [`BackendApi`].
//!
//! Each call builds a fresh `Easy` handle and runs the transfer on the blocking
//! pool. Non-2xx responses become [`RequestError::Http`] with the decoded error
//! body; transport failures go through [`classify_curl_error`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::types::{
    Credentials, LoginResponse, QueryResponse, UploadProgress, UploadResponse, User,
};
use super::{BackendApi, ProgressFn};
use crate::monitor::{HealthProbe, HealthSnapshot};
use crate::retry::{classify_curl_error, RequestError};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: Url,
    request_timeout: Duration,
    connect_timeout: Duration,
    health_path: String,
    health_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

enum Body {
    Empty,
    Json(Vec<u8>),
    Form(String),
    Multipart(PathBuf),
}

struct Call {
    method: Method,
    url: Url,
    token: Option<String>,
    body: Body,
    timeout: Duration,
    connect_timeout: Duration,
    progress: Option<ProgressFn>,
}

impl HttpBackend {
    /// `base` must be an absolute http(s) URL; endpoint paths are appended to its path.
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base)?,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            health_path: "/health".to_string(),
            health_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_timeouts(mut self, request: Duration, connect: Duration) -> Self {
        self.request_timeout = request;
        self.connect_timeout = connect;
        self
    }

    pub fn with_health_check(mut self, path: impl Into<String>, timeout: Duration) -> Self {
        self.health_path = path.into();
        self.health_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!(
            "{}/{}",
            self.base.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }

    fn call(&self, method: Method, path: &str) -> Call {
        Call {
            method,
            url: self.endpoint(path),
            token: None,
            body: Body::Empty,
            timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            progress: None,
        }
    }

    async fn send(&self, call: Call) -> Result<Vec<u8>, RequestError> {
        tracing::debug!(method = ?call.method, url = %call.url, "backend request");
        tokio::task::spawn_blocking(move || perform(call))
            .await
            .map_err(|e| RequestError::other(format!("request worker failed: {e}")))?
    }

    async fn send_json<T: DeserializeOwned>(&self, call: Call) -> Result<T, RequestError> {
        let body = self.send(call).await?;
        decode(&body)
    }
}

impl Call {
    fn bearer(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn json<B: Serialize>(mut self, body: &B) -> Result<Self, RequestError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| RequestError::other(format!("cannot encode request: {e}")))?;
        self.body = Body::Json(bytes);
        Ok(self)
    }

    fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RequestError> {
    serde_json::from_slice(body)
        .map_err(|e| RequestError::other(format!("unexpected response from server: {e}")))
}

/// Runs one transfer on the current thread. Returns the body of a 2xx response.
fn perform(call: Call) -> Result<Vec<u8>, RequestError> {
    let timeout = call.timeout;
    let curl_err = |e: curl::Error| classify_curl_error(&e, timeout);

    let mut easy = curl::easy::Easy::new();
    easy.url(call.url.as_str()).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.connect_timeout(call.connect_timeout).map_err(curl_err)?;
    easy.timeout(timeout).map_err(curl_err)?;

    let mut headers = curl::easy::List::new();
    headers.append("Accept: application/json").map_err(curl_err)?;
    if let Some(token) = &call.token {
        headers
            .append(&format!("Authorization: Bearer {}", token))
            .map_err(curl_err)?;
    }

    match (&call.method, &call.body) {
        (Method::Get, _) => easy.get(true).map_err(curl_err)?,
        (Method::Post, Body::Empty) => {
            easy.post(true).map_err(curl_err)?;
            easy.post_fields_copy(&[]).map_err(curl_err)?;
        }
        (Method::Post, Body::Json(bytes)) => {
            headers.append("Content-Type: application/json").map_err(curl_err)?;
            easy.post(true).map_err(curl_err)?;
            easy.post_fields_copy(bytes).map_err(curl_err)?;
        }
        (Method::Post, Body::Form(encoded)) => {
            headers
                .append("Content-Type: application/x-www-form-urlencoded")
                .map_err(curl_err)?;
            easy.post(true).map_err(curl_err)?;
            easy.post_fields_copy(encoded.as_bytes()).map_err(curl_err)?;
        }
        (Method::Post, Body::Multipart(path)) => {
            // Skip the 100-continue round trip.
            headers.append("Expect:").map_err(curl_err)?;
            let mut form = curl::easy::Form::new();
            form.part("file").file(path).add().map_err(|e| {
                RequestError::other(format!("cannot attach {}: {e}", path.display()))
            })?;
            easy.httppost(form).map_err(curl_err)?;
        }
    }
    easy.http_headers(headers).map_err(curl_err)?;
    if call.progress.is_some() {
        easy.progress(true).map_err(curl_err)?;
    }

    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(curl_err)?;
        if let Some(progress) = &call.progress {
            transfer
                .progress_function(|_dltotal, _dlnow, ultotal, ulnow| {
                    if ultotal > 0.0 {
                        progress(UploadProgress {
                            sent: ulnow as u64,
                            total: ultotal as u64,
                        });
                    }
                    true
                })
                .map_err(curl_err)?;
        }
        transfer.perform().map_err(curl_err)?;
    }

    let code = easy.response_code().map_err(curl_err)?;
    let status = u16::try_from(code).unwrap_or(0);
    if !(200..300).contains(&status) {
        tracing::debug!(url = %call.url, status, "backend returned error status");
        return Err(RequestError::http_with_body(status, &body));
    }
    Ok(body)
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, RequestError> {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", &credentials.email)
            .append_pair("password", &credentials.password)
            .finish();
        let mut call = self.call(Method::Post, "/auth/jwt/login");
        call.body = Body::Form(encoded);
        self.send_json(call).await
    }

    async fn register(&self, credentials: &Credentials) -> Result<User, RequestError> {
        let call = self.call(Method::Post, "/auth/register").json(credentials)?;
        self.send_json(call).await
    }

    async fn current_user(&self, token: &str) -> Result<User, RequestError> {
        let call = self.call(Method::Get, "/users/me").bearer(token);
        self.send_json(call).await
    }

    async fn upload(
        &self,
        token: &str,
        path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<UploadResponse, RequestError> {
        let mut call = self.call(Method::Post, "/upload").bearer(token);
        call.body = Body::Multipart(path.to_path_buf());
        call.progress = progress;
        self.send_json(call).await
    }

    async fn ask(
        &self,
        token: &str,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryResponse, RequestError> {
        let mut call = self
            .call(Method::Post, "/query")
            .bearer(token)
            .json(&serde_json::json!({ "query": query }))?;
        if let Some(timeout) = timeout {
            call = call.timeout(timeout);
        }
        self.send_json(call).await
    }
}

#[async_trait]
impl HealthProbe for HttpBackend {
    async fn check(&self) -> Result<HealthSnapshot, RequestError> {
        let call = self
            .call(Method::Get, &self.health_path)
            .timeout(self.health_timeout);
        let body = self.send(call).await?;
        HealthSnapshot::from_json(&body)
            .map_err(|e| RequestError::other(format!("malformed health report: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_to_base_path() {
        let api = HttpBackend::new("http://localhost:8000").unwrap();
        assert_eq!(api.endpoint("/health").as_str(), "http://localhost:8000/health");

        let nested = HttpBackend::new("https://example.com/api/").unwrap();
        assert_eq!(
            nested.endpoint("/auth/jwt/login").as_str(),
            "https://example.com/api/auth/jwt/login"
        );
        assert_eq!(nested.endpoint("query").as_str(), "https://example.com/api/query");
    }

    #[test]
    fn rejects_relative_base() {
        assert!(HttpBackend::new("/api").is_err());
    }

    #[test]
    fn decode_failure_is_not_retryable() {
        let err = decode::<User>(b"<html>").unwrap_err();
        let info = crate::retry::analyze(&err);
        assert!(!info.can_retry);
    }
}
