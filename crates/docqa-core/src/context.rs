//! Shared application context: one backend client, one monitor, one token store.

use anyhow::{Context as _, Result};
use std::sync::Arc;

use crate::api::HttpBackend;
use crate::config::ClientConfig;
use crate::monitor::{ConnectionMonitor, ServerStatus};
use crate::retry::{ErrorInfo, ErrorKind, RetryPolicy};
use crate::session::TokenStore;

pub struct AppContext {
    pub config: ClientConfig,
    pub backend: Arc<HttpBackend>,
    pub monitor: ConnectionMonitor,
    pub tokens: Arc<dyn TokenStore>,
    pub retry: RetryPolicy,
}

impl AppContext {
    /// Build the backend client and the (not yet polling) monitor from `config`.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let monitor_cfg = config.monitor_config();
        let settings = config.monitor_settings();
        let backend = HttpBackend::new(&config.api_base_url)
            .with_context(|| format!("invalid api_base_url {:?}", config.api_base_url))?
            .with_timeouts(config.request_timeout(), config.connect_timeout())
            .with_health_check(monitor_cfg.health_path, settings.probe_timeout);
        let backend = Arc::new(backend);
        let monitor = ConnectionMonitor::new(settings, backend.clone());
        let retry = config.retry_policy();
        Ok(Self {
            config,
            backend,
            monitor,
            tokens,
            retry,
        })
    }

    /// Probe now and refuse if the backend is not reachable.
    ///
    /// Returns the classified probe failure so callers can show the same
    /// message the request itself would have produced.
    pub async fn ensure_reachable(&self) -> Result<(), ErrorInfo> {
        self.monitor.force_check().await;
        match self.monitor.server_status() {
            ServerStatus::Offline => Err(self.monitor.last_probe_error().unwrap_or_else(|| {
                ErrorInfo {
                    kind: ErrorKind::Network,
                    user_message: "You appear to be offline.".to_string(),
                    can_retry: true,
                    status: None,
                }
            })),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("api_base_url", &self.config.api_base_url)
            .field("monitor", &self.monitor)
            .field("retry", &self.retry)
            .finish()
    }
}
