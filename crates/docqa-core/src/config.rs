use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::monitor::MonitorSettings;
use crate::retry::RetryPolicy;

/// Environment variable that overrides `api_base_url`.
pub const API_URL_ENV: &str = "DOCQA_API_URL";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds; attempt n waits base * 2^(n-1).
    pub base_delay_ms: u64,
    /// Optional ceiling on a single backoff delay.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: None,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        let policy = RetryPolicy::new(cfg.max_attempts, Duration::from_millis(cfg.base_delay_ms));
        match cfg.max_delay_ms {
            Some(ms) => policy.with_max_delay(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

/// Health polling parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between probes while the backend is healthy.
    pub poll_interval_secs: u64,
    /// Ceiling for the backed-off interval while probes keep failing.
    pub max_poll_interval_secs: u64,
    /// Per-probe deadline.
    pub probe_timeout_secs: u64,
    /// Path of the health endpoint, relative to `api_base_url`.
    pub health_path: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            max_poll_interval_secs: 300,
            probe_timeout_secs: 5,
            health_path: "/health".to_string(),
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(cfg: &MonitorConfig) -> Self {
        let base_interval = Duration::from_secs(cfg.poll_interval_secs.max(1));
        Self {
            base_interval,
            max_interval: Duration::from_secs(cfg.max_poll_interval_secs).max(base_interval),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs.max(1)),
        }
    }
}

/// Client configuration loaded from `~/.config/docqa/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend root, e.g. `http://localhost:8000`.
    pub api_base_url: String,
    /// Overall deadline for ordinary requests (queries included).
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional monitor settings; if missing, built-in defaults are used.
    #[serde(default)]
    pub monitor: Option<MonitorConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            retry: None,
            monitor: None,
        }
    }
}

impl ClientConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default()
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        self.monitor.clone().unwrap_or_default()
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings::from(&self.monitor_config())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Replace `api_base_url` with `value` when it is set and non-empty.
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            tracing::debug!(url = %url, "api_base_url overridden from environment");
            self.api_base_url = url;
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("docqa")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
/// `DOCQA_API_URL` is applied on top of whatever the file says.
pub fn load_or_init() -> Result<ClientConfig> {
    let path = config_path()?;
    let mut cfg = if !path.exists() {
        let default_cfg = ClientConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        default_cfg
    } else {
        let data = fs::read_to_string(&path)?;
        toml::from_str(&data)?
    };
    cfg.apply_api_url_override(std::env::var(API_URL_ENV).ok());
    Ok(cfg)
}
