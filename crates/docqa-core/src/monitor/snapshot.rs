//! Health snapshots decoded from the backend's health endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overall backend health as reported by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Ok,
    Degraded,
}

/// Health of one backend dependency (vector store, model runtime, embeddings...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub status: ServiceStatus,
    pub response_time_ms: Option<f64>,
    pub error: Option<String>,
}

/// Immutable result of one successful probe. Each probe replaces the previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub overall: OverallHealth,
    /// Timestamp as sent by the backend, verbatim.
    pub timestamp: Option<String>,
    pub services: BTreeMap<String, ServiceHealth>,
    /// When this client received the snapshot.
    pub received_at: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Decode a health endpoint body.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        let report: HealthReport = serde_json::from_slice(body)?;
        Ok(Self::from_report(report, Utc::now()))
    }

    fn from_report(report: HealthReport, received_at: DateTime<Utc>) -> Self {
        let overall = match report.status.trim().to_ascii_lowercase().as_str() {
            "ok" | "healthy" => OverallHealth::Ok,
            _ => OverallHealth::Degraded,
        };
        let services = report
            .services
            .into_iter()
            .map(|(name, s)| {
                let status = match s.status.trim().to_ascii_lowercase().as_str() {
                    "healthy" | "ok" => ServiceStatus::Healthy,
                    "unhealthy" | "degraded" => ServiceStatus::Unhealthy,
                    _ => ServiceStatus::Unknown,
                };
                let health = ServiceHealth {
                    status,
                    response_time_ms: s.response_time_ms,
                    error: s.error,
                };
                (name, health)
            })
            .collect();
        Self {
            overall,
            timestamp: report.timestamp,
            services,
            received_at,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.overall == OverallHealth::Ok
    }

    pub fn service(&self, name: &str) -> Option<&ServiceHealth> {
        self.services.get(name)
    }

    /// Names of services not reporting healthy.
    pub fn unhealthy_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, s)| s.status != ServiceStatus::Healthy)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Wire shape of the health endpoint.
#[derive(Debug, Deserialize)]
struct HealthReport {
    status: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    services: BTreeMap<String, ServiceReport>,
}

#[derive(Debug, Deserialize)]
struct ServiceReport {
    #[serde(default)]
    status: String,
    #[serde(default, alias = "responseTimeMs")]
    response_time_ms: Option<f64>,
    #[serde(default, alias = "error_message")]
    error: Option<String>,
}
