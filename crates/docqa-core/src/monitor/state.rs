use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::snapshot::HealthSnapshot;
use crate::retry::ErrorInfo;

/// Host-level network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

/// Backend reachability as established by probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// No probe has resolved yet, or a forced re-check is in flight.
    Checking,
    Online,
    Offline,
}

/// Value delivered to health subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthView {
    pub status: ServerStatus,
    /// `None` while checking for the first time, after a failed probe, or while offline.
    pub snapshot: Option<Arc<HealthSnapshot>>,
}

/// Poll schedule and per-probe deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Interval between probes while the backend is healthy.
    pub base_interval: Duration,
    /// Ceiling for the backed-off interval after repeated failures.
    pub max_interval: Duration,
    /// A probe not answered within this deadline counts as failed.
    pub probe_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Mutable monitor state. Written only by the monitor itself.
#[derive(Debug)]
pub(super) struct MonitorState {
    pub(super) connectivity: Connectivity,
    pub(super) server_status: ServerStatus,
    pub(super) snapshot: Option<Arc<HealthSnapshot>>,
    pub(super) last_error: Option<ErrorInfo>,
    pub(super) consecutive_failures: u32,
    pub(super) probes_completed: u64,
}

impl MonitorState {
    pub(super) fn new(connectivity: Connectivity) -> Self {
        let server_status = match connectivity {
            Connectivity::Online => ServerStatus::Checking,
            Connectivity::Offline => ServerStatus::Offline,
        };
        Self {
            connectivity,
            server_status,
            snapshot: None,
            last_error: None,
            consecutive_failures: 0,
            probes_completed: 0,
        }
    }

    pub(super) fn view(&self) -> HealthView {
        HealthView {
            status: self.server_status,
            snapshot: self.snapshot.clone(),
        }
    }
}
