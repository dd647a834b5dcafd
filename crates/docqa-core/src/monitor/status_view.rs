//! Three-state projection of the monitor for consumers that only need
//! "can I talk to the backend right now".

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use super::connection::ConnectionMonitor;
use super::state::{Connectivity, ServerStatus};
use crate::observers::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimpleStatus {
    Online,
    Offline,
    Checking,
}

impl SimpleStatus {
    fn project(connectivity: Connectivity, server: ServerStatus) -> Self {
        match (connectivity, server) {
            (Connectivity::Offline, _) | (_, ServerStatus::Offline) => SimpleStatus::Offline,
            (_, ServerStatus::Online) => SimpleStatus::Online,
            (_, ServerStatus::Checking) => SimpleStatus::Checking,
        }
    }
}

/// Read-only view over a [`ConnectionMonitor`]. Does not poll on its own.
#[derive(Debug, Clone)]
pub struct StatusView {
    monitor: ConnectionMonitor,
}

impl StatusView {
    pub fn new(monitor: ConnectionMonitor) -> Self {
        Self { monitor }
    }

    pub fn status(&self) -> SimpleStatus {
        SimpleStatus::project(self.monitor.connectivity(), self.monitor.server_status())
    }

    /// Register for status changes. Called once immediately, then only when the
    /// projected status actually changes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SimpleStatus) + Send + Sync + 'static,
    {
        let last: Arc<Mutex<Option<SimpleStatus>>> = Arc::new(Mutex::new(None));
        self.monitor.subscribe_health(move |view| {
            // Host offline always forces the server status offline, so the view alone decides.
            let status = SimpleStatus::project(Connectivity::Online, view.status);
            let changed = {
                let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
                let changed = *last != Some(status);
                *last = Some(status);
                changed
            };
            if changed {
                callback(status);
            }
        })
    }

    /// Ask the underlying monitor for a fresh probe.
    pub async fn refresh(&self) -> SimpleStatus {
        self.monitor.force_check().await;
        self.status()
    }
}
