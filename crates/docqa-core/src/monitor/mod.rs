//! Connection and backend health monitor.
//!
//! One [`ConnectionMonitor`] is created at application start and shared by
//! every consumer (chat, upload, login). It tracks host connectivity (fed in by
//! the host through [`ConnectionMonitor::report_connectivity`]) and backend
//! health (probed on a schedule that backs off while the backend is failing),
//! and fans both out to subscribers:
//!
//! - connectivity stream: [`Connectivity`]
//! - health stream: [`HealthView`] (server status + latest snapshot)
//!
//! [`StatusView`] is the narrow three-state projection for consumers that do
//! not care about per-service detail.

mod connection;
mod dispatch;
mod poller;
mod probe;
mod snapshot;
mod state;
mod status_view;

pub use connection::ConnectionMonitor;
pub use poller::PollerHandle;
pub use probe::HealthProbe;
pub use snapshot::{HealthSnapshot, OverallHealth, ServiceHealth, ServiceStatus};
pub use state::{Connectivity, HealthView, MonitorSettings, ServerStatus};
pub use status_view::{SimpleStatus, StatusView};
