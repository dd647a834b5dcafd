//! The shared connection monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use super::dispatch::Dispatcher;
use super::probe::HealthProbe;
use super::snapshot::HealthSnapshot;
use super::state::{Connectivity, HealthView, MonitorSettings, MonitorState, ServerStatus};
use crate::observers::{invoke, Callback, ObserverList, Subscription};
use crate::retry::{analyze, exponential_delay, ErrorInfo, RequestError};

/// Process-wide view of connectivity and backend health.
///
/// Create one per application and hand clones to every consumer; clones share
/// state, subscribers and the probe gate. All public operations are infallible:
/// probe failures become state transitions.
#[derive(Clone)]
pub struct ConnectionMonitor {
    pub(super) shared: Arc<Shared>,
}

pub(super) struct Shared {
    pub(super) settings: MonitorSettings,
    probe: Arc<dyn HealthProbe>,
    state: Mutex<MonitorState>,
    connectivity_observers: Arc<ObserverList<Connectivity>>,
    health_observers: Arc<ObserverList<HealthView>>,
    dispatcher: Dispatcher,
    /// Held for the duration of a probe; at most one probe is outstanding.
    probe_gate: tokio::sync::Mutex<()>,
    /// Connectivity came back: probe now.
    pub(super) wake: Notify,
    /// A forced probe finished: restart the wait with the new interval.
    pub(super) reschedule: Notify,
    pub(super) polling: AtomicBool,
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state();
        f.debug_struct("ConnectionMonitor")
            .field("connectivity", &state.connectivity)
            .field("server_status", &state.server_status)
            .field("consecutive_failures", &state.consecutive_failures)
            .finish()
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue_connectivity(&self, value: Connectivity) {
        let observers = Arc::clone(&self.connectivity_observers);
        self.dispatcher
            .enqueue(Box::new(move || observers.notify(&value)));
    }

    fn queue_health(&self, view: HealthView) {
        let observers = Arc::clone(&self.health_observers);
        self.dispatcher.enqueue(Box::new(move || observers.notify(&view)));
    }
}

impl ConnectionMonitor {
    /// Create a monitor that assumes the host is online.
    pub fn new(settings: MonitorSettings, probe: Arc<dyn HealthProbe>) -> Self {
        Self::with_connectivity(settings, probe, Connectivity::Online)
    }

    /// Create a monitor seeded with the host's current reachability.
    pub fn with_connectivity(
        settings: MonitorSettings,
        probe: Arc<dyn HealthProbe>,
        initial: Connectivity,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings,
                probe,
                state: Mutex::new(MonitorState::new(initial)),
                connectivity_observers: ObserverList::new(),
                health_observers: ObserverList::new(),
                dispatcher: Dispatcher::default(),
                probe_gate: tokio::sync::Mutex::new(()),
                wake: Notify::new(),
                reschedule: Notify::new(),
                polling: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.shared.settings
    }

    pub fn connectivity(&self) -> Connectivity {
        self.shared.state().connectivity
    }

    pub fn server_status(&self) -> ServerStatus {
        self.shared.state().server_status
    }

    pub fn health_snapshot(&self) -> Option<Arc<HealthSnapshot>> {
        self.shared.state().snapshot.clone()
    }

    pub fn health_view(&self) -> HealthView {
        self.shared.state().view()
    }

    /// Classification of the most recent failed probe, cleared by a successful one.
    pub fn last_probe_error(&self) -> Option<ErrorInfo> {
        self.shared.state().last_error.clone()
    }

    /// Interval the poll loop will wait before its next probe.
    pub fn next_poll_interval(&self) -> Duration {
        let failures = self.shared.state().consecutive_failures;
        let s = &self.shared.settings;
        exponential_delay(s.base_interval, failures, Some(s.max_interval))
    }

    /// Register for connectivity changes. The callback is invoked once right away
    /// with the current value, then on every change.
    pub fn subscribe_connectivity<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Connectivity) + Send + Sync + 'static,
    {
        let callback: Callback<Connectivity> = Arc::new(callback);
        let observers = Arc::clone(&self.shared.connectivity_observers);
        let (subscription, pending) = observers.reserve();
        let shared = Arc::clone(&self.shared);
        self.shared.dispatcher.enqueue(Box::new(move || {
            if observers.attach(&pending, Arc::clone(&callback)) {
                let current = shared.state().connectivity;
                invoke(&callback, &current);
            }
        }));
        self.shared.dispatcher.drain();
        subscription
    }

    /// Register for health changes. The callback is invoked once right away
    /// with the current view, then after every probe and every status change.
    pub fn subscribe_health<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&HealthView) + Send + Sync + 'static,
    {
        let callback: Callback<HealthView> = Arc::new(callback);
        let observers = Arc::clone(&self.shared.health_observers);
        let (subscription, pending) = observers.reserve();
        let shared = Arc::clone(&self.shared);
        self.shared.dispatcher.enqueue(Box::new(move || {
            if observers.attach(&pending, Arc::clone(&callback)) {
                let current = shared.state().view();
                invoke(&callback, &current);
            }
        }));
        self.shared.dispatcher.drain();
        subscription
    }

    /// Number of live subscribers across both streams.
    pub fn subscriber_count(&self) -> usize {
        self.shared.connectivity_observers.len() + self.shared.health_observers.len()
    }

    /// Feed a host reachability change into the monitor.
    ///
    /// Going offline takes the server offline immediately and drops the
    /// snapshot, regardless of the poll schedule. Coming back online wakes the
    /// poll loop for an immediate probe.
    pub fn report_connectivity(&self, connectivity: Connectivity) {
        {
            let mut state = self.shared.state();
            if state.connectivity == connectivity {
                return;
            }
            state.connectivity = connectivity;
            tracing::info!(?connectivity, "connectivity changed");
            self.shared.queue_connectivity(connectivity);
            if connectivity == Connectivity::Offline {
                state.server_status = ServerStatus::Offline;
                state.snapshot = None;
                self.shared.queue_health(state.view());
            }
        }
        self.shared.dispatcher.drain();
        if connectivity == Connectivity::Online && self.is_polling() {
            self.shared.wake.notify_one();
        }
    }

    /// Probe the backend now, ignoring the poll schedule and any backoff.
    ///
    /// If a probe is already in flight this waits for it instead of starting a
    /// second one. Does nothing while the host is offline.
    pub async fn force_check(&self) {
        if self.probe_coalesced(true).await && self.is_polling() {
            self.shared.reschedule.notify_one();
        }
    }

    fn is_polling(&self) -> bool {
        self.shared.polling.load(Ordering::SeqCst)
    }

    /// Run one probe unless one is already running; in that case wait for it.
    /// Returns true if this call performed the probe.
    pub(super) async fn probe_coalesced(&self, forced: bool) -> bool {
        if self.connectivity() == Connectivity::Offline {
            tracing::debug!("host offline, skipping probe");
            return false;
        }
        let _guard = match self.shared.probe_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("probe already in flight, waiting for it");
                let _ = self.shared.probe_gate.lock().await;
                return false;
            }
        };
        let mut checking = CheckingGuard {
            monitor: self,
            previous: if forced { self.mark_checking() } else { None },
        };
        let outcome = self.run_probe().await;
        checking.previous = None;
        self.apply_probe_outcome(outcome);
        true
    }

    /// Returns the status that `Checking` replaced, if it changed anything.
    fn mark_checking(&self) -> Option<ServerStatus> {
        let previous = {
            let mut state = self.shared.state();
            let previous = state.server_status;
            if previous == ServerStatus::Checking {
                return None;
            }
            state.server_status = ServerStatus::Checking;
            self.shared.queue_health(state.view());
            previous
        };
        self.shared.dispatcher.drain();
        Some(previous)
    }

    /// Undo `mark_checking` for a forced probe that was cancelled before it finished.
    fn restore_status(&self, previous: ServerStatus) {
        {
            let mut state = self.shared.state();
            if state.server_status != ServerStatus::Checking
                || state.connectivity == Connectivity::Offline
            {
                return;
            }
            tracing::debug!(to = ?previous, "forced probe cancelled, restoring server status");
            state.server_status = previous;
            self.shared.queue_health(state.view());
        }
        self.shared.dispatcher.drain();
    }

    async fn run_probe(&self) -> Result<HealthSnapshot, RequestError> {
        let deadline = self.shared.settings.probe_timeout;
        tracing::debug!(timeout_ms = deadline.as_millis() as u64, "probing backend health");
        match tokio::time::timeout(deadline, self.shared.probe.check()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RequestError::Timeout(deadline)),
        }
    }

    fn apply_probe_outcome(&self, outcome: Result<HealthSnapshot, RequestError>) {
        {
            let mut state = self.shared.state();
            state.probes_completed += 1;
            if state.connectivity == Connectivity::Offline {
                tracing::debug!("host went offline during probe, discarding result");
                return;
            }
            let previous = state.server_status;
            match outcome {
                Ok(snapshot) => {
                    state.consecutive_failures = 0;
                    state.last_error = None;
                    state.server_status = ServerStatus::Online;
                    if !snapshot.is_ok() {
                        tracing::warn!(
                            unhealthy = ?snapshot.unhealthy_services(),
                            "backend reports degraded health"
                        );
                    }
                    state.snapshot = Some(Arc::new(snapshot));
                    self.shared.queue_health(state.view());
                }
                Err(error) => {
                    let info = analyze(&error);
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    tracing::warn!(
                        failures = state.consecutive_failures,
                        error = %error,
                        "health probe failed"
                    );
                    let changed = previous != ServerStatus::Offline || state.snapshot.is_some();
                    state.last_error = Some(info);
                    state.server_status = ServerStatus::Offline;
                    state.snapshot = None;
                    if changed {
                        self.shared.queue_health(state.view());
                    }
                }
            }
            if previous != state.server_status {
                tracing::info!(
                    from = ?previous,
                    to = ?state.server_status,
                    "server status changed"
                );
            }
        }
        self.shared.dispatcher.drain();
    }

    /// Number of probes that have completed (successfully or not).
    pub fn probes_completed(&self) -> u64 {
        self.shared.state().probes_completed
    }
}

/// Restores the pre-`Checking` status if a forced probe is dropped mid-flight.
struct CheckingGuard<'a> {
    monitor: &'a ConnectionMonitor,
    previous: Option<ServerStatus>,
}

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.monitor.restore_status(previous);
        }
    }
}
