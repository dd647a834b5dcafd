//! Periodic probing loop.
//!
//! While the host is online the loop probes, then waits for the current poll
//! interval (base interval, doubled per consecutive failure, capped). While the
//! host is offline it waits without probing until connectivity returns.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;

use super::connection::ConnectionMonitor;
use super::state::Connectivity;

/// Handle to a running poll loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct PollerHandle {
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop the loop (abandoning any probe in flight) and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Clears the "polling" flag however the loop ends (shutdown, abort, panic).
struct PollingFlag(ConnectionMonitor);

impl Drop for PollingFlag {
    fn drop(&mut self) {
        self.0.shared.polling.store(false, Ordering::SeqCst);
    }
}

impl ConnectionMonitor {
    /// Start the poll loop on the current tokio runtime.
    ///
    /// Returns `None` if this monitor already has a running loop; all clones
    /// share that one loop.
    pub fn spawn_polling(&self) -> Option<PollerHandle> {
        if self.shared.polling.swap(true, Ordering::SeqCst) {
            tracing::debug!("poll loop already running");
            return None;
        }
        let monitor = self.clone();
        let task = tokio::spawn(async move {
            let _flag = PollingFlag(monitor.clone());
            monitor.poll_loop().await;
        });
        Some(PollerHandle { task: Some(task) })
    }

    async fn poll_loop(&self) {
        tracing::debug!("poll loop started");
        let mut probe_now = true;
        loop {
            let online = self.connectivity() == Connectivity::Online;
            if probe_now && online {
                self.probe_coalesced(false).await;
            }
            probe_now = true;

            let wait: Pin<Box<dyn Future<Output = ()> + Send>> =
                if self.connectivity() == Connectivity::Online {
                    let interval = self.next_poll_interval();
                    tracing::debug!(
                        interval_ms = interval.as_millis() as u64,
                        "next probe scheduled"
                    );
                    Box::pin(tokio::time::sleep(interval))
                } else {
                    Box::pin(std::future::pending())
                };

            tokio::select! {
                _ = self.shared.wake.notified() => {}
                _ = self.shared.reschedule.notified() => probe_now = false,
                _ = wait => {}
            }
        }
    }
}
