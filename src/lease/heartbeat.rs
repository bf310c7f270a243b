// src/lease/heartbeat.rs

//! Background lease renewal.
//!
//! One dedicated OS thread per held work item: wait one interval, renew,
//! repeat. A definitive lease loss stops the loop and fires the loss
//! callback immediately; transient store failures are tolerated until a
//! consecutive-failure cap is reached, at which point the lease is treated
//! as lost too. A renewal success resets the failure counter.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::errors::WorkdagError;
use crate::lease::manager::LeaseManager;

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Pause between renewal attempts.
    pub interval: Duration,
    /// Lease duration requested on every renewal. Should comfortably exceed
    /// `interval` so a missed beat or two does not lose the lease.
    pub lease_duration: Duration,
    /// Consecutive transient failures tolerated before the lease is
    /// considered lost.
    pub max_failures: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            lease_duration: Duration::from_secs(300),
            max_failures: 3,
        }
    }
}

/// Callback invoked (at most once per `start`) when the lease is lost.
pub type LeaseLostCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct RunningThread {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct LeaseHeartbeat {
    manager: Arc<LeaseManager>,
    work_item_id: String,
    config: HeartbeatConfig,
    on_lease_lost: LeaseLostCallback,
    inner: Mutex<Option<RunningThread>>,
}

impl LeaseHeartbeat {
    pub fn new(
        manager: Arc<LeaseManager>,
        work_item_id: impl Into<String>,
        config: HeartbeatConfig,
        on_lease_lost: LeaseLostCallback,
    ) -> Self {
        Self {
            manager,
            work_item_id: work_item_id.into(),
            config,
            on_lease_lost,
            inner: Mutex::new(None),
        }
    }

    /// Spawn the renewal thread. Idempotent while a thread is running.
    pub fn start(&self) {
        let mut inner = self.inner.lock().expect("heartbeat lock poisoned");
        if let Some(running) = inner.as_ref()
            && !running.handle.is_finished()
        {
            debug!(item = %self.work_item_id, "heartbeat already running");
            return;
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let manager = self.manager.clone();
        let work_item_id = self.work_item_id.clone();
        let config = self.config.clone();
        let on_lease_lost = self.on_lease_lost.clone();

        let handle = thread::Builder::new()
            .name(format!("lease-heartbeat-{work_item_id}"))
            .spawn(move || {
                run_loop(manager, &work_item_id, config, on_lease_lost, stop_rx);
            })
            .expect("failed to spawn heartbeat thread");

        *inner = Some(RunningThread { stop_tx, handle });
        debug!(item = %self.work_item_id, "heartbeat started");
    }

    /// Signal the renewal thread to stop. Returns immediately; the thread
    /// notices at its next wakeup (within one interval). Idempotent.
    pub fn stop(&self) {
        let inner = self.inner.lock().expect("heartbeat lock poisoned");
        if let Some(running) = inner.as_ref() {
            // Send fails only if the thread already exited.
            let _ = running.stop_tx.send(());
            debug!(item = %self.work_item_id, "heartbeat stop requested");
        }
    }

    /// Signal stop and wait up to `timeout` for the thread to exit.
    pub fn stop_wait(&self, timeout: Duration) {
        self.stop();
        let deadline = Instant::now() + timeout;
        loop {
            {
                let inner = self.inner.lock().expect("heartbeat lock poisoned");
                match inner.as_ref() {
                    Some(running) if !running.handle.is_finished() => {}
                    _ => return,
                }
            }
            if Instant::now() >= deadline {
                warn!(item = %self.work_item_id, "heartbeat thread did not stop in time");
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn is_running(&self) -> bool {
        let inner = self.inner.lock().expect("heartbeat lock poisoned");
        matches!(inner.as_ref(), Some(running) if !running.handle.is_finished())
    }
}

fn run_loop(
    manager: Arc<LeaseManager>,
    work_item_id: &str,
    config: HeartbeatConfig,
    on_lease_lost: LeaseLostCallback,
    stop_rx: mpsc::Receiver<()>,
) {
    let mut failures: u32 = 0;
    loop {
        // Wait one interval first; the lease was just acquired when the
        // heartbeat starts, so an immediate renewal would be redundant.
        match stop_rx.recv_timeout(config.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!(item = %work_item_id, "heartbeat stopping");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        match manager.renew_lease(work_item_id, config.lease_duration) {
            Ok(()) => {
                failures = 0;
            }
            Err(WorkdagError::LeaseExpired(_)) => {
                warn!(item = %work_item_id, "lease lost, stopping heartbeat");
                on_lease_lost(work_item_id);
                return;
            }
            Err(err) => {
                failures += 1;
                warn!(
                    item = %work_item_id,
                    failures,
                    max = config.max_failures,
                    error = %err,
                    "lease renewal failed"
                );
                if failures >= config.max_failures {
                    error!(item = %work_item_id, "renewal failure cap reached, treating lease as lost");
                    on_lease_lost(work_item_id);
                    return;
                }
            }
        }
    }
}
