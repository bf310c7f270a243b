// tests/heartbeat_loss.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use workdag::lease::{
    ExtendOutcome, HeartbeatConfig, InMemoryLeaseStore, LeaseHeartbeat, LeaseManager, LeaseRow,
    LeaseStore, LeaseStoreError,
};

type TestResult = Result<(), Box<dyn Error>>;

fn fast_config() -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_millis(20),
        lease_duration: Duration::from_secs(60),
        max_failures: 3,
    }
}

fn heartbeat_for(
    store: Arc<dyn LeaseStore>,
    item: &str,
    config: HeartbeatConfig,
    losses: Arc<AtomicUsize>,
) -> LeaseHeartbeat {
    let manager = Arc::new(LeaseManager::new(store, "worker-1"));
    LeaseHeartbeat::new(
        manager,
        item,
        config,
        Arc::new(move |_item: &str| {
            losses.fetch_add(1, Ordering::SeqCst);
        }),
    )
}

#[test]
fn lost_lease_fires_callback_once_and_stops() -> TestResult {
    init_tracing();

    // No lease was ever acquired, so the very first renewal is a
    // definitive loss.
    let store = Arc::new(InMemoryLeaseStore::new());
    let losses = Arc::new(AtomicUsize::new(0));
    let heartbeat = heartbeat_for(store, "item", fast_config(), losses.clone());

    heartbeat.start();
    assert!(heartbeat.is_running());

    // Give the loop time for its first renewal attempt.
    thread::sleep(Duration::from_millis(150));
    assert_eq!(losses.load(Ordering::SeqCst), 1);
    assert!(!heartbeat.is_running());
    Ok(())
}

#[test]
fn healthy_lease_keeps_renewing() -> TestResult {
    init_tracing();

    let store = Arc::new(InMemoryLeaseStore::new());
    let manager = LeaseManager::new(store.clone(), "worker-1");
    assert!(manager.acquire_lease("item", Duration::from_secs(60))?);
    let initial_expiry = store.get("item")?.unwrap().expires_at.unwrap();

    let losses = Arc::new(AtomicUsize::new(0));
    let heartbeat = heartbeat_for(store.clone(), "item", fast_config(), losses.clone());

    heartbeat.start();
    thread::sleep(Duration::from_millis(100));
    heartbeat.stop_wait(Duration::from_secs(2));

    assert_eq!(losses.load(Ordering::SeqCst), 0);
    let renewed_expiry = store.get("item")?.unwrap().expires_at.unwrap();
    assert!(renewed_expiry > initial_expiry);
    Ok(())
}

/// Store wrapper that fails renewals transiently for a fixed number of
/// calls, then recovers.
struct FlakyStore {
    inner: InMemoryLeaseStore,
    failures_left: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryLeaseStore::new(),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

impl LeaseStore for FlakyStore {
    fn get(&self, work_item_id: &str) -> Result<Option<LeaseRow>, LeaseStoreError> {
        self.inner.get(work_item_id)
    }

    fn try_acquire(
        &self,
        work_item_id: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, LeaseStoreError> {
        self.inner.try_acquire(work_item_id, owner, expires_at, now)
    }

    fn try_extend(
        &self,
        work_item_id: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ExtendOutcome, LeaseStoreError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(LeaseStoreError::Unavailable("injected outage".to_string()));
        }
        self.inner.try_extend(work_item_id, owner, expires_at, now)
    }

    fn try_release(&self, work_item_id: &str, owner: &str) -> Result<bool, LeaseStoreError> {
        self.inner.try_release(work_item_id, owner)
    }
}

#[test]
fn transient_failures_below_cap_are_survived() -> TestResult {
    init_tracing();

    // Two outages, cap of three: the heartbeat must ride it out.
    let store = Arc::new(FlakyStore::new(2));
    let manager = LeaseManager::new(store.clone(), "worker-1");
    assert!(manager.acquire_lease("item", Duration::from_secs(60))?);

    let losses = Arc::new(AtomicUsize::new(0));
    let heartbeat = heartbeat_for(store.clone(), "item", fast_config(), losses.clone());

    heartbeat.start();
    thread::sleep(Duration::from_millis(150));
    heartbeat.stop_wait(Duration::from_secs(2));

    assert_eq!(losses.load(Ordering::SeqCst), 0);
    assert_eq!(store.get("item")?.unwrap().owner.as_deref(), Some("worker-1"));
    Ok(())
}

#[test]
fn failure_cap_reached_counts_as_lost() -> TestResult {
    init_tracing();

    let store = Arc::new(FlakyStore::new(100));
    let manager = LeaseManager::new(store.clone(), "worker-1");
    assert!(manager.acquire_lease("item", Duration::from_secs(60))?);

    let losses = Arc::new(AtomicUsize::new(0));
    let heartbeat = heartbeat_for(store, "item", fast_config(), losses.clone());

    heartbeat.start();
    // Three consecutive failures at a 20ms interval reach the cap well
    // within this window.
    thread::sleep(Duration::from_millis(300));
    assert_eq!(losses.load(Ordering::SeqCst), 1);
    assert!(!heartbeat.is_running());
    Ok(())
}

#[test]
fn stop_takes_effect_within_one_interval() -> TestResult {
    init_tracing();

    let store = Arc::new(InMemoryLeaseStore::new());
    let manager = LeaseManager::new(store.clone(), "worker-1");
    assert!(manager.acquire_lease("item", Duration::from_secs(60))?);

    // A long interval makes the bound observable: a loop that slept the full
    // interval instead of selecting on the stop signal would blow the
    // deadline below.
    let config = HeartbeatConfig {
        interval: Duration::from_secs(30),
        lease_duration: Duration::from_secs(60),
        max_failures: 3,
    };
    let losses = Arc::new(AtomicUsize::new(0));
    let heartbeat = heartbeat_for(store, "item", config, losses.clone());

    heartbeat.start();
    assert!(heartbeat.is_running());

    let begin = Instant::now();
    heartbeat.stop_wait(Duration::from_secs(10));
    let elapsed = begin.elapsed();

    assert!(!heartbeat.is_running());
    // The stop signal interrupts the timed wait; nowhere near the 30s
    // interval, let alone the stop_wait deadline.
    assert!(elapsed < Duration::from_secs(2), "stop took {elapsed:?}");
    assert_eq!(losses.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn start_and_stop_are_idempotent() -> TestResult {
    init_tracing();

    let store = Arc::new(InMemoryLeaseStore::new());
    let manager = LeaseManager::new(store.clone(), "worker-1");
    assert!(manager.acquire_lease("item", Duration::from_secs(60))?);

    let losses = Arc::new(AtomicUsize::new(0));
    let heartbeat = heartbeat_for(store, "item", fast_config(), losses.clone());

    heartbeat.start();
    heartbeat.start(); // second start is a no-op while running
    assert!(heartbeat.is_running());

    heartbeat.stop();
    heartbeat.stop();
    heartbeat.stop_wait(Duration::from_secs(2));
    assert!(!heartbeat.is_running());

    // After a clean stop the lease was never reported lost.
    assert_eq!(losses.load(Ordering::SeqCst), 0);
    Ok(())
}
