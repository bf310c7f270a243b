// tests/lease_exclusion.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use workdag::lease::{InMemoryLeaseStore, LeaseManager, LeaseStore};
use workdag::WorkdagError;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn only_one_worker_holds_a_lease() -> TestResult {
    init_tracing();

    let store = Arc::new(InMemoryLeaseStore::new());
    let w1 = LeaseManager::new(store.clone(), "worker-1");
    let w2 = LeaseManager::new(store.clone(), "worker-2");

    assert!(w1.acquire_lease("item", Duration::from_secs(60))?);
    assert!(!w2.acquire_lease("item", Duration::from_secs(60))?);

    // Acquisition by the holder is an extension, not a failure.
    assert!(w1.acquire_lease("item", Duration::from_secs(60))?);

    w1.release_lease("item")?;
    assert!(w2.acquire_lease("item", Duration::from_secs(60))?);
    Ok(())
}

#[test]
fn expired_lease_can_be_taken_over() -> TestResult {
    init_tracing();

    let store = Arc::new(InMemoryLeaseStore::new());
    let w1 = LeaseManager::new(store.clone(), "worker-1");
    let w2 = LeaseManager::new(store.clone(), "worker-2");

    assert!(w1.acquire_lease("item", Duration::from_millis(50))?);
    thread::sleep(Duration::from_millis(120));

    assert!(w2.acquire_lease("item", Duration::from_secs(60))?);

    // The original holder now renews into someone else's lease.
    let err = w1.renew_lease("item", Duration::from_secs(60)).unwrap_err();
    assert!(matches!(err, WorkdagError::LeaseExpired(_)));
    Ok(())
}

#[test]
fn renewal_pushes_expiry_forward() -> TestResult {
    init_tracing();

    let store = Arc::new(InMemoryLeaseStore::new());
    let w1 = LeaseManager::new(store.clone(), "worker-1");

    assert!(w1.acquire_lease("item", Duration::from_secs(10))?);
    let before = store.get("item")?.unwrap().expires_at.unwrap();

    w1.renew_lease("item", Duration::from_secs(120))?;
    let after = store.get("item")?.unwrap().expires_at.unwrap();

    assert!(after > before);
    assert!(after > Utc::now() + chrono::Duration::seconds(60));
    Ok(())
}

#[test]
fn non_owner_renew_and_release_do_not_disturb_the_holder() -> TestResult {
    init_tracing();

    let store = Arc::new(InMemoryLeaseStore::new());
    let w1 = LeaseManager::new(store.clone(), "worker-1");
    let w2 = LeaseManager::new(store.clone(), "worker-2");

    assert!(w1.acquire_lease("item", Duration::from_secs(60))?);

    let err = w2.renew_lease("item", Duration::from_secs(60)).unwrap_err();
    assert!(matches!(err, WorkdagError::LeaseExpired(_)));

    // Stale release is a silent no-op.
    w2.release_lease("item")?;
    let row = store.get("item")?.unwrap();
    assert!(row.is_held_by("worker-1", Utc::now()));
    Ok(())
}
