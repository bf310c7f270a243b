// src/lease/manager.rs

//! One worker's view of the lease store.
//!
//! The manager binds a worker id at construction and translates store
//! outcomes into crate errors: losing a lease during renewal is the
//! definitive [`WorkdagError::LeaseExpired`], while store outages surface as
//! transient [`WorkdagError::LeaseStore`] errors the caller may retry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::{Result, WorkdagError};
use crate::lease::store::{ExtendOutcome, LeaseStore};

pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    worker_id: String,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn LeaseStore>, worker_id: impl Into<String>) -> Self {
        Self {
            store,
            worker_id: worker_id.into(),
        }
    }

    /// The identity this manager acts as. Fixed at construction; a process
    /// hosting several logical workers creates one manager per identity, and
    /// embedders use this to label their own logs and audit records.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Try to take (or re-take) the lease on a work item for `duration` from
    /// now. Returns `false` when another worker holds it; that is a normal
    /// outcome, not an error.
    pub fn acquire_lease(&self, work_item_id: &str, duration: Duration) -> Result<bool> {
        let now = Utc::now();
        let expires_at = lease_expiry(now, duration)?;

        let acquired = self
            .store
            .try_acquire(work_item_id, &self.worker_id, expires_at, now)?;
        if acquired {
            debug!(item = %work_item_id, worker = %self.worker_id, %expires_at, "lease acquired");
        } else {
            debug!(item = %work_item_id, worker = %self.worker_id, "lease held elsewhere");
        }
        Ok(acquired)
    }

    /// Extend a held lease to `duration` from now.
    ///
    /// Fails with [`WorkdagError::LeaseExpired`] when this worker no longer
    /// owns the item, whatever form the loss took on the store side.
    pub fn renew_lease(&self, work_item_id: &str, duration: Duration) -> Result<()> {
        let now = Utc::now();
        let expires_at = lease_expiry(now, duration)?;

        match self
            .store
            .try_extend(work_item_id, &self.worker_id, expires_at, now)?
        {
            ExtendOutcome::Extended => {
                debug!(item = %work_item_id, worker = %self.worker_id, %expires_at, "lease renewed");
                Ok(())
            }
            ExtendOutcome::NotOwner | ExtendOutcome::Expired | ExtendOutcome::NotFound => {
                Err(WorkdagError::LeaseExpired(work_item_id.to_string()))
            }
        }
    }

    /// Give up the lease on a work item. Releasing an item this worker does
    /// not own is silently ignored.
    pub fn release_lease(&self, work_item_id: &str) -> Result<()> {
        let released = self.store.try_release(work_item_id, &self.worker_id)?;
        if released {
            debug!(item = %work_item_id, worker = %self.worker_id, "lease released");
        } else {
            warn!(item = %work_item_id, worker = %self.worker_id, "release of lease not held");
        }
        Ok(())
    }
}

fn lease_expiry(now: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>> {
    let duration = chrono::Duration::from_std(duration)
        .map_err(|e| anyhow!("lease duration out of range: {e}"))?;
    Ok(now + duration)
}
