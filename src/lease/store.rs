// src/lease/store.rs

//! Shared lease store contract.
//!
//! The store holds one row per work item: `{owner, expires_at}`. Every
//! mutating method is a single atomic conditional update (compare-and-swap
//! or an equivalent transactional update in a real backend); no caller may
//! read-then-write lease fields outside these operations. That is the whole
//! mutual-exclusion guarantee: two workers racing to acquire the same free
//! row cannot both succeed.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row in the lease store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRow {
    pub work_item_id: String,
    pub owner: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LeaseRow {
    fn free(work_item_id: &str) -> Self {
        Self {
            work_item_id: work_item_id.to_string(),
            owner: None,
            expires_at: None,
        }
    }

    /// A row is held iff it has an owner and an unexpired expiry.
    pub fn is_held(&self, now: DateTime<Utc>) -> bool {
        match (&self.owner, self.expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }

    pub fn is_held_by(&self, worker_id: &str, now: DateTime<Utc>) -> bool {
        self.is_held(now) && self.owner.as_deref() == Some(worker_id)
    }
}

/// Transient store failure (network, backend outage). Retryable, unlike a
/// definitive lease-expired outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseStoreError {
    #[error("lease store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, LeaseStoreError>;

/// Outcome of a conditional lease extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    Extended,
    /// Row exists but another worker owns it.
    NotOwner,
    /// Caller was the owner but the lease already expired.
    Expired,
    /// No row for this work item.
    NotFound,
}

pub trait LeaseStore: Send + Sync {
    fn get(&self, work_item_id: &str) -> StoreResult<Option<LeaseRow>>;

    /// Atomically claim the row iff no *different* worker holds an unexpired
    /// lease. Expired rows may be taken over; re-acquiring one's own lease
    /// extends it. Returns whether the claim succeeded.
    fn try_acquire(
        &self,
        work_item_id: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Atomically extend the row iff `owner` still holds an unexpired lease.
    fn try_extend(
        &self,
        work_item_id: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<ExtendOutcome>;

    /// Atomically clear ownership iff `owner` is still recorded on the row,
    /// expired or not. Returns whether anything was cleared.
    fn try_release(&self, work_item_id: &str, owner: &str) -> StoreResult<bool>;
}

/// Mutex-guarded in-memory store.
///
/// Single-writer serialization stands in for the backend's row lock: every
/// trait method takes the map lock exactly once, so each call is one atomic
/// conditional update.
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    rows: Mutex<HashMap<String, LeaseRow>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn get(&self, work_item_id: &str) -> StoreResult<Option<LeaseRow>> {
        let rows = self.rows.lock().expect("lease store lock poisoned");
        Ok(rows.get(work_item_id).cloned())
    }

    fn try_acquire(
        &self,
        work_item_id: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut rows = self.rows.lock().expect("lease store lock poisoned");
        let row = rows
            .entry(work_item_id.to_string())
            .or_insert_with(|| LeaseRow::free(work_item_id));

        if row.is_held(now) && row.owner.as_deref() != Some(owner) {
            return Ok(false);
        }
        row.owner = Some(owner.to_string());
        row.expires_at = Some(expires_at);
        Ok(true)
    }

    fn try_extend(
        &self,
        work_item_id: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<ExtendOutcome> {
        let mut rows = self.rows.lock().expect("lease store lock poisoned");
        let Some(row) = rows.get_mut(work_item_id) else {
            return Ok(ExtendOutcome::NotFound);
        };

        if row.owner.as_deref() != Some(owner) {
            return Ok(ExtendOutcome::NotOwner);
        }
        if !row.is_held(now) {
            return Ok(ExtendOutcome::Expired);
        }
        row.expires_at = Some(expires_at);
        Ok(ExtendOutcome::Extended)
    }

    fn try_release(&self, work_item_id: &str, owner: &str) -> StoreResult<bool> {
        let mut rows = self.rows.lock().expect("lease store lock poisoned");
        let Some(row) = rows.get_mut(work_item_id) else {
            return Ok(false);
        };

        if row.owner.as_deref() != Some(owner) {
            return Ok(false);
        }
        row.owner = None;
        row.expires_at = None;
        Ok(true)
    }
}
