// src/lease/mod.rs

//! Time-bounded exclusive ownership of work items.
//!
//! - [`store`] defines the shared lease store contract (one row per work
//!   item, atomic conditional updates) plus an in-memory implementation.
//! - [`manager`] grants/renews/releases leases for one worker against that
//!   store, using expiry as a fencing mechanism.
//! - [`heartbeat`] keeps a held lease alive from a background thread and
//!   reports loss via callback.

pub mod heartbeat;
pub mod manager;
pub mod store;

pub use heartbeat::{HeartbeatConfig, LeaseHeartbeat};
pub use manager::LeaseManager;
pub use store::{ExtendOutcome, InMemoryLeaseStore, LeaseRow, LeaseStore, LeaseStoreError};
