// src/errors.rs

//! Crate-wide error types and result alias.

use thiserror::Error;

use crate::lease::LeaseStoreError;

#[derive(Error, Debug)]
pub enum WorkdagError {
    #[error("Cycle detected in task graph: {0}")]
    Cycle(String),

    #[error("Task '{task}' has unknown dependency '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    /// The caller no longer holds the lease (expired or taken over).
    ///
    /// This is definitive; [`WorkdagError::LeaseStore`] signals a transient
    /// store failure that may be retried instead.
    #[error("Lease expired or owned by another worker: {0}")]
    LeaseExpired(String),

    #[error("Lease store error: {0}")]
    LeaseStore(#[from] LeaseStoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WorkdagError>;
