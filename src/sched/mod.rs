// src/sched/mod.rs

//! Schedulers built on top of [`crate::graph`].
//!
//! - [`executor`] defines the injected async executor contract.
//! - [`dag_scheduler`] executes a validated graph in dependency-ordered
//!   waves, bounded by a concurrency cap.
//! - [`budget`] holds the per-session resource budgets and counters.
//! - [`resource`] layers per-tick admission control over the graph.
//! - [`audit`] defines the audit event model and the injected sink.

pub mod audit;
pub mod budget;
pub mod dag_scheduler;
pub mod executor;
pub mod resource;

pub use audit::{AuditEvent, AuditReason, AuditSink, MemoryAuditSink, RejectedTask};
pub use budget::{Budget, BudgetStatus};
pub use dag_scheduler::{DagScheduler, ExecutionReport, ExecutionStats, OperationOutcome};
pub use executor::{Operation, OperationExecutor, OperationFuture};
pub use resource::{ResourceAwareScheduler, TickOutcome};
