// src/lib.rs

//! Scheduling and work-coordination core for an agent-orchestration worker.
//!
//! This library combines three pieces that a task runner wires together:
//! - [`graph`]: an in-memory dependency graph (cycle detection, topological
//!   layering, readiness and conflict queries) with no execution logic.
//! - [`sched`]: a wave-based parallel executor over a validated graph, plus a
//!   budget-constrained admission-control layer that emits audit events.
//! - [`lease`]: time-bounded exclusive ownership of work items against a
//!   shared store, kept alive by a background heartbeat thread.
//!
//! The actual task-executing logic, the durable audit backend and the lease
//! store backend are all injected by the embedding process; this crate only
//! defines their contracts and the coordination semantics around them.

pub mod errors;
pub mod graph;
pub mod lease;
pub mod logging;
pub mod sched;

pub use errors::{Result, WorkdagError};
