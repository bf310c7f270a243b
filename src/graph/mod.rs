// src/graph/mod.rs

//! Dependency graph representation and algorithms.
//!
//! - [`node`] holds the task data model: statuses, attributes and per-node
//!   execution state.
//! - [`task_graph`] contains the graph itself: cycle detection, topological
//!   layering, readiness queries, priority ordering and conflict queries.
//!
//! No execution logic lives here; schedulers in [`crate::sched`] drive the
//! status transitions.

pub mod node;
pub mod task_graph;

pub use node::{TaskAttrs, TaskId, TaskNode, TaskStatus};
pub use task_graph::TaskGraph;
