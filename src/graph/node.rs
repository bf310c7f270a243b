// src/graph/node.rs

//! Task metadata and per-node execution state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical task id type used throughout the crate.
pub type TaskId = String;

/// Lifecycle status of a task node.
///
/// Transitions are monotonic and never revert:
/// Pending -> Ready -> Running -> {Completed, Failed}, and
/// Pending/Ready -> Skipped once an upstream failure makes progress
/// impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting on at least one dependency.
    Pending,
    /// All dependencies completed; eligible for admission.
    Ready,
    /// Dispatched to an executor.
    Running,
    Completed,
    Failed,
    /// Never ran because a (transitive) dependency failed.
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// Attributes supplied when inserting a task into the graph.
///
/// Everything here is static metadata; execution state (status, result,
/// error) lives on [`TaskNode`] and is mutated only by the owning scheduler.
#[derive(Debug, Clone, Default)]
pub struct TaskAttrs {
    /// Free-form operation type, passed through to the executor.
    pub kind: String,
    /// Opaque payload, passed through to the executor.
    pub payload: Value,
    /// Higher runs first; ties keep insertion order.
    pub priority: i64,
    /// Tasks sharing a tag are grouped by `parallelizable_tasks`.
    pub parallel_group: Option<String>,
    /// Task ids that must never run concurrently with this one.
    pub conflicts_with: HashSet<TaskId>,
    /// Estimated token usage, charged against the token budget at admission.
    pub estimated_tokens: u64,
    /// Estimated cost in USD, charged against the cost budget at admission.
    pub estimated_cost: f64,
}

/// A node in the dependency graph.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub id: TaskId,
    pub kind: String,
    pub payload: Value,
    /// Direct dependencies: tasks that must complete before this one runs.
    pub depends_on: Vec<TaskId>,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub priority: i64,
    pub parallel_group: Option<String>,
    pub conflicts_with: HashSet<TaskId>,
    pub estimated_tokens: u64,
    pub estimated_cost: f64,
}

impl TaskNode {
    pub(crate) fn new(id: TaskId, depends_on: Vec<TaskId>, attrs: TaskAttrs) -> Self {
        Self {
            id,
            kind: attrs.kind,
            payload: attrs.payload,
            depends_on,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            priority: attrs.priority,
            parallel_group: attrs.parallel_group,
            conflicts_with: attrs.conflicts_with,
            estimated_tokens: attrs.estimated_tokens,
            estimated_cost: attrs.estimated_cost,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
