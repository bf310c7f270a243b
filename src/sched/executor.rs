// src/sched/executor.rs

//! Pluggable operation executor abstraction.
//!
//! The wave scheduler talks to an [`OperationExecutor`] instead of concrete
//! task-running logic. Production code supplies an executor that invokes
//! agents, subprocesses or RPCs; tests supply fakes that resolve instantly.
//!
//! The returned future must be `'static`: implementations clone whatever
//! they need into it rather than borrowing `self`, so the scheduler can run
//! operations on spawned tasks.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::graph::{TaskId, TaskNode};

/// Snapshot of a task node handed to the executor.
///
/// No schema is imposed beyond id/kind/payload; the payload is opaque to
/// this crate.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: TaskId,
    pub kind: String,
    pub payload: Value,
}

impl Operation {
    pub(crate) fn from_node(node: &TaskNode) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind.clone(),
            payload: node.payload.clone(),
        }
    }
}

/// Boxed future returned by [`OperationExecutor::execute`].
pub type OperationFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// Trait abstracting how a single operation is executed.
///
/// A returned `Err` is recorded on the node as a failure; it never aborts
/// sibling operations in the same wave.
pub trait OperationExecutor: Send + Sync {
    fn execute(&self, operation: Operation) -> OperationFuture;
}

/// Plain functions and closures can serve as executors directly.
impl<F> OperationExecutor for F
where
    F: Fn(Operation) -> OperationFuture + Send + Sync,
{
    fn execute(&self, operation: Operation) -> OperationFuture {
        self(operation)
    }
}
