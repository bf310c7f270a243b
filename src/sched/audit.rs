// src/sched/audit.rs

//! Audit event model and the injected sink.
//!
//! The durable audit backend lives outside this crate; schedulers only see
//! an object with a single `write` method. Exactly one event is emitted per
//! scheduling tick.

use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::graph::TaskId;
use crate::sched::budget::BudgetStatus;

/// One scheduling decision that was not admitted this tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedTask {
    pub task_id: TaskId,
    pub reason: String,
}

/// Why a tick decided what it decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReason {
    pub budget_state: BudgetStatus,
    pub rejected: Vec<RejectedTask>,
}

/// One audit event per scheduling tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub scheduler_mode: String,
    /// What caused this tick (e.g. "startup", "task_completed").
    pub trigger: String,
    pub selected_task_ids: Vec<TaskId>,
    /// "scheduled" when anything was admitted, "deferred" otherwise.
    pub decision: String,
    pub reason: AuditReason,
}

/// Write-only sink for audit events, injected by the embedding process.
pub trait AuditSink: Send + Sync {
    fn write(&self, event: AuditEvent);
}

/// In-memory sink for tests and simple embeddings.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .expect("audit event lock poisoned")
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, event: AuditEvent) {
        debug!(
            trigger = %event.trigger,
            decision = %event.decision,
            selected = event.selected_task_ids.len(),
            rejected = event.reason.rejected.len(),
            "audit event"
        );
        self.events
            .lock()
            .expect("audit event lock poisoned")
            .push(event);
    }
}
