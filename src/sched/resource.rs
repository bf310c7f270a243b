// src/sched/resource.rs

//! Per-tick, budget-constrained admission control over a task graph.
//!
//! Decoupled from actually running work: `tick` only decides which ready
//! tasks may begin and marks them Running; the embedding worker executes
//! them and reports back through `finish_task`, which feeds the next tick.
//!
//! Admission is greedy first-fit in priority order. A later, higher-priority
//! but larger task can be rejected because a smaller one already consumed
//! the remaining budget; tests depend on this documented behaviour.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{Result, WorkdagError};
use crate::graph::{TaskGraph, TaskId, TaskNode, TaskStatus};
use crate::sched::audit::{AuditEvent, AuditReason, AuditSink, RejectedTask};
use crate::sched::budget::{Budget, BudgetStatus};

/// Result of one scheduling tick.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub admitted: Vec<TaskId>,
    pub rejected: Vec<RejectedTask>,
}

pub struct ResourceAwareScheduler {
    budget: Budget,
    audit: Arc<dyn AuditSink>,
    /// Ids admitted and not yet finished.
    running: HashSet<TaskId>,
}

impl ResourceAwareScheduler {
    pub fn new(budget: Budget, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            budget,
            audit,
            running: HashSet::new(),
        }
    }

    /// Whether a task currently fits the budget, with a machine-readable
    /// rejection reason. Checks token, then cost, then parallelism budget.
    pub fn can_schedule(&self, node: &TaskNode) -> (bool, Option<String>) {
        match self
            .budget
            .check(node.estimated_tokens, node.estimated_cost)
        {
            None => (true, None),
            Some(reason) => (false, Some(reason)),
        }
    }

    /// Charge an admitted task against the budget. Called exactly once per
    /// admission, at admission time.
    pub fn record_usage(&mut self, tokens: u64, cost: f64) {
        self.budget.record_usage(tokens, cost);
    }

    /// Free a parallelism slot; token/cost usage is not refunded.
    pub fn release_slot(&mut self) {
        self.budget.release_slot();
    }

    pub fn budget_status(&self) -> BudgetStatus {
        self.budget.status()
    }

    /// One admission pass: ready set, priority order, greedy first-fit
    /// against the budget, conflict check against running tasks. Admitted
    /// nodes are marked Running. Emits exactly one audit event.
    pub fn tick(&mut self, graph: &mut TaskGraph, trigger: &str) -> TickOutcome {
        let completed: HashSet<TaskId> = graph
            .tasks()
            .filter(|n| n.status == TaskStatus::Completed)
            .map(|n| n.id.clone())
            .collect();

        // Only tasks not yet admitted are candidates.
        let candidates: Vec<TaskId> = graph
            .ready_tasks(&completed)
            .into_iter()
            .filter(|id| {
                matches!(
                    graph.get(id).map(|n| n.status),
                    Some(TaskStatus::Pending) | Some(TaskStatus::Ready)
                )
            })
            .collect();
        let ordered = graph.sort_by_priority(&candidates);

        let mut outcome = TickOutcome::default();
        let mut running_now: Vec<TaskId> = self.running.iter().cloned().collect();

        for id in ordered {
            if graph.check_conflicts(&id, &running_now) {
                outcome.rejected.push(RejectedTask {
                    task_id: id.clone(),
                    reason: format!("conflicts_with_running (running={running_now:?})"),
                });
                continue;
            }

            let Some(node) = graph.get(&id) else { continue };
            match self.can_schedule(node) {
                (true, _) => {
                    self.budget
                        .record_usage(node.estimated_tokens, node.estimated_cost);
                    if let Some(node) = graph.get_mut(&id) {
                        node.status = TaskStatus::Running;
                    }
                    self.running.insert(id.clone());
                    running_now.push(id.clone());
                    debug!(task = %id, "admitted");
                    outcome.admitted.push(id);
                }
                (false, reason) => {
                    let reason = reason.unwrap_or_default();
                    debug!(task = %id, reason = %reason, "rejected");
                    outcome.rejected.push(RejectedTask {
                        task_id: id,
                        reason,
                    });
                }
            }
        }

        let decision = if outcome.admitted.is_empty() {
            "deferred"
        } else {
            "scheduled"
        };
        info!(
            trigger,
            decision,
            admitted = outcome.admitted.len(),
            rejected = outcome.rejected.len(),
            "scheduling tick"
        );

        self.audit.write(AuditEvent {
            scheduler_mode: "resource_aware".to_string(),
            trigger: trigger.to_string(),
            selected_task_ids: outcome.admitted.clone(),
            decision: decision.to_string(),
            reason: AuditReason {
                budget_state: self.budget.status(),
                rejected: outcome.rejected.clone(),
            },
        });

        outcome
    }

    /// Record a terminal outcome for an admitted task and free its slot.
    ///
    /// The terminal status feeds the next tick's ready-set computation.
    pub fn finish_task(
        &mut self,
        graph: &mut TaskGraph,
        id: &str,
        outcome: std::result::Result<Value, String>,
    ) -> Result<()> {
        let node = graph
            .get_mut(id)
            .ok_or_else(|| WorkdagError::TaskNotFound(id.to_string()))?;

        if node.status != TaskStatus::Running {
            warn!(task = %id, status = ?node.status, "finish_task for task not running");
        }
        match outcome {
            Ok(value) => {
                node.status = TaskStatus::Completed;
                node.result = Some(value);
            }
            Err(error) => {
                node.status = TaskStatus::Failed;
                node.error = Some(error);
            }
        }

        if self.running.remove(id) {
            self.budget.release_slot();
        }
        Ok(())
    }
}
