// src/sched/dag_scheduler.rs

//! Wave-based parallel execution of a validated task graph.
//!
//! The scheduler repeatedly computes the ready set (all dependencies
//! completed), runs that wave concurrently bounded by a counting semaphore,
//! and applies each outcome to its node. One operation's failure is local:
//! it only causes dependents to end up `Skipped` once no progress remains.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::errors::{Result, WorkdagError};
use crate::graph::{TaskGraph, TaskId, TaskStatus};
use crate::sched::executor::{Operation, OperationExecutor};

/// Terminal outcome of one operation, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OperationOutcome {
    Completed { result: Value },
    Failed { error: String },
    Skipped { reason: String },
}

/// Structured result of a full `execute_parallel` run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// True iff no node ended `Failed`. Skipped nodes do not count as
    /// failures on their own.
    pub all_success: bool,
    pub results: HashMap<TaskId, OperationOutcome>,
}

/// Aggregate counters over one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Number of waves dispatched.
    pub waves: usize,
    /// Widest wave (upper bound on observed concurrency).
    pub max_parallelism: usize,
}

/// Executes a validated [`TaskGraph`] via an injected executor.
///
/// Construction validates eagerly: unknown dependency references and cycles
/// both fail here, stricter than the graph's own lazy validation, because a
/// scheduler must never start a graph it cannot finish.
#[derive(Debug)]
pub struct DagScheduler {
    graph: TaskGraph,
    waves: usize,
    max_parallelism: usize,
}

impl DagScheduler {
    pub fn new(graph: TaskGraph) -> Result<Self> {
        for node in graph.tasks() {
            for dep in &node.depends_on {
                if !graph.contains(dep) {
                    return Err(WorkdagError::UnknownDependency {
                        task: node.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        graph.toposort()?;

        Ok(Self {
            graph,
            waves: 0,
            max_parallelism: 0,
        })
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Run the whole graph, wave by wave.
    ///
    /// At most `max_concurrency` operations are in flight at any moment.
    /// Per-operation failures are recorded on the node and never raised out
    /// of this method; a later wave never starts before every operation of
    /// the current wave reached a terminal state.
    pub async fn execute_parallel(
        &mut self,
        executor: Arc<dyn OperationExecutor>,
        max_concurrency: usize,
    ) -> ExecutionReport {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        info!(
            tasks = self.graph.len(),
            max_concurrency, "starting wave execution"
        );

        loop {
            let wave = self.promote_ready();
            if wave.is_empty() {
                break;
            }

            self.waves += 1;
            self.max_parallelism = self.max_parallelism.max(wave.len());
            debug!(wave = self.waves, width = wave.len(), tasks = ?wave, "dispatching wave");

            let mut handles = Vec::with_capacity(wave.len());
            for id in &wave {
                let node = self.graph.get_mut(id).expect("wave member exists");
                node.status = TaskStatus::Running;

                let op = Operation::from_node(node);
                let sem = Arc::clone(&semaphore);
                let exec = Arc::clone(&executor);
                handles.push((
                    id.clone(),
                    tokio::spawn(async move {
                        let _permit = sem
                            .acquire_owned()
                            .await
                            .expect("wave semaphore never closed");
                        exec.execute(op).await
                    }),
                ));
            }

            // Wave barrier: every operation reaches a terminal state before
            // the next ready set is computed.
            for (id, handle) in handles {
                let outcome = match handle.await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(join_err) => Err(format!("operation panicked: {join_err}")),
                };
                self.apply_outcome(&id, outcome);
            }
        }

        self.skip_unreachable();
        let report = self.report();
        info!(
            all_success = report.all_success,
            waves = self.waves,
            "wave execution finished"
        );
        report
    }

    /// Aggregate counters for the most recent execution.
    pub fn statistics(&self) -> ExecutionStats {
        let mut stats = ExecutionStats {
            total: self.graph.len(),
            waves: self.waves,
            max_parallelism: self.max_parallelism,
            ..ExecutionStats::default()
        };
        for node in self.graph.tasks() {
            match node.status {
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Skipped => stats.skipped += 1,
                _ => {}
            }
        }
        stats
    }

    /// Flip Pending -> Ready where every dependency completed, then return
    /// the full ready set ordered by priority (descending, stable by id).
    fn promote_ready(&mut self) -> Vec<TaskId> {
        let promotable: Vec<TaskId> = self
            .graph
            .tasks()
            .filter(|n| n.status == TaskStatus::Pending)
            .filter(|n| {
                n.depends_on
                    .iter()
                    .all(|d| self.graph.get(d).map(|dep| dep.status) == Some(TaskStatus::Completed))
            })
            .map(|n| n.id.clone())
            .collect();

        for id in &promotable {
            if let Some(node) = self.graph.get_mut(id) {
                node.status = TaskStatus::Ready;
            }
        }

        let mut ready: Vec<TaskId> = self
            .graph
            .tasks()
            .filter(|n| n.status == TaskStatus::Ready)
            .map(|n| n.id.clone())
            .collect();
        ready.sort();
        self.graph.sort_by_priority(&ready)
    }

    fn apply_outcome(&mut self, id: &str, outcome: std::result::Result<Value, String>) {
        let Some(node) = self.graph.get_mut(id) else {
            return;
        };
        match outcome {
            Ok(value) => {
                node.status = TaskStatus::Completed;
                node.result = Some(value);
                debug!(task = %id, "operation completed");
            }
            Err(error) => {
                node.status = TaskStatus::Failed;
                warn!(task = %id, error = %error, "operation failed; dependents will be skipped");
                node.error = Some(error);
            }
        }
    }

    /// Mark nodes that can no longer run as Skipped, naming a blocking
    /// dependency.
    fn skip_unreachable(&mut self) {
        // Walk in topological order so a skipped node is terminal before its
        // own dependents are inspected. The graph was validated acyclic at
        // construction.
        let Ok(order) = self.graph.toposort() else {
            return;
        };
        let stuck: Vec<TaskId> = order
            .into_iter()
            .filter(|id| self.graph.get(id).is_some_and(|n| !n.is_terminal()))
            .collect();

        for id in stuck {
            let blocker = self
                .graph
                .dependencies_of(&id)
                .iter()
                .find(|d| {
                    matches!(
                        self.graph.get(d).map(|n| n.status),
                        Some(TaskStatus::Failed) | Some(TaskStatus::Skipped)
                    )
                })
                .cloned();

            if let Some(node) = self.graph.get_mut(&id) {
                node.status = TaskStatus::Skipped;
                node.error = Some(match &blocker {
                    Some(dep) => format!("skipped due to failed dependency: {dep}"),
                    None => "skipped due to failed dependency".to_string(),
                });
                debug!(task = %id, blocker = ?blocker, "skipping task");
            }
        }
    }

    fn report(&self) -> ExecutionReport {
        let mut results = HashMap::with_capacity(self.graph.len());
        let mut all_success = true;

        for node in self.graph.tasks() {
            let outcome = match node.status {
                TaskStatus::Completed => OperationOutcome::Completed {
                    result: node.result.clone().unwrap_or(Value::Null),
                },
                TaskStatus::Failed => {
                    all_success = false;
                    OperationOutcome::Failed {
                        error: node.error.clone().unwrap_or_default(),
                    }
                }
                TaskStatus::Skipped => OperationOutcome::Skipped {
                    reason: node.error.clone().unwrap_or_default(),
                },
                // Unreachable after skip_unreachable, but stay total.
                _ => continue,
            };
            results.insert(node.id.clone(), outcome);
        }

        ExecutionReport {
            all_success,
            results,
        }
    }
}
