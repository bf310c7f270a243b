use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use serde_json::json;
use workdag::sched::{Operation, OperationExecutor, OperationFuture};

/// A fake executor that:
/// - records which operations were "run" (in start order)
/// - succeeds with a small JSON result, except for ids it was told to fail.
///
/// An optional per-operation delay keeps operations of one wave overlapping,
/// so concurrency assertions have something to observe.
pub struct FakeExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    fail_ids: HashSet<String>,
    delay: Option<Duration>,
}

impl FakeExecutor {
    pub fn new(executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            executed,
            fail_ids: HashSet::new(),
            delay: None,
        }
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.fail_ids.insert(id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl OperationExecutor for FakeExecutor {
    fn execute(&self, operation: Operation) -> OperationFuture {
        let executed = Arc::clone(&self.executed);
        let should_fail = self.fail_ids.contains(&operation.id);
        let delay = self.delay;

        Box::pin(async move {
            {
                let mut guard = executed.lock().unwrap();
                guard.push(operation.id.clone());
            }
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if should_fail {
                Err(anyhow!("induced failure in {}", operation.id))
            } else {
                Ok(json!({ "ran": operation.id }))
            }
        })
    }
}

/// Executor that tracks how many operations are in flight at once and the
/// maximum ever observed, for asserting concurrency caps.
pub struct ConcurrencyProbe {
    in_flight: Arc<Mutex<usize>>,
    max_seen: Arc<Mutex<usize>>,
    hold: Duration,
}

impl ConcurrencyProbe {
    pub fn new(hold: Duration) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(0)),
            max_seen: Arc::new(Mutex::new(0)),
            hold,
        }
    }

    pub fn max_seen(&self) -> usize {
        *self.max_seen.lock().unwrap()
    }
}

impl OperationExecutor for ConcurrencyProbe {
    fn execute(&self, operation: Operation) -> OperationFuture {
        let in_flight = Arc::clone(&self.in_flight);
        let max_seen = Arc::clone(&self.max_seen);
        let hold = self.hold;

        Box::pin(async move {
            {
                let mut current = in_flight.lock().unwrap();
                *current += 1;
                let mut max = max_seen.lock().unwrap();
                *max = (*max).max(*current);
            }

            tokio::time::sleep(hold).await;

            {
                let mut current = in_flight.lock().unwrap();
                *current -= 1;
            }
            Ok(json!({ "ran": operation.id }))
        })
    }
}
