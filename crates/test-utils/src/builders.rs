#![allow(dead_code)]

use serde_json::{json, Value};
use workdag::graph::{TaskAttrs, TaskGraph};

/// Builder for `TaskAttrs` to simplify test setup.
pub struct TaskAttrsBuilder {
    attrs: TaskAttrs,
}

impl TaskAttrsBuilder {
    pub fn new(kind: &str) -> Self {
        Self {
            attrs: TaskAttrs {
                kind: kind.to_string(),
                ..TaskAttrs::default()
            },
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.attrs.payload = payload;
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.attrs.priority = priority;
        self
    }

    pub fn parallel_group(mut self, group: &str) -> Self {
        self.attrs.parallel_group = Some(group.to_string());
        self
    }

    pub fn conflicts_with(mut self, other: &str) -> Self {
        self.attrs.conflicts_with.insert(other.to_string());
        self
    }

    pub fn estimated_tokens(mut self, tokens: u64) -> Self {
        self.attrs.estimated_tokens = tokens;
        self
    }

    pub fn estimated_cost(mut self, cost: f64) -> Self {
        self.attrs.estimated_cost = cost;
        self
    }

    pub fn build(self) -> TaskAttrs {
        self.attrs
    }
}

/// Builder for a `TaskGraph`. Tasks get a default payload naming the task,
/// so executors in tests can tell results apart.
pub struct GraphBuilder {
    graph: TaskGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: TaskGraph::new(),
        }
    }

    pub fn task(mut self, id: &str, depends_on: &[&str]) -> Self {
        let deps = depends_on.iter().map(|d| d.to_string()).collect();
        let attrs = TaskAttrsBuilder::new("test")
            .payload(json!({ "task": id }))
            .build();
        self.graph
            .add_task(id.to_string(), deps, attrs)
            .expect("duplicate task id in test graph");
        self
    }

    pub fn task_with(mut self, id: &str, depends_on: &[&str], attrs: TaskAttrs) -> Self {
        let deps = depends_on.iter().map(|d| d.to_string()).collect();
        self.graph
            .add_task(id.to_string(), deps, attrs)
            .expect("duplicate task id in test graph");
        self
    }

    pub fn build(self) -> TaskGraph {
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
