// src/graph/task_graph.rs

//! In-memory dependency graph keyed by task id.
//!
//! Pure structure and algorithms: insertion, cycle detection (DFS),
//! topological ordering and layering (Kahn's algorithm), readiness queries,
//! priority ordering and conflict queries. Execution state transitions are
//! driven by the schedulers in [`crate::sched`].
//!
//! Validation is lazy here: a task may list a dependency that has not been
//! added yet, and `toposort`/`execution_order` simply ignore edges whose
//! source is absent. [`crate::sched::DagScheduler`] validates eagerly before
//! any work starts.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::errors::{Result, WorkdagError};
use crate::graph::node::{TaskAttrs, TaskId, TaskNode, TaskStatus};

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: HashMap<TaskId, TaskNode>,
    /// Reverse adjacency: dependency id -> ids of tasks depending on it.
    /// Keys may reference tasks that have not been added (dangling edges).
    dependents: HashMap<TaskId, Vec<TaskId>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Dependency ids may reference tasks added later.
    pub fn add_task(
        &mut self,
        id: impl Into<TaskId>,
        depends_on: Vec<TaskId>,
        attrs: TaskAttrs,
    ) -> Result<()> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(WorkdagError::DuplicateTask(id));
        }

        for dep in &depends_on {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .push(id.clone());
        }

        debug!(task = %id, deps = depends_on.len(), "adding task to graph");
        self.nodes
            .insert(id.clone(), TaskNode::new(id, depends_on, attrs));
        Ok(())
    }

    /// Add edge `before -> after` ("after depends on before").
    ///
    /// `after` must already exist; `before` may dangle until added.
    pub fn add_dependency(&mut self, before: &str, after: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(after)
            .ok_or_else(|| WorkdagError::TaskNotFound(after.to_string()))?;

        if node.depends_on.iter().any(|d| d == before) {
            return Ok(());
        }
        node.depends_on.push(before.to_string());
        self.dependents
            .entry(before.to_string())
            .or_default()
            .push(after.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut TaskNode> {
        self.nodes.get_mut(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    /// Immediate dependencies of a task (only ids, possibly dangling).
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.dependents
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Snapshot of every node's status, for diagnostics and reporting.
    pub fn statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.nodes
            .iter()
            .map(|(id, n)| (id.clone(), n.status))
            .collect()
    }

    /// Total order consistent with dependencies (Kahn's algorithm).
    ///
    /// Fails with a cycle error naming participating nodes if the graph is
    /// not acyclic. Output is deterministic: ties are broken by task id.
    pub fn toposort(&self) -> Result<Vec<TaskId>> {
        let mut in_degree = self.present_in_degrees();

        // Lexicographic frontier keeps the order stable across runs.
        let mut frontier: BTreeSet<TaskId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| id.clone())
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = frontier.pop_first() {
            order.push(id.clone());
            for dependent in self.dependents_of(&id) {
                if let Some(d) = in_degree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        frontier.insert(dependent.clone());
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(self.cycle_error());
        }
        Ok(order)
    }

    /// Ids whose dependencies are all in `completed` and that are not
    /// themselves completed. Sorted by id for determinism.
    pub fn ready_tasks(&self, completed: &HashSet<TaskId>) -> Vec<TaskId> {
        let mut ready: Vec<TaskId> = self
            .nodes
            .values()
            .filter(|n| !completed.contains(&n.id))
            .filter(|n| n.depends_on.iter().all(|d| completed.contains(d)))
            .map(|n| n.id.clone())
            .collect();
        ready.sort();
        ready
    }

    /// Topological generations: layer i's nodes have every dependency in
    /// layers < i, and no path exists between nodes of the same layer.
    ///
    /// Fails with a cycle error if the graph is not acyclic.
    pub fn execution_order(&self) -> Result<Vec<Vec<TaskId>>> {
        let mut in_degree = self.present_in_degrees();

        let mut current: Vec<TaskId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| id.clone())
            .collect();
        current.sort();

        let mut layers = Vec::new();
        let mut seen = 0usize;

        while !current.is_empty() {
            seen += current.len();
            let mut next = Vec::new();
            for id in &current {
                for dependent in self.dependents_of(id) {
                    if let Some(d) = in_degree.get_mut(dependent) {
                        *d -= 1;
                        if *d == 0 {
                            next.push(dependent.clone());
                        }
                    }
                }
            }
            next.sort();
            layers.push(std::mem::take(&mut current));
            current = next;
        }

        if seen != self.nodes.len() {
            return Err(self.cycle_error());
        }
        Ok(layers)
    }

    /// Partition one layer by parallelism-group tag.
    ///
    /// Tasks sharing a tag land in one group; untagged tasks each form a
    /// singleton group. Groups are ordered by tag, then by id.
    pub fn parallelizable_tasks(&self, layer: &[TaskId]) -> Vec<Vec<TaskId>> {
        // Key tags and singleton ids separately so a task id can never
        // collide with a group tag.
        let mut groups: BTreeMap<(u8, String), Vec<TaskId>> = BTreeMap::new();

        for id in layer {
            let Some(node) = self.nodes.get(id) else {
                warn!(task = %id, "unknown task in layer; skipping");
                continue;
            };
            let key = match &node.parallel_group {
                Some(tag) => (0, tag.clone()),
                None => (1, id.clone()),
            };
            groups.entry(key).or_default().push(id.clone());
        }

        groups.into_values().collect()
    }

    /// Sort ids descending by numeric priority, stable on ties.
    ///
    /// Unknown ids are dropped with a warning.
    pub fn sort_by_priority(&self, ids: &[TaskId]) -> Vec<TaskId> {
        let mut known: Vec<TaskId> = ids
            .iter()
            .filter(|id| {
                let present = self.nodes.contains_key(*id);
                if !present {
                    warn!(task = %id, "unknown task in priority sort; dropping");
                }
                present
            })
            .cloned()
            .collect();

        known.sort_by_key(|id| std::cmp::Reverse(self.nodes[id].priority));
        known
    }

    /// Whether co-scheduling `id` with `running` would violate a declared
    /// conflict. Conflicts are treated as symmetric: either side declaring
    /// the pair blocks it.
    pub fn check_conflicts(&self, id: &str, running: &[TaskId]) -> bool {
        let declared = self
            .nodes
            .get(id)
            .map(|n| &n.conflicts_with)
            .is_some_and(|set| running.iter().any(|r| set.contains(r)));
        if declared {
            return true;
        }

        running.iter().any(|r| {
            self.nodes
                .get(r)
                .is_some_and(|n| n.conflicts_with.contains(id))
        })
    }

    /// In-degree per node, counting only dependencies present in the graph.
    fn present_in_degrees(&self) -> HashMap<TaskId, usize> {
        self.nodes
            .values()
            .map(|n| {
                let degree = n
                    .depends_on
                    .iter()
                    .filter(|d| self.nodes.contains_key(*d))
                    .count();
                (n.id.clone(), degree)
            })
            .collect()
    }

    /// Build a cycle error naming an actual cycle path.
    fn cycle_error(&self) -> WorkdagError {
        let path = self.find_cycle().unwrap_or_default();
        if path.is_empty() {
            // Kahn said cycle but DFS found none; should not happen.
            return WorkdagError::Cycle("unidentified cycle".to_string());
        }
        let mut named = path.join(" -> ");
        named.push_str(" -> ");
        named.push_str(&path[0]);
        WorkdagError::Cycle(named)
    }

    /// Find one cycle via iterative DFS, if any exists.
    fn find_cycle(&self) -> Option<Vec<TaskId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InStack,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut roots: Vec<&str> = self.nodes.keys().map(|s| s.as_str()).collect();
        roots.sort();

        for root in roots {
            if marks.contains_key(root) {
                continue;
            }

            // Stack of (node, next dependency index to visit).
            let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
            marks.insert(root, Mark::InStack);

            while let Some((id, idx)) = stack.last().copied() {
                let deps = self.dependencies_of(id);
                match deps.get(idx) {
                    None => {
                        marks.insert(id, Mark::Done);
                        stack.pop();
                    }
                    Some(dep) => {
                        stack.last_mut().expect("stack non-empty").1 += 1;
                        let dep = dep.as_str();
                        if !self.nodes.contains_key(dep) {
                            continue; // dangling edge
                        }
                        match marks.get(dep) {
                            Some(Mark::InStack) => {
                                // Found a back edge; the cycle is the stack
                                // suffix starting at `dep`.
                                let start = stack
                                    .iter()
                                    .position(|(n, _)| *n == dep)
                                    .expect("back edge target on stack");
                                return Some(
                                    stack[start..]
                                        .iter()
                                        .map(|(n, _)| n.to_string())
                                        .collect(),
                                );
                            }
                            Some(Mark::Done) => {}
                            None => {
                                marks.insert(dep, Mark::InStack);
                                stack.push((dep, 0));
                            }
                        }
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> TaskGraph {
        let mut g = TaskGraph::new();
        for (id, deps) in edges {
            let deps = deps.iter().map(|d| d.to_string()).collect();
            g.add_task(*id, deps, TaskAttrs::default()).unwrap();
        }
        g
    }

    #[test]
    fn toposort_respects_dependencies() {
        let g = graph(&[("c", &["a", "b"]), ("a", &[]), ("b", &["a"])]);
        let order = g.toposort().unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn toposort_reports_cycle_participants() {
        let g = graph(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"])]);
        let err = g.toposort().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Cycle"), "unexpected error: {msg}");
        // All three nodes participate in the cycle.
        for id in ["a", "b", "c"] {
            assert!(msg.contains(id), "cycle message missing '{id}': {msg}");
        }
    }

    #[test]
    fn toposort_ignores_dangling_dependencies() {
        let g = graph(&[("a", &["ghost"]), ("b", &["a"])]);
        let order = g.toposort().unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_task_is_rejected() {
        let mut g = graph(&[("a", &[])]);
        let err = g
            .add_task("a", Vec::new(), TaskAttrs::default())
            .unwrap_err();
        assert!(matches!(err, WorkdagError::DuplicateTask(_)));
    }

    #[test]
    fn add_dependency_requires_existing_dependent() {
        let mut g = graph(&[("a", &[])]);
        assert!(matches!(
            g.add_dependency("a", "missing"),
            Err(WorkdagError::TaskNotFound(_))
        ));

        g.add_task("b", Vec::new(), TaskAttrs::default()).unwrap();
        g.add_dependency("a", "b").unwrap();
        // Deduplicated on repeat.
        g.add_dependency("a", "b").unwrap();
        assert_eq!(g.dependencies_of("b"), ["a".to_string()]);
        assert_eq!(g.dependents_of("a"), ["b".to_string()]);
    }

    #[test]
    fn ready_tasks_requires_all_dependencies_completed() {
        let g = graph(&[("a", &[]), ("b", &[]), ("c", &["a", "b"])]);

        let none = HashSet::new();
        assert_eq!(g.ready_tasks(&none), vec!["a", "b"]);

        let mut done: HashSet<TaskId> = HashSet::new();
        done.insert("a".to_string());
        assert_eq!(g.ready_tasks(&done), vec!["b"]);

        done.insert("b".to_string());
        assert_eq!(g.ready_tasks(&done), vec!["c"]);
    }

    #[test]
    fn execution_order_layers() {
        let g = graph(&[("a", &[]), ("b", &[]), ("c", &["a", "b"]), ("d", &["c"])]);
        let layers = g.execution_order().unwrap();
        assert_eq!(
            layers,
            vec![vec!["a", "b"], vec!["c"], vec!["d"]]
                .into_iter()
                .map(|l: Vec<&str>| l.into_iter().map(String::from).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn parallelizable_tasks_partitions_by_group() {
        let mut g = TaskGraph::new();
        for (id, group) in [
            ("a", Some("ingest")),
            ("b", Some("ingest")),
            ("c", None),
            ("d", Some("report")),
        ] {
            let attrs = TaskAttrs {
                parallel_group: group.map(String::from),
                ..TaskAttrs::default()
            };
            g.add_task(id, Vec::new(), attrs).unwrap();
        }

        let layer: Vec<TaskId> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let groups = g.parallelizable_tasks(&layer);
        assert_eq!(
            groups,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["d".to_string()],
                vec!["c".to_string()],
            ]
        );
    }

    #[test]
    fn sort_by_priority_is_stable_descending() {
        let mut g = TaskGraph::new();
        for (id, priority) in [("a", 1), ("b", 5), ("c", 1), ("d", 3)] {
            let attrs = TaskAttrs {
                priority,
                ..TaskAttrs::default()
            };
            g.add_task(id, Vec::new(), attrs).unwrap();
        }

        let ids: Vec<TaskId> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(g.sort_by_priority(&ids), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn conflicts_are_symmetric() {
        let mut g = TaskGraph::new();
        let attrs = TaskAttrs {
            conflicts_with: ["b".to_string()].into_iter().collect(),
            ..TaskAttrs::default()
        };
        g.add_task("a", Vec::new(), attrs).unwrap();
        g.add_task("b", Vec::new(), TaskAttrs::default()).unwrap();
        g.add_task("c", Vec::new(), TaskAttrs::default()).unwrap();

        // "a" declares the conflict; both directions are blocked.
        assert!(g.check_conflicts("a", &["b".to_string()]));
        assert!(g.check_conflicts("b", &["a".to_string()]));
        assert!(!g.check_conflicts("c", &["a".to_string(), "b".to_string()]));
    }
}
