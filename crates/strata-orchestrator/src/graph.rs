use crate::types::TaskSpec;
use std::collections::{HashMap, HashSet, VecDeque};
use strata_core::ValidationError;

/// Anything that can be validated as a node of a dependency graph.
///
/// Implemented for both submitted [`TaskSpec`]s and persisted
/// [`Task`](crate::types::Task)s so a topology can be rebuilt from a stored
/// record.
pub trait GraphNode {
    /// Unique id of the node within its workflow.
    fn node_id(&self) -> &str;
    /// Ids this node depends on.
    fn node_dependencies(&self) -> &[String];
}

impl GraphNode for TaskSpec {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_dependencies(&self) -> &[String] {
        &self.depends_on
    }
}

impl GraphNode for crate::types::Task {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_dependencies(&self) -> &[String] {
        &self.depends_on
    }
}

/// Validated dependency graph over dense task indices.
///
/// Index `i` is the task's position in the submitted list, so index order is
/// definition order. Ids are only used at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl Topology {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Tasks that depend directly on `idx`.
    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    /// Tasks `idx` depends on directly.
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.predecessors[idx]
    }

    /// One valid topological order (Kahn's, smallest index first).
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Topological order translated back to ids.
    pub fn ordered_ids(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.ids[i].as_str()).collect()
    }
}

/// Rejects structurally invalid task lists and builds a [`Topology`].
///
/// Checks run in a fixed order: empty list, duplicate ids, self-dependency,
/// unknown dependency, cycle. The first failing check is reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphValidator;

impl GraphValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate<N: GraphNode>(&self, tasks: &[N]) -> Result<Topology, ValidationError> {
        if tasks.is_empty() {
            return Err(ValidationError::Empty);
        }

        let mut index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.node_id().to_string(), i).is_some() {
                return Err(ValidationError::DuplicateId(task.node_id().to_string()));
            }
        }

        for task in tasks {
            if task.node_dependencies().iter().any(|d| d == task.node_id()) {
                return Err(ValidationError::SelfDependency(task.node_id().to_string()));
            }
        }

        let mut successors = vec![Vec::new(); tasks.len()];
        let mut predecessors = vec![Vec::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            let mut seen = HashSet::new();
            for dep in task.node_dependencies() {
                let &d = index.get(dep.as_str()).ok_or_else(|| {
                    ValidationError::UnknownDependency {
                        task: task.node_id().to_string(),
                        dependency: dep.clone(),
                    }
                })?;
                // Repeated entries in dependsOn collapse to one edge.
                if seen.insert(d) {
                    successors[d].push(i);
                    predecessors[i].push(d);
                }
            }
        }

        let order = kahn_order(&successors, &predecessors);
        if order.len() < tasks.len() {
            let placed: HashSet<usize> = order.iter().copied().collect();
            let stuck = (0..tasks.len())
                .filter(|i| !placed.contains(i))
                .map(|i| tasks[i].node_id().to_string())
                .collect();
            return Err(ValidationError::Cycle(stuck));
        }

        Ok(Topology {
            ids: tasks.iter().map(|t| t.node_id().to_string()).collect(),
            index,
            successors,
            predecessors,
            order,
        })
    }
}

/// Repeatedly removes zero in-degree nodes. Nodes left over sit on a cycle
/// or downstream of one.
fn kahn_order(successors: &[Vec<usize>], predecessors: &[Vec<usize>]) -> Vec<usize> {
    let mut indegree: Vec<usize> = predecessors.iter().map(Vec::len).collect();
    let mut queue: VecDeque<usize> = (0..indegree.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(indegree.len());

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &next in &successors[node] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    order
}
