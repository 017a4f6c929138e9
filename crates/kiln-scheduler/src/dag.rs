//! DAG resolution for build tasks.
//!
//! Tasks are peeled off the graph in levels: every task whose dependencies
//! are all placed joins the next layer. A task therefore lands in layer
//! `1 + max(layer of its dependencies)`, or layer 0 when it has none.

use kiln_core::task::Task;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DagError {
    #[error("Dependency '{dependency}' for task '{task}' not found")]
    UnknownDependency { task: String, dependency: String },
    #[error("Cyclic dependency detected among tasks: {}", .remaining.join(", "))]
    CyclicDependency { remaining: Vec<String> },
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),
    #[error("Empty build configuration")]
    EmptyBuild,
}

/// Ordered layers of task ids. Tasks in one layer are mutually independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExecutionPlan {
    layers: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of tasks across all layers.
    pub fn task_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Index of the layer holding `task_id`.
    pub fn layer_of(&self, task_id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|id| id == task_id))
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str("[")?;
            for (j, id) in layer.iter().enumerate() {
                if j > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{:?}", id)?;
            }
            f.write_str("]")?;
        }
        f.write_str("]")
    }
}

/// Directed graph of tasks; an edge runs from a dependency to its dependent.
#[derive(Debug)]
pub struct TaskGraph {
    graph: DiGraph<Task, ()>,
    id_to_index: HashMap<String, NodeIndex>,
}

impl TaskGraph {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.id_to_index
            .get(task_id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Partition the graph into execution layers.
    ///
    /// Layer order follows first-seen order: the initial layer keeps input
    /// order, later layers keep the order in which tasks became ready.
    pub fn layers(&self) -> Result<ExecutionPlan, DagError> {
        let count = self.graph.node_count();
        let mut in_degree = vec![0usize; count];
        let mut dependents: Vec<Vec<NodeIndex>> = vec![Vec::new(); count];

        // raw_edges() yields edges in insertion order, which keeps layers deterministic.
        for edge in self.graph.raw_edges() {
            in_degree[edge.target().index()] += 1;
            dependents[edge.source().index()].push(edge.target());
        }

        let mut frontier: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        let mut layers = Vec::new();
        let mut placed = 0usize;

        while !frontier.is_empty() {
            let mut next = Vec::new();
            let mut layer = Vec::with_capacity(frontier.len());

            for &idx in &frontier {
                layer.push(self.graph[idx].id.clone());
                placed += 1;

                for &dependent in &dependents[idx.index()] {
                    let degree = &mut in_degree[dependent.index()];
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(dependent);
                    }
                }
            }

            layers.push(layer);
            frontier = next;
        }

        if placed < count {
            let remaining = self
                .graph
                .node_indices()
                .filter(|idx| in_degree[idx.index()] > 0)
                .map(|idx| self.graph[idx].id.clone())
                .collect();
            return Err(DagError::CyclicDependency { remaining });
        }

        Ok(ExecutionPlan { layers })
    }
}

/// Builder for constructing task graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DagBuilder;

impl DagBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a graph from a flat task list.
    pub fn build(&self, tasks: &[Task]) -> Result<TaskGraph, DagError> {
        if tasks.is_empty() {
            return Err(DagError::EmptyBuild);
        }

        let mut graph = DiGraph::with_capacity(tasks.len(), tasks.len());
        let mut id_to_index = HashMap::with_capacity(tasks.len());

        for task in tasks {
            if id_to_index.contains_key(&task.id) {
                return Err(DagError::DuplicateTask(task.id.clone()));
            }
            let idx = graph.add_node(task.clone());
            id_to_index.insert(task.id.clone(), idx);
        }

        for task in tasks {
            let task_idx = id_to_index[&task.id];
            let mut seen = HashSet::new();
            for dep in &task.dependencies {
                if !seen.insert(dep.as_str()) {
                    continue;
                }
                let dep_idx =
                    id_to_index
                        .get(dep)
                        .ok_or_else(|| DagError::UnknownDependency {
                            task: task.id.clone(),
                            dependency: dep.clone(),
                        })?;
                graph.add_edge(*dep_idx, task_idx, ());
            }
        }

        Ok(TaskGraph { graph, id_to_index })
    }

    /// Validate `tasks` and derive their execution layers.
    pub fn plan(&self, tasks: &[Task]) -> Result<ExecutionPlan, DagError> {
        self.build(tasks)?.layers()
    }
}
