use super::TaskGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of processor numbers.
pub type ProcessorSet = BTreeSet<usize>;

/// Where and when a task runs. Processors are numbered from 1.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Serialize, PartialEq)]
pub struct Placement {
    pub processor: usize,
    pub start: u64,
}

impl Placement {
    /// Creates a new placement.
    #[must_use]
    pub const fn new(processor: usize, start: u64) -> Self {
        Self { processor, start }
    }
}

/// Search state of a single task.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeState {
    /// Placement of the task, present only when the task has run.
    pub placement: Option<Placement>,
    /// Processors already explored for this task at the current search position.
    pub checked: ProcessorSet,
}

/// Run state of every task of a graph on one search branch.
/// The assignment order is the path from the search root to the current position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunState {
    nodes: Vec<NodeState>,
    order: Vec<usize>,
}

impl RunState {
    /// Creates a state where no task has run.
    #[must_use]
    pub fn new(graph: &TaskGraph) -> Self {
        Self {
            nodes: vec![NodeState::default(); graph.len()],
            order: Vec::with_capacity(graph.len()),
        }
    }

    /// Returns an independent copy for a new search branch.
    /// Placed tasks keep their run state, all other tasks are reset.
    #[must_use]
    pub fn fork(&self) -> Self {
        let nodes = self
            .nodes
            .iter()
            .map(|node| match node.placement {
                Some(_) => node.clone(),
                None => NodeState::default(),
            })
            .collect();
        Self {
            nodes,
            order: self.order.clone(),
        }
    }

    /// Returns whether the task has run.
    #[must_use]
    pub fn has_run(&self, task: usize) -> bool {
        self.nodes[task].placement.is_some()
    }

    /// Returns the placement of the task.
    #[must_use]
    pub fn placement(&self, task: usize) -> Option<Placement> {
        self.nodes[task].placement
    }

    /// Returns the finish time of the task if it has run.
    #[must_use]
    pub fn finish_time(&self, graph: &TaskGraph, task: usize) -> Option<u64> {
        self.placement(task)
            .map(|placement| placement.start + graph.weight(task))
    }

    /// Returns the processors already explored for the task.
    #[must_use]
    pub fn checked(&self, task: usize) -> &ProcessorSet {
        &self.nodes[task].checked
    }

    /// Marks the processor as explored for the task.
    pub fn check(&mut self, task: usize, processor: usize) {
        self.nodes[task].checked.insert(processor);
    }

    /// Forgets all explored processors of the task.
    pub fn reset_checked(&mut self, task: usize) {
        self.nodes[task].checked.clear();
    }

    /// Places the task. The task must not have run yet.
    pub fn assign(&mut self, task: usize, placement: Placement) {
        debug_assert!(!self.has_run(task), "task {task} is already placed");
        self.nodes[task].placement = Some(placement);
        self.order.push(task);
    }

    /// Removes the placement of the most recently placed task and returns it.
    pub fn unassign(&mut self, task: usize) -> Option<Placement> {
        debug_assert_eq!(self.order.last(), Some(&task), "tasks must be removed in reverse order");
        if self.order.last() == Some(&task) {
            self.order.pop();
        }
        self.nodes[task].placement.take()
    }

    /// Returns the placed tasks in assignment order.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Returns the number of placed tasks.
    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.order.len()
    }

    /// Returns whether every task has run.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.order.len() == self.nodes.len()
    }
}
