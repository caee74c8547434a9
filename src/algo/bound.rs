use crate::cast_u64;
use crate::core::{Placement, ProcessorAllocator, TaskGraph};
use std::collections::VecDeque;

/// Admissible lower bound on the makespan reachable from a partial schedule.
///
/// It is the maximum of:
/// - the start of a placed task plus the longest chain of work depending on it,
/// - the total work plus the idle time already lost, spread over all processors.
///
/// Both parts only grow while tasks are placed, so the bound never decreases
/// along a search path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LowerBound {
    bottom_levels: Vec<u64>,
    total_weight: u64,
    processors: u64,
}

impl LowerBound {
    /// Precomputes the bottom levels of the graph for the given number of processors.
    #[must_use]
    pub fn new(graph: &TaskGraph, processors: usize) -> Self {
        Self {
            bottom_levels: bottom_levels(graph),
            total_weight: graph.total_weight(),
            processors: cast_u64(processors.max(1)),
        }
    }

    /// Returns the longest chain of task weights starting with the given task.
    #[must_use]
    pub fn bottom_level(&self, task: usize) -> u64 {
        self.bottom_levels[task]
    }

    /// Returns the bound of the empty schedule.
    #[must_use]
    pub fn initial(&self) -> u64 {
        let critical_path = self.bottom_levels.iter().copied().max().unwrap_or_default();
        critical_path.max(self.total_weight.div_ceil(self.processors))
    }

    /// Returns the bound after `task` was placed on top of a schedule bounded by `parent`.
    #[must_use]
    pub fn extend(
        &self,
        parent: u64,
        task: usize,
        placement: Placement,
        allocator: &ProcessorAllocator,
    ) -> u64 {
        let path = placement.start.saturating_add(self.bottom_levels[task]);
        let load = self
            .total_weight
            .saturating_add(allocator.idle_time())
            .div_ceil(self.processors);
        parent.max(path).max(load)
    }
}

/// Computes the longest weight-only path from every task to a sink, in reverse topological order.
/// Tasks on a cycle keep their own weight.
fn bottom_levels(graph: &TaskGraph) -> Vec<u64> {
    let mut levels: Vec<_> = graph.tasks().iter().map(|task| task.weight).collect();
    let mut remaining: Vec<_> = graph
        .task_ids()
        .map(|task| graph.outgoing(task).count())
        .collect();
    let mut queue: VecDeque<_> = graph.task_ids().filter(|&task| remaining[task] == 0).collect();

    while let Some(task) = queue.pop_front() {
        for dependency in graph.dependencies(task) {
            levels[dependency] = levels[dependency].max(graph.weight(dependency) + levels[task]);
            remaining[dependency] -= 1;
            if remaining[dependency] == 0 {
                queue.push_back(dependency);
            }
        }
    }

    levels
}
