use super::{Placement, RunState, TaskGraph};
use serde::{Deserialize, Serialize};

/// A task with its final placement.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Serialize, PartialEq)]
pub struct ScheduledTask {
    pub task: usize,
    pub processor: usize,
    pub start: u64,
}

/// A complete or partial schedule: placed tasks in the order they were assigned.
#[derive(Clone, Debug, Default, Deserialize, Eq, Serialize, PartialEq)]
pub struct Schedule {
    tasks: Vec<ScheduledTask>,
    makespan: u64,
}

impl Schedule {
    /// Collects the placed tasks of a search branch.
    #[must_use]
    pub fn from_state(graph: &TaskGraph, state: &RunState) -> Self {
        let tasks: Vec<_> = state
            .order()
            .iter()
            .filter_map(|&task| {
                state.placement(task).map(|placement| ScheduledTask {
                    task,
                    processor: placement.processor,
                    start: placement.start,
                })
            })
            .collect();
        let makespan = tasks
            .iter()
            .map(|entry| entry.start + graph.weight(entry.task))
            .max()
            .unwrap_or_default();
        Self { tasks, makespan }
    }

    /// Returns the placed tasks in assignment order.
    #[must_use]
    pub fn entries(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Returns the number of placed tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns whether no task is placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the finish time of the last task.
    #[must_use]
    pub const fn makespan(&self) -> u64 {
        self.makespan
    }

    /// Returns the placement of the given task.
    #[must_use]
    pub fn placement(&self, task: usize) -> Option<Placement> {
        self.tasks
            .iter()
            .find(|entry| entry.task == task)
            .map(|entry| Placement::new(entry.processor, entry.start))
    }

    /// Checks whether the schedule is a valid complete schedule of the graph:
    /// - every task is placed exactly once on an existing processor,
    /// - every task starts after its dependencies finished, plus communication,
    /// - tasks on the same processor do not overlap.
    #[must_use]
    pub fn verify(&self, graph: &TaskGraph, processors: usize) -> bool {
        let mut placements = vec![None; graph.len()];
        for entry in &self.tasks {
            if entry.task >= graph.len()
                || !(1..=processors).contains(&entry.processor)
                || placements[entry.task].is_some()
            {
                return false;
            }
            placements[entry.task] = Some(Placement::new(entry.processor, entry.start));
        }

        let Some(placements): Option<Vec<_>> = placements.into_iter().collect() else {
            return false;
        };

        let precedence = graph.edges().iter().all(|edge| {
            let from = placements[edge.from];
            let to = placements[edge.to];
            from.start + graph.weight(edge.from) + edge.cost(from.processor, to.processor)
                <= to.start
        });

        let mut runs: Vec<_> = graph
            .task_ids()
            .map(|task| (placements[task].processor, placements[task].start, task))
            .collect();
        runs.sort_unstable();
        let disjoint = runs.windows(2).all(|pair| {
            let (processor, start, task) = pair[0];
            processor != pair[1].0 || start + graph.weight(task) <= pair[1].1
        });

        let makespan = graph
            .task_ids()
            .map(|task| placements[task].start + graph.weight(task))
            .max()
            .unwrap_or_default();

        precedence && disjoint && makespan == self.makespan
    }
}
