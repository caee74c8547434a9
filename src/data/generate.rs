use crate::core::{Edge, Error, Task, TaskGraph};
use rand::Rng;

/// Parameters of a randomly generated task graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphShape {
    /// The number of tasks.
    pub tasks: usize,
    /// The maximum weight of a task. Weights are drawn from `1..=max_weight`.
    pub max_weight: u64,
    /// The maximum communication cost of an edge. Costs are drawn from `0..=max_communication`.
    pub max_communication: u64,
    /// Probability that a task depends on any given earlier task.
    pub density: f64,
}

impl Default for GraphShape {
    fn default() -> Self {
        Self {
            tasks: 10,
            max_weight: 10,
            max_communication: 5,
            density: 0.3,
        }
    }
}

/// Generates a random acyclic task graph.
/// Edges only go from a task to a task with a higher index.
///
/// # Errors
/// - If the generated graph is rejected, which does not happen for valid shapes.
pub fn generate(shape: &GraphShape, rng: &mut impl Rng) -> Result<TaskGraph, Error> {
    let density = shape.density.clamp(0.0, 1.0);
    let max_weight = shape.max_weight.max(1);

    let tasks = (0..shape.tasks)
        .map(|i| Task::new(format!("t{i}"), rng.gen_range(1..=max_weight)))
        .collect();

    let mut edges = Vec::new();
    for to in 0..shape.tasks {
        for from in 0..to {
            if rng.gen_bool(density) {
                edges.push(Edge::new(from, to, rng.gen_range(0..=shape.max_communication)));
            }
        }
    }

    TaskGraph::new(tasks, edges)
}
