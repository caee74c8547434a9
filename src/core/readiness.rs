use super::{RunState, TaskGraph};

/// Returns, in input order, the tasks that have no dependencies.
#[must_use]
pub fn find_root_nodes(graph: &TaskGraph, nodes: impl IntoIterator<Item = usize>) -> Vec<usize> {
    nodes
        .into_iter()
        .filter(|&task| graph.incoming(task).next().is_none())
        .collect()
}

/// Returns whether every dependency of the task has run.
#[must_use]
pub fn is_satisfied(graph: &TaskGraph, state: &RunState, task: usize) -> bool {
    graph.dependencies(task).all(|dependency| state.has_run(dependency))
}

/// Returns the dependents of the task whose dependencies have all run.
/// Used right after placing a task to discover newly ready tasks.
#[must_use]
pub fn find_satisfied_children(graph: &TaskGraph, state: &RunState, task: usize) -> Vec<usize> {
    let mut children = Vec::new();
    for child in graph.dependents(task) {
        if !state.has_run(child) && !children.contains(&child) && is_satisfied(graph, state, child)
        {
            children.push(child);
        }
    }
    children
}

/// Returns, in input order, the tasks that have not run but whose dependencies have.
#[must_use]
pub fn find_satisfied_nodes(
    graph: &TaskGraph,
    state: &RunState,
    nodes: impl IntoIterator<Item = usize>,
) -> Vec<usize> {
    nodes
        .into_iter()
        .filter(|&task| !state.has_run(task) && is_satisfied(graph, state, task))
        .collect()
}
