use super::LowerBound;
use crate::core::{
    find_root_nodes, find_satisfied_children, ProcessorAllocator, RunState, TaskGraph,
};

/// Tasks that became ready, one level per placed task.
/// The first level holds the root tasks.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frontier {
    levels: Vec<Vec<usize>>,
}

impl Frontier {
    /// Creates a frontier starting with the given ready tasks.
    #[must_use]
    pub fn new(roots: Vec<usize>) -> Self {
        Self {
            levels: vec![roots],
        }
    }

    /// Adds the tasks that became ready after the last placement.
    pub fn push(&mut self, level: Vec<usize>) {
        self.levels.push(level);
    }

    /// Removes the most recent level.
    pub fn pop(&mut self) -> Option<Vec<usize>> {
        self.levels.pop()
    }

    /// Returns the number of levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Returns the ready tasks that are not placed yet, oldest level first.
    #[must_use]
    pub fn ready(&self, state: &RunState) -> Vec<usize> {
        self.levels
            .iter()
            .flatten()
            .copied()
            .filter(|&task| !state.has_run(task))
            .collect()
    }
}

/// An independent starting point of the search: a partial schedule with its
/// allocator, frontier and lower bound. Owned exclusively by one worker.
#[derive(Clone, Debug)]
pub struct Subtree {
    pub state: RunState,
    pub allocator: ProcessorAllocator,
    pub frontier: Frontier,
    pub lower_bound: u64,
}

impl Subtree {
    /// Creates the subtree covering the whole search space.
    #[must_use]
    pub fn root(graph: &TaskGraph, processors: usize, bound: &LowerBound) -> Self {
        Self {
            state: RunState::new(graph),
            allocator: ProcessorAllocator::new(processors),
            frontier: Frontier::new(find_root_nodes(graph, graph.task_ids())),
            lower_bound: bound.initial(),
        }
    }

    /// Returns an independent copy of the subtree.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            state: self.state.fork(),
            allocator: self.allocator.clone(),
            frontier: self.frontier.clone(),
            lower_bound: self.lower_bound,
        }
    }

    /// Returns whether every task is placed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Creates one child subtree per legal placement of every ready task.
    /// The subtree itself is left unchanged.
    pub fn branch(&mut self, graph: &TaskGraph, bound: &LowerBound) -> Vec<Self> {
        let mut children = Vec::new();

        for task in self.frontier.ready(&self.state) {
            while let Some(placement) = self
                .allocator
                .allocate_processor(graph, &mut self.state, task)
            {
                let mut child = self.fork();
                child
                    .frontier
                    .push(find_satisfied_children(graph, &child.state, task));
                child.lower_bound =
                    bound.extend(self.lower_bound, task, placement, &child.allocator);
                children.push(child);

                self.allocator.release(graph, &mut self.state, task);
                self.state.check(task, placement.processor);
            }
            self.state.reset_checked(task);
        }

        children
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{diamond, Placement};

    #[test]
    fn frontier_should_skip_placed_tasks() {
        let graph = diamond();
        let mut state = RunState::new(&graph);
        let mut frontier = Frontier::new(vec![0]);

        state.assign(0, Placement::new(1, 0));
        frontier.push(vec![1, 2]);

        assert_eq!(frontier.ready(&state), vec![1, 2]);
        assert_eq!(frontier.depth(), 2);

        state.assign(2, Placement::new(1, 2));
        assert_eq!(frontier.ready(&state), vec![1]);

        assert_eq!(frontier.pop(), Some(vec![1, 2]));
        assert!(frontier.ready(&state).is_empty());
    }

    #[test]
    fn root_should_branch_on_first_idle_processor_only() {
        let graph = diamond();
        let bound = LowerBound::new(&graph, 3);
        let mut root = Subtree::root(&graph, 3, &bound);

        let children = root.branch(&graph, &bound);

        assert_eq!(children.len(), 1);
        assert_eq!(children[0].state.placement(0), Some(Placement::new(1, 0)));
        assert_eq!(children[0].frontier.ready(&children[0].state), vec![1, 2]);
        assert!(!root.state.has_run(0));
        assert!(root.state.checked(0).is_empty());
    }

    #[test]
    fn branch_should_cover_every_processor() {
        let graph = diamond();
        let bound = LowerBound::new(&graph, 2);
        let mut root = Subtree::root(&graph, 2, &bound);
        let mut first = root.branch(&graph, &bound).remove(0);

        let children = first.branch(&graph, &bound);
        let placements: Vec<_> = children
            .iter()
            .map(|child| {
                let task = child.state.order()[1];
                (task, child.state.placement(task))
            })
            .collect();

        assert_eq!(
            placements,
            vec![
                (1, Some(Placement::new(1, 2))),
                (1, Some(Placement::new(2, 3))),
                (2, Some(Placement::new(1, 2))),
                (2, Some(Placement::new(2, 4))),
            ]
        );
        assert!(children.iter().all(|child| child.lower_bound >= first.lower_bound));
    }
}
