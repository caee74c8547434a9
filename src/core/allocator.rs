use super::{Placement, ProcessorSet, RunState, TaskGraph};

/// Tasks placed on one processor, in start time order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct Timeline {
    tasks: Vec<usize>,
    free: u64,
    busy: u64,
}

/// Tracks which tasks run on which processor and computes earliest start times.
///
/// Tasks are always appended after the current finish time of a processor,
/// so gaps left on a processor stay idle for the rest of the branch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProcessorAllocator {
    timelines: Vec<Timeline>,
    idle: u64,
}

impl ProcessorAllocator {
    /// Creates an allocator for the given number of processors, numbered from 1.
    #[must_use]
    pub fn new(processors: usize) -> Self {
        Self {
            timelines: vec![Timeline::default(); processors],
            idle: 0,
        }
    }

    /// Returns the number of processors.
    #[must_use]
    pub fn processors(&self) -> usize {
        self.timelines.len()
    }

    fn timeline(&self, processor: usize) -> &Timeline {
        &self.timelines[processor - 1]
    }

    /// Returns whether nothing runs on the processor.
    #[must_use]
    pub fn is_idle(&self, processor: usize) -> bool {
        self.timeline(processor).tasks.is_empty()
    }

    /// Returns the time at which the processor finishes its last task.
    #[must_use]
    pub fn free_time(&self, processor: usize) -> u64 {
        self.timeline(processor).free
    }

    /// Returns the tasks placed on the processor in start time order.
    #[must_use]
    pub fn tasks(&self, processor: usize) -> &[usize] {
        &self.timeline(processor).tasks
    }

    /// Returns the idle time accumulated between tasks on all processors.
    #[must_use]
    pub const fn idle_time(&self) -> u64 {
        self.idle
    }

    /// Returns the finish time of the last task over all processors.
    #[must_use]
    pub fn makespan(&self) -> u64 {
        self.timelines
            .iter()
            .map(|timeline| timeline.free)
            .max()
            .unwrap_or_default()
    }

    /// Returns the earliest time the task can start on the processor.
    /// Dependencies on other processors delay the task by the communication cost.
    #[must_use]
    pub fn find_earliest_start_time(
        &self,
        graph: &TaskGraph,
        state: &RunState,
        task: usize,
        processor: usize,
    ) -> u64 {
        graph
            .incoming(task)
            .filter_map(|edge| {
                let placement = state.placement(edge.from)?;
                let finish = placement.start + graph.weight(edge.from);
                Some(finish + edge.cost(placement.processor, processor))
            })
            .fold(self.free_time(processor), u64::max)
    }

    /// Finds the placement with the earliest start time, skipping excluded processors.
    /// Only the first idle processor is considered, as idle processors are interchangeable.
    /// Ties are broken by the lowest processor number.
    #[must_use]
    pub fn best_placement(
        &self,
        graph: &TaskGraph,
        state: &RunState,
        task: usize,
        excluded: &ProcessorSet,
    ) -> Option<Placement> {
        let mut idle_seen = false;
        let mut best: Option<Placement> = None;

        for processor in 1..=self.processors() {
            if self.is_idle(processor) {
                if idle_seen {
                    continue;
                }
                idle_seen = true;
            }

            if excluded.contains(&processor) {
                continue;
            }

            let start = self.find_earliest_start_time(graph, state, task, processor);
            if best.map_or(true, |best| start < best.start) {
                best = Some(Placement::new(processor, start));
            }
        }

        best
    }

    /// Places the task on the best processor not yet checked for it.
    /// Returns `None` when every processor has been checked, leaving the task untouched.
    pub fn allocate_processor(
        &mut self,
        graph: &TaskGraph,
        state: &mut RunState,
        task: usize,
    ) -> Option<Placement> {
        let placement = self.best_placement(graph, state, task, state.checked(task))?;
        self.add_to_processor(graph, state, task, placement);
        Some(placement)
    }

    /// Places the task at the given position.
    /// The start must not be before the current finish time of the processor.
    pub fn add_to_processor(
        &mut self,
        graph: &TaskGraph,
        state: &mut RunState,
        task: usize,
        placement: Placement,
    ) {
        let weight = graph.weight(task);
        let timeline = &mut self.timelines[placement.processor - 1];

        debug_assert!(placement.start >= timeline.free, "task {task} overlaps its processor");

        self.idle += placement.start.saturating_sub(timeline.free);
        timeline.tasks.push(task);
        timeline.free = placement.start + weight;
        timeline.busy += weight;

        state.assign(task, placement);
    }

    /// Removes the task, which must be the last one placed on its processor.
    /// Returns the placement the task had.
    pub fn release(
        &mut self,
        graph: &TaskGraph,
        state: &mut RunState,
        task: usize,
    ) -> Option<Placement> {
        let placement = state.unassign(task)?;
        let timeline = &mut self.timelines[placement.processor - 1];

        debug_assert_eq!(timeline.tasks.last(), Some(&task));
        timeline.tasks.pop();
        timeline.busy -= graph.weight(task);
        timeline.free = timeline
            .tasks
            .last()
            .and_then(|&last| state.finish_time(graph, last))
            .unwrap_or_default();
        self.idle -= placement.start - timeline.free;

        Some(placement)
    }
}
