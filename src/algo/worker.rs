use super::{LowerBound, Subtree};
use crate::core::{find_satisfied_children, Schedule, TaskGraph};
use log::{trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;

/// Message sent by a search worker to the coordinator.
#[derive(Debug)]
pub enum Report {
    /// A complete schedule better than anything the worker found before.
    Complete(Schedule),
    /// The worker explored its whole subtree.
    Finished { index: usize, stats: WorkerStats },
    /// The worker panicked.
    Failed { index: usize, message: String },
}

/// Counters of a finished search worker.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WorkerStats {
    /// Number of search states entered.
    pub visited: u64,
    /// Number of placements cut off by the bound.
    pub pruned: u64,
    /// Number of complete schedules reported.
    pub reported: u64,
    /// Largest number of tasks placed at once.
    pub deepest: usize,
}

/// Depth-first branch-and-bound search over one subtree.
///
/// The worker owns its subtree exclusively. Complete schedules are sent to the
/// coordinator, which alone decides on the global best. The worker keeps its own
/// limit and may also read the best makespan published by the coordinator.
#[derive(Debug)]
pub struct SearchWorker<'a> {
    graph: &'a TaskGraph,
    bound: &'a LowerBound,
    subtree: Subtree,
    limit: u64,
    published: Option<&'a AtomicU64>,
    results: Sender<Report>,
    stats: WorkerStats,
}

impl<'a> SearchWorker<'a> {
    /// Creates a worker that accepts schedules no longer than `best_bound`.
    #[must_use]
    pub fn new(
        graph: &'a TaskGraph,
        bound: &'a LowerBound,
        subtree: Subtree,
        best_bound: u64,
        results: Sender<Report>,
    ) -> Self {
        Self {
            graph,
            bound,
            subtree,
            limit: best_bound.saturating_add(1),
            published: None,
            results,
            stats: WorkerStats::default(),
        }
    }

    /// Lets the worker prune against the best makespan published by the coordinator.
    #[must_use]
    pub const fn with_published_bound(mut self, published: &'a AtomicU64) -> Self {
        self.published = Some(published);
        self
    }

    /// Explores the whole subtree and returns the statistics.
    #[must_use]
    pub fn run(mut self) -> WorkerStats {
        let lower_bound = self.subtree.lower_bound;
        if lower_bound < self.limit() {
            self.search(lower_bound);
        } else {
            self.stats.pruned += 1;
        }
        self.stats
    }

    /// Makespans must be strictly below this value to be worth exploring.
    fn limit(&self) -> u64 {
        self.published.map_or(self.limit, |published| {
            self.limit.min(published.load(Ordering::Relaxed))
        })
    }

    fn search(&mut self, lower_bound: u64) {
        self.stats.visited += 1;
        self.stats.deepest = self.stats.deepest.max(self.subtree.state.scheduled());

        if self.subtree.is_complete() {
            self.report();
            return;
        }

        for task in self.subtree.frontier.ready(&self.subtree.state) {
            while let Some(placement) =
                self.subtree
                    .allocator
                    .allocate_processor(self.graph, &mut self.subtree.state, task)
            {
                let bound = self
                    .bound
                    .extend(lower_bound, task, placement, &self.subtree.allocator);

                if bound < self.limit() {
                    let ready = find_satisfied_children(self.graph, &self.subtree.state, task);
                    self.subtree.frontier.push(ready);
                    self.search(bound);
                    self.subtree.frontier.pop();
                } else {
                    self.stats.pruned += 1;
                }

                self.subtree
                    .allocator
                    .release(self.graph, &mut self.subtree.state, task);
                self.subtree.state.check(task, placement.processor);
            }
            self.subtree.state.reset_checked(task);
        }
    }

    fn report(&mut self) {
        let makespan = self.subtree.allocator.makespan();
        if makespan >= self.limit() {
            return;
        }

        self.limit = makespan;
        self.stats.reported += 1;
        trace!("worker found schedule with makespan {makespan}");

        let schedule = Schedule::from_state(self.graph, &self.subtree.state);
        if self.results.send(Report::Complete(schedule)).is_err() {
            warn!("coordinator stopped listening, schedule with makespan {makespan} dropped");
        }
    }
}
