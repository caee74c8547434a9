use super::{LowerBound, Report, SearchWorker, Subtree, WorkerStats};
use crate::core::{find_satisfied_nodes, Error, Schedule, TaskGraph};
use log::{debug, info, trace, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// Best schedule known so far.
#[derive(Debug)]
struct Incumbent {
    bound: u64,
    schedule: Option<Schedule>,
}

/// Best bound and schedule of one search run.
/// Written only by the coordinator while draining worker reports.
#[derive(Debug)]
struct SharedBest {
    incumbent: Mutex<Incumbent>,
    published: AtomicU64,
    broadcast: bool,
}

impl SharedBest {
    const fn new(bound: u64, broadcast: bool) -> Self {
        Self {
            incumbent: Mutex::new(Incumbent {
                bound,
                schedule: None,
            }),
            published: AtomicU64::new(u64::MAX),
            broadcast,
        }
    }

    /// Records the schedule if it is strictly better, or if it ties and nothing is recorded yet.
    fn offer(&self, schedule: Schedule) -> bool {
        let makespan = schedule.makespan();
        let mut incumbent = self.incumbent.lock().unwrap_or_else(PoisonError::into_inner);

        if makespan > incumbent.bound
            || (makespan == incumbent.bound && incumbent.schedule.is_some())
        {
            return false;
        }

        trace!("best makespan improved from {} to {makespan}", incumbent.bound);
        incumbent.bound = makespan;
        incumbent.schedule = Some(schedule);
        drop(incumbent);

        if self.broadcast {
            self.published.fetch_min(makespan, Ordering::Relaxed);
        }
        true
    }

    fn into_schedule(self) -> Option<Schedule> {
        self.incumbent
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .schedule
    }
}

/// Independent subtrees produced by splitting the search space.
#[derive(Debug)]
pub struct Partition {
    pub subtrees: Vec<Subtree>,
    /// Largest number of tasks placed in a subtree that could not be extended.
    pub deepest: usize,
}

/// Runs a parallel branch-and-bound search for a minimum makespan schedule.
///
/// The search space is split into independent subtrees, each explored by one
/// worker on a fixed-size thread pool. Workers send complete schedules over a
/// channel and the coordinator keeps the best one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Coordinator {
    workers: usize,
    processors: usize,
    broadcast: bool,
}

impl Coordinator {
    /// Creates a coordinator for the given number of workers and processors.
    ///
    /// # Errors
    /// - If `workers` is zero.
    /// - If `processors` is zero.
    pub const fn new(workers: usize, processors: usize) -> Result<Self, Error> {
        if workers == 0 {
            return Err(Error::InvalidWorkers);
        }
        if processors == 0 {
            return Err(Error::InvalidProcessors);
        }
        Ok(Self {
            workers,
            processors,
            broadcast: true,
        })
    }

    /// Enables or disables sharing the best makespan with running workers.
    #[must_use]
    pub const fn with_bound_broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }

    /// Returns the number of workers.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the number of processors.
    #[must_use]
    pub const fn processors(&self) -> usize {
        self.processors
    }

    /// Returns the number of pool threads. One worker slot is kept for the coordinator.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.workers.saturating_sub(1).max(1)
    }

    /// Splits the search space until there are at least as many subtrees as workers.
    ///
    /// The shallowest open subtree is expanded first. Among equally deep subtrees
    /// the one with the fewest ready tasks goes first.
    #[must_use]
    pub fn partition(&self, graph: &TaskGraph, bound: &LowerBound) -> Partition {
        let mut open = vec![Subtree::root(graph, self.processors, bound)];
        let mut done = Vec::new();
        let mut deepest = 0;

        while open.len() + done.len() < self.workers {
            let Some(next) = open
                .iter()
                .enumerate()
                .min_by_key(|(_, subtree)| {
                    let ready = find_satisfied_nodes(graph, &subtree.state, graph.task_ids());
                    (subtree.state.scheduled(), ready.len())
                })
                .map(|(index, _)| index)
            else {
                break;
            };
            let mut subtree = open.remove(next);

            if subtree.is_complete() {
                done.push(subtree);
                continue;
            }

            let children = subtree.branch(graph, bound);
            if children.is_empty() {
                deepest = deepest.max(subtree.state.scheduled());
                debug!("subtree at depth {} has no ready task", subtree.frontier.depth());
            }
            open.extend(children);
        }

        done.extend(open);
        Partition {
            subtrees: done,
            deepest,
        }
    }

    /// Finds a schedule of the graph with minimum makespan.
    ///
    /// # Errors
    /// - If a worker panicked.
    /// - If the graph is cyclic, so no complete schedule exists.
    /// - If the thread pool cannot be created.
    pub fn schedule(&self, graph: &TaskGraph) -> Result<Schedule, Error> {
        let serial_bound = graph.total_weight();
        info!(
            "scheduling {} tasks on {} processors with {} workers",
            graph.len(),
            self.processors,
            self.workers
        );

        let bound = LowerBound::new(graph, self.processors);
        let Partition {
            subtrees,
            mut deepest,
        } = self.partition(graph, &bound);
        debug!("search space split into {} subtrees", subtrees.len());

        let best = SharedBest::new(serial_bound, self.broadcast);
        let (sender, receiver) = mpsc::channel();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.pool_size())
            .thread_name(|index| format!("bnb-worker-{index}"))
            .build()?;

        let reached = pool.in_place_scope(|scope| {
            for (index, subtree) in subtrees.into_iter().enumerate() {
                let sender = sender.clone();
                let bound = &bound;
                let published = self.broadcast.then_some(&best.published);

                scope.spawn(move |_| {
                    run_guarded(index, &sender, || {
                        let results = sender.clone();
                        let worker =
                            SearchWorker::new(graph, bound, subtree, serial_bound, results);
                        match published {
                            Some(published) => worker.with_published_bound(published).run(),
                            None => worker.run(),
                        }
                    });
                });
            }
            drop(sender);

            drain(receiver, &best)
        })?;
        deepest = deepest.max(reached);

        let Some(schedule) = best.into_schedule() else {
            return Err(if deepest < graph.len() {
                Error::IncompleteSchedule {
                    scheduled: deepest,
                    total: graph.len(),
                }
            } else {
                Error::NoFeasibleSchedule
            });
        };

        debug_assert!(
            schedule.verify(graph, self.processors),
            "Schedule is invalid: {schedule:?}"
        );
        info!("optimal makespan is {}", schedule.makespan());

        Ok(schedule)
    }
}

/// Runs one worker job and reports how it ended.
/// A panic inside the job is caught and reported as [`Report::Failed`].
fn run_guarded(index: usize, results: &Sender<Report>, job: impl FnOnce() -> WorkerStats) {
    let report = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(stats) => Report::Finished { index, stats },
        Err(payload) => Report::Failed {
            index,
            message: panic_message(payload.as_ref()),
        },
    };
    let _ = results.send(report);
}

/// Consumes worker reports until every sender is gone and records improvements in `best`.
/// Returns the largest number of tasks any worker placed.
///
/// # Errors
/// - If a worker failed. The first failure is returned after all reports are consumed.
fn drain(receiver: Receiver<Report>, best: &SharedBest) -> Result<usize, Error> {
    let mut deepest = 0;
    let mut failure = None;

    for report in receiver {
        match report {
            Report::Complete(schedule) => {
                best.offer(schedule);
            }
            Report::Finished { index, stats } => {
                debug!("worker {index} finished: {stats:?}");
                deepest = deepest.max(stats.deepest);
            }
            Report::Failed { index, message } => {
                warn!("worker {index} failed: {message}");
                failure.get_or_insert(Error::WorkerFailed { index, message });
            }
        }
    }

    failure.map_or(Ok(deepest), Err)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{diamond, Edge, Placement, Task};

    fn graph(tasks: &[(&str, u64)], edges: &[(usize, usize, u64)]) -> TaskGraph {
        let tasks = tasks.iter().map(|&(name, weight)| Task::new(name, weight)).collect();
        let edges = edges.iter().map(|&(from, to, weight)| Edge::new(from, to, weight)).collect();
        TaskGraph::new(tasks, edges).unwrap_or_else(|err| panic!("{err}"))
    }

    #[test]
    fn coordinator_should_reject_zero_counts() {
        assert!(matches!(Coordinator::new(0, 2), Err(Error::InvalidWorkers)));
        assert!(matches!(Coordinator::new(2, 0), Err(Error::InvalidProcessors)));
        assert!(Coordinator::new(1, 1).is_ok());
    }

    #[test]
    fn single_node_makespan_is_its_weight() -> anyhow::Result<()> {
        let graph = graph(&[("a", 5)], &[]);

        for workers in 1..=4 {
            let schedule = Coordinator::new(workers, 3)?.schedule(&graph)?;
            assert_eq!(schedule.makespan(), 5);
            assert_eq!(schedule.placement(0), Some(Placement::new(1, 0)));
        }

        Ok(())
    }

    #[test]
    fn largest_accepted_weight_should_schedule() -> anyhow::Result<()> {
        let graph = graph(&[("a", u64::MAX - 1)], &[]);

        let schedule = Coordinator::new(2, 2)?.schedule(&graph)?;

        assert_eq!(schedule.makespan(), u64::MAX - 1);

        Ok(())
    }

    #[test]
    fn chain_runs_serially() -> anyhow::Result<()> {
        let graph = graph(
            &[("a", 2), ("b", 4), ("c", 1), ("d", 3)],
            &[(0, 1, 2), (1, 2, 5), (2, 3, 1)],
        );

        let schedule = Coordinator::new(3, 4)?.schedule(&graph)?;

        assert_eq!(schedule.makespan(), graph.total_weight());
        assert!(schedule.entries().iter().all(|entry| entry.processor == 1));

        Ok(())
    }

    #[test]
    fn diamond_should_match_known_optimum() -> anyhow::Result<()> {
        let graph = diamond();

        for workers in [1, 2, 4, 8] {
            let schedule = Coordinator::new(workers, 2)?.schedule(&graph)?;

            assert_eq!(schedule.makespan(), 8);
            assert_eq!(schedule.placement(0), Some(Placement::new(1, 0)));
            assert_eq!(schedule.placement(2), Some(Placement::new(1, 2)));
            assert_eq!(schedule.placement(1), Some(Placement::new(2, 3)));
            assert_eq!(schedule.placement(3), Some(Placement::new(2, 6)));
        }

        Ok(())
    }

    #[test]
    fn broadcast_should_not_change_result() -> anyhow::Result<()> {
        let graph = graph(
            &[("a", 3), ("b", 2), ("c", 4), ("d", 2), ("e", 3)],
            &[(0, 2, 1), (1, 2, 2), (1, 3, 1), (2, 4, 3), (3, 4, 1)],
        );

        let with = Coordinator::new(4, 2)?.schedule(&graph)?;
        let without = Coordinator::new(4, 2)?
            .with_bound_broadcast(false)
            .schedule(&graph)?;

        assert_eq!(with.makespan(), without.makespan());
        assert!(with.verify(&graph, 2));
        assert!(without.verify(&graph, 2));

        Ok(())
    }

    #[test]
    fn independent_tasks_should_balance() -> anyhow::Result<()> {
        let graph = graph(&[("a", 1), ("b", 2), ("c", 3), ("d", 2)], &[]);

        let schedule = Coordinator::new(3, 2)?.schedule(&graph)?;

        assert_eq!(schedule.makespan(), 4);

        Ok(())
    }

    #[test]
    fn empty_graph_has_empty_schedule() -> anyhow::Result<()> {
        let graph = graph(&[], &[]);

        let schedule = Coordinator::new(2, 2)?.schedule(&graph)?;

        assert!(schedule.is_empty());
        assert_eq!(schedule.makespan(), 0);

        Ok(())
    }

    #[test]
    fn cyclic_graph_should_be_incomplete() -> anyhow::Result<()> {
        let graph = graph(
            &[("a", 1), ("b", 1), ("c", 1)],
            &[(0, 1, 0), (1, 2, 0), (2, 1, 0)],
        );

        for workers in [1, 3] {
            let result = Coordinator::new(workers, 2)?.schedule(&graph);
            assert!(
                matches!(
                    result,
                    Err(Error::IncompleteSchedule {
                        scheduled: 1,
                        total: 3
                    })
                ),
                "{result:?}"
            );
        }

        Ok(())
    }

    #[test]
    fn partition_should_reach_worker_count() -> anyhow::Result<()> {
        let graph = diamond();
        let coordinator = Coordinator::new(4, 2)?;
        let bound = LowerBound::new(&graph, 2);

        let partition = coordinator.partition(&graph, &bound);

        assert!(partition.subtrees.len() >= 4);
        assert!(partition
            .subtrees
            .iter()
            .all(|subtree| subtree.state.order()[0] == 0));

        Ok(())
    }

    #[test]
    fn partition_should_expand_narrowest_subtree_first() -> anyhow::Result<()> {
        let graph = graph(
            &[("a", 1), ("b", 1), ("c", 1), ("d", 1)],
            &[(0, 2, 1), (0, 3, 1)],
        );
        let coordinator = Coordinator::new(3, 1)?;
        let bound = LowerBound::new(&graph, 1);

        let partition = coordinator.partition(&graph, &bound);

        assert_eq!(partition.subtrees.len(), 4);
        assert!(partition
            .subtrees
            .iter()
            .all(|subtree| subtree.state.scheduled() == 2));
        assert_eq!(partition.subtrees[0].state.order(), &[1, 0]);

        Ok(())
    }

    fn serial(graph: &TaskGraph) -> Schedule {
        let mut state = crate::core::RunState::new(graph);
        let mut start = 0;
        for task in graph.task_ids() {
            state.assign(task, Placement::new(1, start));
            start += graph.weight(task);
        }
        Schedule::from_state(graph, &state)
    }

    #[test]
    fn drain_should_report_worker_panic() {
        let graph = diamond();
        let best = SharedBest::new(graph.total_weight(), true);
        let schedule = serial(&graph);
        let (sender, receiver) = mpsc::channel();

        std::thread::scope(|scope| {
            let results = sender.clone();
            scope.spawn(move || run_guarded(0, &results, || panic!("search exploded")));

            let results = sender.clone();
            scope.spawn(move || {
                run_guarded(1, &results, || {
                    let _ = results.send(Report::Complete(schedule));
                    WorkerStats {
                        reported: 1,
                        deepest: 4,
                        ..WorkerStats::default()
                    }
                });
            });
        });
        drop(sender);

        let result = drain(receiver, &best);

        assert!(
            matches!(
                &result,
                Err(Error::WorkerFailed { index: 0, message }) if message == "search exploded"
            ),
            "{result:?}"
        );
        assert_eq!(best.into_schedule().as_ref().map(Schedule::makespan), Some(10));
    }

    #[test]
    fn drain_should_return_deepest_without_failures() {
        let best = SharedBest::new(10, false);
        let (sender, receiver) = mpsc::channel();

        for (index, deepest) in [(0, 3), (1, 4), (2, 2)] {
            run_guarded(index, &sender, || WorkerStats {
                deepest,
                ..WorkerStats::default()
            });
        }
        drop(sender);

        assert!(matches!(drain(receiver, &best), Ok(4)));
        assert!(best.into_schedule().is_none());
    }

    #[test]
    fn offer_should_keep_first_tie_and_strict_improvements() {
        let graph = diamond();
        let best = SharedBest::new(10, true);
        let serial = serial(&graph);

        assert!(best.offer(serial.clone()));
        assert!(!best.offer(serial));
        assert_eq!(best.published.load(Ordering::Relaxed), 10);
        assert_eq!(best.into_schedule().as_ref().map(Schedule::makespan), Some(10));
    }

    #[test]
    fn panic_message_should_read_payload() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
