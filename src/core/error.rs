use thiserror::Error;

/// Errors produced while building a task graph or searching for a schedule.
#[derive(Debug, Error)]
pub enum Error {
    /// The coordinator was configured without any worker.
    #[error("worker count must be at least 1")]
    InvalidWorkers,
    /// The coordinator was configured without any processor.
    #[error("processor count must be at least 1")]
    InvalidProcessors,
    /// An edge refers to a task that is not part of the graph.
    #[error("edge refers to unknown task {0}")]
    UnknownTask(usize),
    /// Two tasks share the same name.
    #[error("task `{0}` is declared more than once")]
    DuplicateTask(String),
    /// A task has no processing time.
    #[error("task `{0}` must have a positive weight")]
    ZeroWeight(String),
    /// Task and edge weights add up beyond the time range.
    #[error("sum of task and edge weights overflows")]
    WeightOverflow,
    /// The search never reached a state where every task was placed.
    /// This happens when the graph contains a cycle.
    #[error("only {scheduled} of {total} tasks could be scheduled, the graph is probably cyclic")]
    IncompleteSchedule { scheduled: usize, total: usize },
    /// No subtree produced a complete schedule.
    #[error("no feasible schedule found")]
    NoFeasibleSchedule,
    /// A search worker panicked.
    #[error("search worker {index} failed: {message}")]
    WorkerFailed { index: usize, message: String },
    /// The worker pool could not be created.
    #[error("cannot build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
