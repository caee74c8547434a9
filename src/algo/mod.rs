mod bound;
mod coordinator;
mod subtree;
mod worker;

pub use bound::LowerBound;
pub use coordinator::{Coordinator, Partition};
pub use subtree::{Frontier, Subtree};
pub use worker::{Report, SearchWorker, WorkerStats};
