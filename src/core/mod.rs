mod allocator;
mod error;
mod graph;
mod readiness;
mod schedule;
mod state;

pub use allocator::*;
pub use error::*;
pub use graph::*;
pub use readiness::*;
pub use schedule::*;
pub use state::*;

#[cfg(test)]
pub(crate) use graph::test::diamond;
