//! Test execution and scheduling engine.

mod assertions;
mod execution;
mod result;
mod schedule;

pub use execution::TestExecutor;
pub use result::summarize;
pub use schedule::TestScheduler;
