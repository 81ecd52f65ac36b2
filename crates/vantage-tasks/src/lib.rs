//! Task model and queue construction for Vantage batches.

mod builder;
mod task;

pub use builder::{BatchRequest, BuildError, BuildOutcome, FilterConfig, TaskQueueBuilder};
pub use task::{Task, TaskId, TaskKind, TaskParams, TaskState};
