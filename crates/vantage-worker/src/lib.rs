//! Worker pool for out-of-process image transcodes.
//!
//! The library half supervises subprocesses ([`WorkerPool`]); the binary
//! half (`vantage-worker`) is the subprocess itself, speaking the fixed CLI
//! contract: `--src <path> --dst <path> --size <int> --action RESIZE|COPY`,
//! `SUCCESS` on stdout, exit codes 0/1/2.

mod item;
mod pool;

pub use item::{FailReason, WorkItem, WorkItemResult, WorkOutcome};
pub use pool::{SpawnOutcome, WorkerPool};
