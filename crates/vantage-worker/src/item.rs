//! Work items: the subprocess-backed subset of a task.
//!
//! A `WorkItem` exists only while the pool owns it; once the subprocess
//! terminates, the item comes back inside a [`WorkItemResult`] and the
//! scheduler reconciles it with its task.

use std::path::PathBuf;

use vantage_cache::CacheAction;

/// One file-transcode job handed to a worker subprocess.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Correlation id the scheduler uses to find the owning task.
    pub ticket: u64,
    /// Source file to read.
    pub source: PathBuf,
    /// Artifact path to write.
    pub dest: PathBuf,
    /// Target edge length in pixels.
    pub target_px: u32,
    /// Resize or byte copy.
    pub action: CacheAction,
}

/// Why a work item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    /// The subprocess could not be started at all.
    SpawnFailed,
    /// The subprocess ran but reported a processing error.
    ProcessError,
    /// The subprocess is missing a runtime dependency (exit code 2).
    MissingDependency,
}

/// Terminal outcome of a work item.
#[derive(Debug, Clone)]
pub enum WorkOutcome {
    /// Exit 0 with the `SUCCESS` marker on stdout.
    Success,
    /// Anything else.
    Failed {
        /// Classified failure cause.
        reason: FailReason,
        /// Captured diagnostic text (stderr, falling back to stdout).
        detail: String,
    },
}

impl WorkOutcome {
    /// Whether this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, WorkOutcome::Success)
    }
}

/// A completed work item with its classified outcome.
#[derive(Debug)]
pub struct WorkItemResult {
    /// The item the pool was given.
    pub item: WorkItem,
    /// What became of it.
    pub outcome: WorkOutcome,
}
