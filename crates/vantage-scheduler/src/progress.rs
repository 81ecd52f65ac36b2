//! Batch lifecycle state and progress reporting.

/// Lifecycle of a batch job.
///
/// Transitions only move rightward: `Idle → Analyzing → Processing →
/// Finished`, with `Cancelled` reachable from any non-terminal state.
/// A terminated job is never resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Created, not yet ticked.
    Idle,
    /// The next tick will build the task queue.
    Analyzing,
    /// Tasks are being executed across ticks.
    Processing,
    /// All tasks reached a terminal state (terminal).
    Finished,
    /// Cancelled by request; late worker results are discarded (terminal).
    Cancelled,
}

impl BatchState {
    /// Whether the job will never advance again.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchState::Finished | BatchState::Cancelled)
    }
}

/// A point-in-time view of a batch job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Tasks that reached a terminal state. Monotonically non-decreasing and
    /// never exceeds `total`.
    pub processed: usize,
    /// Tasks the analysis phase enqueued.
    pub total: usize,
    /// Current lifecycle state.
    pub state: BatchState,
}

/// Final accounting for a batch, available once it terminates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Tasks that completed successfully.
    pub succeeded: usize,
    /// Tasks that failed (spawn errors, worker failures, deleted entities).
    pub failed: usize,
    /// Entities the queue builder filtered out before the batch ran.
    pub skipped: usize,
    /// Worker subprocesses launched over the batch's lifetime.
    pub worker_spawns: u64,
    /// Cache hits that bypassed the worker pool.
    pub cache_hits: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(BatchState::Finished.is_terminal());
        assert!(BatchState::Cancelled.is_terminal());
        assert!(!BatchState::Idle.is_terminal());
        assert!(!BatchState::Analyzing.is_terminal());
        assert!(!BatchState::Processing.is_terminal());
    }
}
