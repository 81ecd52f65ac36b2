//! Bounded pool of out-of-process workers.
//!
//! Each spawned subprocess gets a reaper thread that waits for it and ships
//! the captured output over a channel; [`WorkerPool::poll_completions`]
//! drains that channel without ever blocking. Nothing here waits on a
//! process from the scheduler thread.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::item::{FailReason, WorkItem, WorkItemResult, WorkOutcome};

/// Marker a worker prints on stdout when it succeeded.
const SUCCESS_MARKER: &str = "SUCCESS";

/// Exit code a worker uses for a missing runtime dependency.
const EXIT_MISSING_DEPENDENCY: i32 = 2;

/// Result of asking the pool to start a work item.
#[derive(Debug)]
pub enum SpawnOutcome {
    /// The subprocess is running; its result will arrive via
    /// [`WorkerPool::poll_completions`].
    Spawned,
    /// Every worker slot is busy; the item is handed back untouched so the
    /// caller can retry next tick.
    AtCapacity(WorkItem),
    /// The subprocess could not be started; this is a terminal failure for
    /// the item, and the batch continues.
    SpawnFailed(WorkItemResult),
}

struct Reaped {
    item: WorkItem,
    output: std::io::Result<Output>,
}

/// Supervises up to `max_workers` concurrent worker subprocesses.
pub struct WorkerPool {
    worker_exe: PathBuf,
    max_workers: usize,
    active: usize,
    spawned_total: u64,
    tx: Sender<Reaped>,
    rx: Receiver<Reaped>,
}

impl WorkerPool {
    /// Create a pool running `worker_exe` with at most `max_workers`
    /// concurrent subprocesses (additionally capped by the CPU count).
    pub fn new(worker_exe: PathBuf, max_workers: usize) -> Self {
        let (tx, rx) = unbounded();
        Self {
            worker_exe,
            max_workers: max_workers.clamp(1, num_cpus::get().max(1)),
            active: 0,
            spawned_total: 0,
            tx,
            rx,
        }
    }

    /// Effective concurrency bound.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of subprocesses currently running.
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Whether no subprocesses are in flight.
    pub fn is_idle(&self) -> bool {
        self.active == 0
    }

    /// Total subprocesses this pool has launched.
    pub fn spawned_total(&self) -> u64 {
        self.spawned_total
    }

    /// Check that a worker executable is present.
    ///
    /// Run once per batch; when it fails the whole batch falls back to
    /// inline execution instead of probing per item.
    pub fn probe(worker_exe: &Path) -> bool {
        worker_exe.is_file()
    }

    /// Locate the worker executable: an explicit configured path wins,
    /// otherwise look for a sibling of the current executable.
    pub fn discover_worker(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Self::probe(path).then(|| path.to_path_buf());
        }
        let exe = std::env::current_exe().ok()?;
        let dir = exe.parent()?;
        let name = format!("vantage-worker{}", std::env::consts::EXE_SUFFIX);
        let candidate = dir.join(name);
        Self::probe(&candidate).then_some(candidate)
    }

    /// Try to start a subprocess for `item`.
    pub fn try_spawn(&mut self, item: WorkItem) -> SpawnOutcome {
        if self.active >= self.max_workers {
            return SpawnOutcome::AtCapacity(item);
        }

        let spawn_result = Command::new(&self.worker_exe)
            .arg("--src")
            .arg(&item.source)
            .arg("--dst")
            .arg(&item.dest)
            .arg("--size")
            .arg(item.target_px.to_string())
            .arg("--action")
            .arg(item.action.as_cli_arg())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let child = match spawn_result {
            Ok(child) => child,
            Err(err) => {
                warn!(source = %item.source.display(), %err, "worker spawn failed");
                return SpawnOutcome::SpawnFailed(WorkItemResult {
                    item,
                    outcome: WorkOutcome::Failed {
                        reason: FailReason::SpawnFailed,
                        detail: err.to_string(),
                    },
                });
            }
        };

        self.active += 1;
        self.spawned_total += 1;
        debug!(ticket = item.ticket, pid = child.id(), "worker spawned");

        let tx = self.tx.clone();
        let thread_name = format!("worker-reaper-{}", item.ticket);
        let reaper_item = item.clone();
        // The reaper owns the child; if the pool is dropped mid-flight the
        // process still runs to completion and the send just goes nowhere,
        // which is exactly the discard-on-cancel contract.
        let builder = std::thread::Builder::new().name(thread_name);
        let spawn = builder.spawn(move || {
            let output = child.wait_with_output();
            let _ = tx.send(Reaped {
                item: reaper_item,
                output,
            });
        });
        if let Err(err) = spawn {
            // Thread creation failed; the child runs orphaned but the item
            // must still terminate.
            self.active -= 1;
            warn!(%err, "reaper thread spawn failed");
            return SpawnOutcome::SpawnFailed(WorkItemResult {
                item,
                outcome: WorkOutcome::Failed {
                    reason: FailReason::SpawnFailed,
                    detail: err.to_string(),
                },
            });
        }

        SpawnOutcome::Spawned
    }

    /// Drain every completion that has arrived since the last call.
    ///
    /// Never blocks. Results come back in discovery order (the order the
    /// subprocesses finished), not submission order.
    pub fn poll_completions(&mut self) -> Vec<WorkItemResult> {
        let mut results = Vec::new();
        while let Ok(reaped) = self.rx.try_recv() {
            self.active = self.active.saturating_sub(1);
            results.push(classify(reaped));
        }
        results
    }
}

fn classify(reaped: Reaped) -> WorkItemResult {
    let outcome = match reaped.output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if output.status.success() && stdout.contains(SUCCESS_MARKER) {
                WorkOutcome::Success
            } else {
                let reason = match output.status.code() {
                    Some(EXIT_MISSING_DEPENDENCY) => FailReason::MissingDependency,
                    _ => FailReason::ProcessError,
                };
                let detail = if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                };
                WorkOutcome::Failed { reason, detail }
            }
        }
        Err(err) => WorkOutcome::Failed {
            reason: FailReason::ProcessError,
            detail: err.to_string(),
        },
    };
    WorkItemResult {
        item: reaped.item,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use vantage_cache::CacheAction;

    fn item(ticket: u64) -> WorkItem {
        WorkItem {
            ticket,
            source: PathBuf::from("/src.png"),
            dest: PathBuf::from("/dst.png"),
            target_px: 512,
            action: CacheAction::Resize,
        }
    }

    #[cfg(unix)]
    fn fake_worker(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-worker.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    fn drain_until(pool: &mut WorkerPool, count: usize) -> Vec<WorkItemResult> {
        let start = Instant::now();
        let mut results = Vec::new();
        while results.len() < count {
            results.extend(pool.poll_completions());
            assert!(
                start.elapsed() < Duration::from_secs(10),
                "timed out waiting for {count} completions"
            );
            std::thread::sleep(Duration::from_millis(2));
        }
        results
    }

    #[test]
    fn test_spawn_failure_is_terminal_not_fatal() {
        let mut pool = WorkerPool::new(PathBuf::from("/nonexistent/worker"), 4);
        match pool.try_spawn(item(1)) {
            SpawnOutcome::SpawnFailed(result) => match result.outcome {
                WorkOutcome::Failed { reason, .. } => {
                    assert_eq!(reason, FailReason::SpawnFailed);
                }
                WorkOutcome::Success => panic!("unexpected success"),
            },
            other => panic!("expected SpawnFailed, got {other:?}"),
        }
        assert!(pool.is_idle());
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_worker_is_classified_success() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_worker(dir.path(), "echo SUCCESS");
        let mut pool = WorkerPool::new(exe, 2);

        assert!(matches!(pool.try_spawn(item(1)), SpawnOutcome::Spawned));
        let results = drain_until(&mut pool, 1);
        assert!(results[0].outcome.is_success());
        assert_eq!(results[0].item.ticket, 1);
        assert!(pool.is_idle());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_zero_without_marker_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_worker(dir.path(), "echo done");
        let mut pool = WorkerPool::new(exe, 2);

        assert!(matches!(pool.try_spawn(item(1)), SpawnOutcome::Spawned));
        let results = drain_until(&mut pool, 1);
        match &results[0].outcome {
            WorkOutcome::Failed { reason, .. } => assert_eq!(*reason, FailReason::ProcessError),
            WorkOutcome::Success => panic!("marker missing but classified success"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_two_is_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_worker(dir.path(), "echo 'ERROR: no codec' >&2; exit 2");
        let mut pool = WorkerPool::new(exe, 2);

        assert!(matches!(pool.try_spawn(item(1)), SpawnOutcome::Spawned));
        let results = drain_until(&mut pool, 1);
        match &results[0].outcome {
            WorkOutcome::Failed { reason, detail } => {
                assert_eq!(*reason, FailReason::MissingDependency);
                assert!(detail.contains("no codec"));
            }
            WorkOutcome::Success => panic!("exit 2 classified as success"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_capacity_bound_holds() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_worker(dir.path(), "sleep 0.3; echo SUCCESS");
        let mut pool = WorkerPool::new(exe, 4);

        let mut spawned = 0;
        let mut deferred = 0;
        for i in 0..10 {
            match pool.try_spawn(item(i)) {
                SpawnOutcome::Spawned => spawned += 1,
                SpawnOutcome::AtCapacity(_) => deferred += 1,
                SpawnOutcome::SpawnFailed(_) => panic!("spawn failed"),
            }
        }
        assert_eq!(spawned, 4);
        assert_eq!(deferred, 6);
        assert_eq!(pool.active_count(), 4);
        assert!(pool.active_count() <= pool.max_workers());

        let results = drain_until(&mut pool, 4);
        assert_eq!(results.len(), 4);
        assert!(pool.is_idle());
    }

    #[cfg(unix)]
    #[test]
    fn test_slot_frees_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_worker(dir.path(), "echo SUCCESS");
        let mut pool = WorkerPool::new(exe, 1);

        assert!(matches!(pool.try_spawn(item(1)), SpawnOutcome::Spawned));
        assert!(matches!(
            pool.try_spawn(item(2)),
            SpawnOutcome::AtCapacity(_)
        ));

        drain_until(&mut pool, 1);
        assert!(matches!(pool.try_spawn(item(2)), SpawnOutcome::Spawned));
        drain_until(&mut pool, 1);
        assert_eq!(pool.spawned_total(), 2);
    }

    #[test]
    fn test_probe_rejects_missing_path() {
        assert!(!WorkerPool::probe(Path::new("/nonexistent/worker")));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_accepts_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_worker(dir.path(), "echo SUCCESS");
        assert!(WorkerPool::probe(&exe));
    }
}
