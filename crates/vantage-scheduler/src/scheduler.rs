//! The cooperative tick scheduler.
//!
//! The host owns the clock: it calls [`Scheduler::tick`] periodically and
//! the scheduler advances every running batch a bounded amount of work at a
//! time. There is no blocking wait anywhere on this path; heavy work lives
//! in worker subprocesses and only their *results* are applied here, on the
//! thread that owns the scene.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use vantage_cache::{ArtifactCategory, CacheKey, CacheLayer};
use vantage_config::BatchConfig;
use vantage_policy::{DistanceThresholds, LodPolicy};
use vantage_scene::{SceneGraph, SceneHost, SnapshotStore};
use vantage_tasks::{
    BatchRequest, BuildError, BuildOutcome, FilterConfig, Task, TaskKind, TaskParams,
    TaskQueueBuilder,
};
use vantage_worker::{SpawnOutcome, WorkItem, WorkOutcome, WorkerPool};

use crate::apply;
use crate::error::ScheduleError;
use crate::progress::{BatchState, BatchSummary, Progress};

/// Opaque handle to a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchJobHandle(u64);

/// How image work is executed for one batch, decided once at start.
#[derive(Debug, Clone)]
enum ExecStrategy {
    /// Dispatch to worker subprocesses at this executable.
    OutOfProcess(PathBuf),
    /// No worker runtime available: run host-native transcodes inline,
    /// chunked to one entity per tick.
    Inline,
}

/// Drives batch jobs across host ticks.
#[derive(Default)]
pub struct Scheduler {
    next_handle: u64,
    jobs: FxHashMap<u64, BatchJob>,
}

impl Scheduler {
    /// Create a scheduler with no jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a batch: validate preconditions, freeze the configuration,
    /// pick the execution strategy, and hand back a handle.
    ///
    /// Precondition failures are reported here, once, synchronously; after
    /// this returns `Ok`, per-task trouble only ever shows up in the
    /// summary counters.
    pub fn start<S: SceneGraph>(
        &mut self,
        scene: &S,
        request: BatchRequest,
        config: BatchConfig,
    ) -> Result<BatchJobHandle, ScheduleError> {
        config.validate()?;

        let needs_camera = !matches!(request, BatchRequest::ResizeImages { .. });
        if needs_camera && scene.camera().is_none() {
            return Err(ScheduleError::NoCamera);
        }

        let produces_artifacts = matches!(
            request,
            BatchRequest::ResizeImages { .. }
                | BatchRequest::OptimizeByCamera { .. }
                | BatchRequest::OptimizeAll { .. }
        );
        if produces_artifacts && !config.project_dir.is_dir() {
            return Err(ScheduleError::ProjectDirMissing(config.project_dir.clone()));
        }

        let strategy = match WorkerPool::discover_worker(config.worker_path.as_deref()) {
            Some(exe) => {
                debug!(worker = %exe.display(), "worker runtime available");
                ExecStrategy::OutOfProcess(exe)
            }
            None => {
                info!("no worker runtime found; falling back to inline execution");
                ExecStrategy::Inline
            }
        };

        let policy = LodPolicy::new(
            DistanceThresholds::new(
                config.distances[0],
                config.distances[1],
                config.distances[2],
            ),
            config.min_protection_ratio,
            config.min_face_guard,
        );

        self.next_handle += 1;
        let handle = BatchJobHandle(self.next_handle);
        let mut job = BatchJob::new(request, config, policy, strategy);
        job.transition(BatchState::Analyzing);
        self.jobs.insert(handle.0, job);
        Ok(handle)
    }

    /// Advance a job by one tick. Returns the resulting progress.
    ///
    /// Ticking a terminal job is a no-op that reports its final progress.
    pub fn tick<S: SceneHost>(
        &mut self,
        handle: BatchJobHandle,
        scene: &mut S,
        snapshots: &mut SnapshotStore,
    ) -> Result<Progress, ScheduleError> {
        let job = self.jobs.get_mut(&handle.0).ok_or(ScheduleError::UnknownJob)?;
        Ok(job.tick(scene, snapshots))
    }

    /// Current progress of a job.
    pub fn poll(&self, handle: BatchJobHandle) -> Result<Progress, ScheduleError> {
        self.jobs
            .get(&handle.0)
            .map(BatchJob::progress)
            .ok_or(ScheduleError::UnknownJob)
    }

    /// Final accounting for a job (meaningful once terminal, but readable
    /// at any time).
    pub fn summary(&self, handle: BatchJobHandle) -> Result<BatchSummary, ScheduleError> {
        self.jobs
            .get(&handle.0)
            .map(|j| j.summary)
            .ok_or(ScheduleError::UnknownJob)
    }

    /// Cancel a job. In-flight workers are not killed; their results are
    /// discarded when they eventually finish. All timers and pool resources
    /// are released immediately.
    pub fn cancel(&mut self, handle: BatchJobHandle) -> Result<(), ScheduleError> {
        let job = self.jobs.get_mut(&handle.0).ok_or(ScheduleError::UnknownJob)?;
        job.cancel();
        Ok(())
    }

    /// Whether a job still holds a worker pool or cache (test/diagnostic
    /// hook for the release-on-exit invariant).
    pub fn holds_resources(&self, handle: BatchJobHandle) -> Result<bool, ScheduleError> {
        self.jobs
            .get(&handle.0)
            .map(|j| j.pool.is_some() || j.cache.is_some())
            .ok_or(ScheduleError::UnknownJob)
    }

    /// Number of worker subprocesses currently in flight for a job.
    pub fn active_workers(&self, handle: BatchJobHandle) -> Result<usize, ScheduleError> {
        self.jobs
            .get(&handle.0)
            .map(|j| j.pool.as_ref().map_or(0, WorkerPool::active_count))
            .ok_or(ScheduleError::UnknownJob)
    }
}

/// The stable identity of an image for cache keying: its snapshotted
/// original path when one exists, the current source otherwise.
fn identity_path<'a>(
    snapshots: &'a SnapshotStore,
    task: &Task,
    source: &'a std::path::Path,
) -> &'a std::path::Path {
    match snapshots.get(task.entity, vantage_scene::SnapshotDim::ImagePath) {
        Some(vantage_scene::OriginalValue::Path(p)) => p.as_path(),
        _ => source,
    }
}

enum ImageDispatch {
    /// The task reached a terminal state or was handed to the pool.
    Continue,
    /// The pool is full; the task went back to the queue head.
    PoolFull,
    /// An inline transcode ran; that is this tick's entire image quota.
    InlineRan,
}

struct BatchJob {
    state: BatchState,
    request: BatchRequest,
    config: BatchConfig,
    policy: LodPolicy,
    strategy: ExecStrategy,
    queue: VecDeque<Task>,
    in_flight: FxHashMap<u64, Task>,
    pool: Option<WorkerPool>,
    cache: Option<CacheLayer>,
    processed: usize,
    total: usize,
    summary: BatchSummary,
    ticks: u64,
}

impl BatchJob {
    fn new(
        request: BatchRequest,
        config: BatchConfig,
        policy: LodPolicy,
        strategy: ExecStrategy,
    ) -> Self {
        Self {
            state: BatchState::Idle,
            request,
            config,
            policy,
            strategy,
            queue: VecDeque::new(),
            in_flight: FxHashMap::default(),
            pool: None,
            cache: None,
            processed: 0,
            total: 0,
            summary: BatchSummary::default(),
            ticks: 0,
        }
    }

    fn transition(&mut self, next: BatchState) {
        debug!(from = ?self.state, to = ?next, "batch state transition");
        self.state = next;
        if next.is_terminal() {
            // Resource release is part of the transition, on every exit path.
            self.pool = None;
            self.cache = None;
            self.queue.clear();
            self.in_flight.clear();
            info!(
                processed = self.processed,
                total = self.total,
                succeeded = self.summary.succeeded,
                failed = self.summary.failed,
                skipped = self.summary.skipped,
                cache_hits = self.summary.cache_hits,
                ticks = self.ticks,
                state = ?next,
                "batch terminated"
            );
        }
    }

    fn progress(&self) -> Progress {
        Progress {
            processed: self.processed,
            total: self.total,
            state: self.state,
        }
    }

    fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.transition(BatchState::Cancelled);
        }
    }

    fn tick<S: SceneHost>(&mut self, scene: &mut S, snapshots: &mut SnapshotStore) -> Progress {
        if self.state.is_terminal() {
            return self.progress();
        }
        self.ticks += 1;
        let tick_start = Instant::now();

        // Completions first: frees pool slots before dispatch.
        self.drain_completions(scene, snapshots);

        match self.state {
            BatchState::Idle | BatchState::Analyzing => {
                self.analyze(scene);
            }
            BatchState::Processing => {
                self.dispatch(scene, snapshots, tick_start);
                self.maybe_finish();
            }
            BatchState::Finished | BatchState::Cancelled => {}
        }

        self.progress()
    }

    /// Build the task queue. Runs synchronously inside one tick; chunking
    /// the analysis itself would hang off this state if scenes ever grow
    /// past what one tick tolerates.
    fn analyze<S: SceneGraph>(&mut self, scene: &S) {
        let builder = TaskQueueBuilder::new(
            scene,
            &self.policy,
            FilterConfig {
                min_face_guard: self.config.min_face_guard,
            },
        );

        match builder.build(self.request) {
            Err(BuildError::NoCamera) => {
                // The camera existed at start and is gone now; nothing can
                // be measured anymore.
                warn!("camera disappeared before analysis; cancelling batch");
                self.transition(BatchState::Cancelled);
            }
            Ok(BuildOutcome::NothingToDo) => {
                info!("nothing to do; no eligible entities");
                self.transition(BatchState::Finished);
            }
            Ok(BuildOutcome::Tasks { tasks, skipped }) => {
                self.total = tasks.len();
                self.summary.skipped = skipped;
                let has_image_work = tasks.iter().any(|t| t.kind == TaskKind::ImageResize);
                self.queue = tasks.into();

                if has_image_work {
                    let cache =
                        CacheLayer::new(self.config.project_dir.clone(), self.category());
                    if let Err(err) = cache.ensure_dir() {
                        warn!(%err, "cannot create artifact directory; cancelling batch");
                        self.transition(BatchState::Cancelled);
                        return;
                    }
                    self.cache = Some(cache);
                    if let ExecStrategy::OutOfProcess(exe) = &self.strategy {
                        self.pool =
                            Some(WorkerPool::new(exe.clone(), self.config.max_workers));
                    }
                }

                info!(total = self.total, skipped, "analysis complete");
                self.transition(BatchState::Processing);
            }
        }
    }

    fn category(&self) -> ArtifactCategory {
        match self.request {
            BatchRequest::ResizeImages { target_px } => ArtifactCategory::Fixed(target_px),
            _ => ArtifactCategory::CameraOptimized,
        }
    }

    /// Apply every completion that arrived since the last tick, in
    /// discovery order. Results for unknown tickets (e.g. from before a
    /// cancel) are dropped on the floor.
    fn drain_completions<S: SceneHost>(&mut self, scene: &mut S, snapshots: &mut SnapshotStore) {
        let Some(pool) = self.pool.as_mut() else {
            return;
        };
        let results = pool.poll_completions();
        self.summary.worker_spawns = pool.spawned_total();

        for result in results {
            let Some(mut task) = self.in_flight.remove(&result.item.ticket) else {
                continue;
            };
            match result.outcome {
                WorkOutcome::Success => {
                    match apply::apply_image_path(scene, snapshots, task.entity, &result.item.dest)
                    {
                        Ok(()) => {
                            task.mark_done();
                            self.summary.succeeded += 1;
                            if let Some(cache) = &mut self.cache {
                                let key = CacheKey::for_source(
                                    identity_path(snapshots, &task, &result.item.source),
                                    "image",
                                    result.item.target_px,
                                );
                                cache.record(key, result.item.dest.clone());
                            }
                        }
                        Err(err) => {
                            warn!(entity = ?task.entity, ?err, "result apply failed");
                            task.mark_failed();
                            self.summary.failed += 1;
                        }
                    }
                }
                WorkOutcome::Failed { reason, detail } => {
                    warn!(entity = ?task.entity, ?reason, detail, "worker failed");
                    task.mark_failed();
                    self.summary.failed += 1;
                }
            }
            self.processed += 1;
        }
    }

    /// Pop and execute/dispatch queue entries until the tick budget runs
    /// out, the pool fills up, or an inline transcode consumes the tick.
    fn dispatch<S: SceneHost>(
        &mut self,
        scene: &mut S,
        snapshots: &mut SnapshotStore,
        tick_start: Instant,
    ) {
        while let Some(task) = self.queue.pop_front() {
            if tick_start.elapsed() > self.config.tick_budget {
                // Budget exhausted: defer the rest to the next tick.
                self.queue.push_front(task);
                break;
            }

            match task.kind {
                TaskKind::GeometryUpdate | TaskKind::ShaderUpdate | TaskKind::ViewportUpdate => {
                    self.run_scene_task(task, scene, snapshots);
                }
                TaskKind::ImageResize => match self.dispatch_image(task, scene, snapshots) {
                    ImageDispatch::Continue => {}
                    ImageDispatch::PoolFull => break,
                    ImageDispatch::InlineRan => break,
                },
            }
        }
    }

    /// Cheap synchronous tasks: a parameter write against the scene.
    fn run_scene_task<S: SceneHost>(
        &mut self,
        mut task: Task,
        scene: &mut S,
        snapshots: &mut SnapshotStore,
    ) {
        let applied = match task.params {
            TaskParams::Geometry { factor } => {
                apply::apply_geometry(scene, snapshots, task.entity, factor)
            }
            TaskParams::Shader { level } => {
                apply::apply_shader(scene, snapshots, &self.config, task.entity, level)
            }
            TaskParams::Viewport { level } => {
                apply::apply_viewport(scene, snapshots, &self.config, task.entity, level)
            }
            TaskParams::Image { .. } => unreachable!("image tasks take the dispatch path"),
        };

        match applied {
            Ok(()) => {
                task.mark_done();
                self.summary.succeeded += 1;
            }
            Err(err) => {
                debug!(entity = ?task.entity, ?err, "scene task failed");
                task.mark_failed();
                self.summary.failed += 1;
            }
        }
        self.processed += 1;
    }

    fn dispatch_image<S: SceneHost>(
        &mut self,
        mut task: Task,
        scene: &mut S,
        snapshots: &mut SnapshotStore,
    ) -> ImageDispatch {
        let TaskParams::Image { target_px } = task.params else {
            unreachable!("non-image params on an image task");
        };

        let Some(info) = scene.image_info(task.entity) else {
            // Deleted since analysis.
            task.mark_failed();
            self.summary.failed += 1;
            self.processed += 1;
            return ImageDispatch::Continue;
        };

        let source = match &info.path {
            Some(path) => path.clone(),
            None if info.packed => PathBuf::new(),
            None => {
                task.mark_failed();
                self.summary.failed += 1;
                self.processed += 1;
                return ImageDispatch::Continue;
            }
        };

        let Some(cache) = self.cache.as_mut() else {
            // Analysis always installs a cache for image work; losing it is
            // a bug upstream, but one task must not take the batch down.
            task.mark_failed();
            self.summary.failed += 1;
            self.processed += 1;
            return ImageDispatch::Continue;
        };
        // Key off the original path when this image was already repointed
        // (e.g. a previous batch): re-runs then hit the same artifact.
        let key = CacheKey::for_source(identity_path(snapshots, &task, &source), &info.name, target_px);
        let artifact = cache.artifact_path(&key);

        // Cache short-circuit: apply the existing artifact, skip the pool.
        if let Some(existing) = cache.lookup(&key) {
            match apply::apply_image_path(scene, snapshots, task.entity, &existing) {
                Ok(()) => {
                    task.mark_done();
                    self.summary.succeeded += 1;
                }
                Err(err) => {
                    debug!(entity = ?task.entity, ?err, "cache hit apply failed");
                    task.mark_failed();
                    self.summary.failed += 1;
                }
            }
            self.summary.cache_hits += 1;
            self.processed += 1;
            return ImageDispatch::Continue;
        }

        let can_subprocess = !info.packed && !source.as_os_str().is_empty();
        if can_subprocess && let Some(pool) = self.pool.as_mut() {
            let item = WorkItem {
                ticket: task.id.0,
                source,
                dest: artifact,
                target_px,
                action: key.action,
            };
            return match pool.try_spawn(item) {
                SpawnOutcome::Spawned => {
                    self.summary.worker_spawns = pool.spawned_total();
                    apply::snapshot_image_path(scene, snapshots, task.entity);
                    task.mark_dispatched();
                    self.in_flight.insert(task.id.0, task);
                    ImageDispatch::Continue
                }
                SpawnOutcome::AtCapacity(_) => {
                    // Hand the task back to the queue head for next tick.
                    self.queue.push_front(task);
                    ImageDispatch::PoolFull
                }
                SpawnOutcome::SpawnFailed(result) => {
                    warn!(entity = ?task.entity, outcome = ?result.outcome, "spawn failed");
                    task.mark_failed();
                    self.summary.failed += 1;
                    self.processed += 1;
                    ImageDispatch::Continue
                }
            };
        }

        // Inline fallback: host-native transcode on this thread, one per
        // tick so the host stays responsive.
        apply::snapshot_image_path(scene, snapshots, task.entity);
        match scene.native_resize(task.entity, target_px, &artifact) {
            Ok(()) => {
                cache.record(key, artifact);
                task.mark_done();
                self.summary.succeeded += 1;
            }
            Err(err) => {
                warn!(entity = ?task.entity, %err, "inline transcode failed");
                task.mark_failed();
                self.summary.failed += 1;
            }
        }
        self.processed += 1;
        ImageDispatch::InlineRan
    }

    fn maybe_finish(&mut self) {
        let pool_idle = self.pool.as_ref().is_none_or(WorkerPool::is_idle);
        if self.queue.is_empty() && self.in_flight.is_empty() && pool_idle {
            if let Some(pool) = &self.pool {
                self.summary.worker_spawns = pool.spawned_total();
            }
            self.transition(BatchState::Finished);
        }
    }
}
