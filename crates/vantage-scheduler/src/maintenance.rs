//! Maintenance passes outside the batch lifecycle: restoring originals,
//! switching to pre-generated variants, and purging variant folders.
//!
//! These run synchronously on the scheduler thread; they are parameter
//! writes and directory scans, not transcodes.

use std::path::Path;

use tracing::{info, warn};

use vantage_cache::{ArtifactCategory, find_variant, purge_category};
use vantage_scene::{
    OriginalValue, SceneHost, ShaderParam, SnapshotDim, SnapshotStore,
};

use crate::error::ScheduleError;

/// Outcome of a restore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Snapshots successfully written back.
    pub restored: usize,
    /// Image restores skipped because the original file is missing and the
    /// current image still works; their snapshots are kept.
    pub skipped_missing: usize,
    /// Snapshots dropped because their entity no longer exists.
    pub dropped_dead: usize,
}

/// Outcome of a variant-switch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchSummary {
    /// Images repointed at a variant artifact.
    pub switched: usize,
    /// Images with no matching artifact in the category directory.
    pub missing: usize,
}

/// Outcome of a purge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    /// Images restored to their originals before deletion.
    pub restored: usize,
    /// Whether the category directory existed at all.
    pub existed: bool,
}

/// Put every snapshotted entity back to its pre-optimization state.
///
/// An entity with no snapshot was never touched and is left alone. A
/// missing original image file is restored anyway when the current image is
/// broken (a path that is right but absent beats one that points into a
/// generated folder); otherwise the image is skipped and its snapshot kept
/// for a later attempt.
pub fn restore_all<S: SceneHost>(scene: &mut S, snapshots: &mut SnapshotStore) -> RestoreSummary {
    let mut summary = RestoreSummary::default();

    let mut entries: Vec<_> = snapshots.iter().collect();
    entries.sort_by_key(|e| e.entity);

    for entry in entries {
        if !scene.is_alive(entry.entity) {
            snapshots.remove(entry.entity, entry.dim);
            summary.dropped_dead += 1;
            continue;
        }

        let result = match (&entry.dim, &entry.value) {
            (SnapshotDim::ReductionFactor, OriginalValue::Scalar(v)) => {
                if (*v - 1.0).abs() < f32::EPSILON {
                    scene.clear_reduction(entry.entity)
                } else {
                    scene.set_reduction_factor(entry.entity, *v)
                }
            }
            (SnapshotDim::Shader(param), OriginalValue::Scalar(v)) => {
                scene.set_shader_scalar(entry.entity, *param, *v)
            }
            (SnapshotDim::Display, OriginalValue::Display { mode, hidden }) => {
                scene.set_display(entry.entity, *mode, *hidden)
            }
            (SnapshotDim::ImagePath, OriginalValue::Path(original)) => {
                let current_broken = scene
                    .image_info(entry.entity)
                    .is_some_and(|i| i.is_broken());
                if !original.exists() && !current_broken {
                    summary.skipped_missing += 1;
                    continue;
                }
                if !original.exists() {
                    warn!(
                        entity = ?entry.entity,
                        original = %original.display(),
                        "original file missing; restoring path anyway"
                    );
                }
                scene.repoint(entry.entity, original)
            }
            (dim, value) => {
                warn!(?dim, ?value, "mismatched snapshot entry; dropping");
                snapshots.remove(entry.entity, entry.dim);
                continue;
            }
        };

        match result {
            Ok(()) => {
                snapshots.remove(entry.entity, entry.dim);
                summary.restored += 1;
            }
            Err(err) => {
                warn!(entity = ?entry.entity, %err, "restore write failed");
            }
        }
    }

    info!(
        restored = summary.restored,
        skipped_missing = summary.skipped_missing,
        dropped_dead = summary.dropped_dead,
        "restore pass complete"
    );
    summary
}

/// Repoint every image at a pre-generated variant from `category`,
/// matching by the base name of the image's original (or current) file.
pub fn switch_variants<S: SceneHost>(
    scene: &mut S,
    snapshots: &mut SnapshotStore,
    project_dir: &Path,
    category: ArtifactCategory,
) -> SwitchSummary {
    let mut summary = SwitchSummary::default();

    for id in scene.image_entities() {
        let Some(info) = scene.image_info(id) else {
            continue;
        };
        if info.generated {
            continue;
        }

        // The original path is the stable identity; the current path may
        // already point at some other variant.
        let base = match snapshots.get(id, SnapshotDim::ImagePath) {
            Some(OriginalValue::Path(p)) => Some(p.clone()),
            _ => info.path.clone(),
        };
        let Some(stem) = base
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(|s| s.to_str())
            .map(str::to_string)
        else {
            summary.missing += 1;
            continue;
        };

        match find_variant(project_dir, category, &stem) {
            Some(artifact) => {
                if let Some(path) = info.path {
                    snapshots.record_once(id, SnapshotDim::ImagePath, OriginalValue::Path(path));
                }
                match scene.repoint(id, &artifact) {
                    Ok(()) => summary.switched += 1,
                    Err(err) => warn!(entity = ?id, %err, "variant repoint failed"),
                }
            }
            None => summary.missing += 1,
        }
    }

    info!(
        switched = summary.switched,
        missing = summary.missing,
        category = %category.dir_name(),
        "variant switch complete"
    );
    summary
}

/// Delete a variant category directory, first restoring any image whose
/// current path points inside it. Restoring before deleting means no entity
/// is left referencing a file that is about to vanish.
pub fn purge_variants<S: SceneHost>(
    scene: &mut S,
    snapshots: &mut SnapshotStore,
    project_dir: &Path,
    category: ArtifactCategory,
) -> Result<PurgeSummary, ScheduleError> {
    let dir = project_dir.join(category.dir_name());
    let mut summary = PurgeSummary::default();

    for id in scene.image_entities() {
        let Some(info) = scene.image_info(id) else {
            continue;
        };
        let points_inside = info.path.as_deref().is_some_and(|p| p.starts_with(&dir));
        if !points_inside {
            continue;
        }
        if let Some(OriginalValue::Path(original)) =
            snapshots.get(id, SnapshotDim::ImagePath).cloned()
        {
            // Even a missing original beats a path into a deleted folder.
            match scene.repoint(id, &original) {
                Ok(()) => {
                    snapshots.remove(id, SnapshotDim::ImagePath);
                    summary.restored += 1;
                }
                Err(err) => warn!(entity = ?id, %err, "pre-purge restore failed"),
            }
        }
    }

    summary.existed = purge_category(project_dir, category)?;
    info!(
        restored = summary.restored,
        existed = summary.existed,
        category = %category.dir_name(),
        "purge complete"
    );
    Ok(summary)
}
