//! Result application: the only code that mutates the scene.
//!
//! Every function here runs on the scheduler thread, re-validates that the
//! target entity is still alive, and records an original-value snapshot on
//! first touch before writing anything.

use std::path::Path;

use tracing::debug;

use vantage_config::BatchConfig;
use vantage_policy::LodLevel;
use vantage_scene::{
    EntityId, OriginalValue, SceneHost, ShaderParam, SnapshotDim, SnapshotStore,
};

/// Shader scalars at or below this are treated as "off" and never touched.
const SHADER_DEAD_ZONE: f32 = 0.001;

/// Minimum change worth writing back to the host.
const SHADER_EPSILON: f32 = 0.001;

/// Why an application could not be made.
#[derive(Debug)]
pub(crate) enum ApplyError {
    /// The entity was deleted between task creation and application.
    EntityGone,
    /// The host backend refused the write.
    Backend(vantage_scene::SceneError),
}

impl From<vantage_scene::SceneError> for ApplyError {
    fn from(err: vantage_scene::SceneError) -> Self {
        ApplyError::Backend(err)
    }
}

/// Write a reduction keep-ratio to a mesh's modifier.
pub(crate) fn apply_geometry(
    scene: &mut dyn SceneHost,
    snapshots: &mut SnapshotStore,
    entity: EntityId,
    factor: f32,
) -> Result<(), ApplyError> {
    if !scene.is_alive(entity) {
        return Err(ApplyError::EntityGone);
    }
    let current = scene.reduction_factor(entity).unwrap_or(1.0);
    snapshots.record_once(
        entity,
        SnapshotDim::ReductionFactor,
        OriginalValue::Scalar(current),
    );
    scene.set_reduction_factor(entity, factor)?;
    debug!(?entity, factor, "reduction factor applied");
    Ok(())
}

/// Scale the shader detail scalars of a mesh for a LOD level.
///
/// Multipliers are applied against the snapshotted original, not the current
/// value, so repeated batches at different levels do not compound.
pub(crate) fn apply_shader(
    scene: &mut dyn SceneHost,
    snapshots: &mut SnapshotStore,
    config: &BatchConfig,
    entity: EntityId,
    level: LodLevel,
) -> Result<(), ApplyError> {
    if !scene.is_alive(entity) {
        return Err(ApplyError::EntityGone);
    }

    for (param, table) in [
        (ShaderParam::NormalStrength, &config.normal_mults),
        (ShaderParam::DisplacementScale, &config.displacement_mults),
    ] {
        let Some(current) = scene.shader_scalar(entity, param) else {
            // Absent or host-driven; nothing to do for this param.
            continue;
        };

        let dim = SnapshotDim::Shader(param);
        if snapshots.get(entity, dim).is_none() {
            if current <= SHADER_DEAD_ZONE {
                // Effectively disabled; never snapshot, never touch.
                continue;
            }
            snapshots.record_once(entity, dim, OriginalValue::Scalar(current));
        }
        let Some(OriginalValue::Scalar(original)) = snapshots.get(entity, dim).cloned() else {
            continue;
        };

        let mult = level_multiplier(level, table);
        let target = original * mult;
        if (current - target).abs() > SHADER_EPSILON {
            scene.set_shader_scalar(entity, param, target)?;
        }
    }
    Ok(())
}

/// Set the viewport display mode of a mesh for a LOD level.
pub(crate) fn apply_viewport(
    scene: &mut dyn SceneHost,
    snapshots: &mut SnapshotStore,
    config: &BatchConfig,
    entity: EntityId,
    level: LodLevel,
) -> Result<(), ApplyError> {
    if !scene.is_alive(entity) {
        return Err(ApplyError::EntityGone);
    }
    if let Some((mode, hidden)) = scene.display(entity) {
        snapshots.record_once(entity, SnapshotDim::Display, OriginalValue::Display {
            mode,
            hidden,
        });
    }

    let mode = config.viewport_modes[level.index()];
    let hide = level == LodLevel::FARTHEST && config.hide_at_far_level;
    scene.set_display(entity, mode, hide)?;
    Ok(())
}

/// Record the image's original path (first touch) and repoint it at a
/// generated artifact.
pub(crate) fn apply_image_path(
    scene: &mut dyn SceneHost,
    snapshots: &mut SnapshotStore,
    entity: EntityId,
    artifact: &Path,
) -> Result<(), ApplyError> {
    if !scene.is_alive(entity) {
        return Err(ApplyError::EntityGone);
    }
    snapshot_image_path(scene, snapshots, entity);
    scene.repoint(entity, artifact)?;
    debug!(?entity, artifact = %artifact.display(), "image repointed");
    Ok(())
}

/// Record an image's current path as its original, once.
pub(crate) fn snapshot_image_path(
    scene: &dyn SceneHost,
    snapshots: &mut SnapshotStore,
    entity: EntityId,
) {
    if let Some(info) = scene.image_info(entity)
        && let Some(path) = info.path
    {
        snapshots.record_once(entity, SnapshotDim::ImagePath, OriginalValue::Path(path));
    }
}

/// Multiplier for a level: the nearest level is always 1.0, farther levels
/// index the configured table.
fn level_multiplier(level: LodLevel, table: &[f32; 3]) -> f32 {
    match level.index() {
        0 => 1.0,
        i => table[i - 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vantage_config::Settings;
    use vantage_scene::{
        CameraDescription, MemoryScene, MeshDescription, ModifierBackend, SceneDescription,
        SceneGraph, ShaderBackend,
    };

    fn config() -> BatchConfig {
        BatchConfig::from_settings(&Settings::default(), PathBuf::from("/tmp")).unwrap()
    }

    fn scene_one_mesh() -> MemoryScene {
        MemoryScene::from_description(&SceneDescription {
            camera: CameraDescription {
                position: [0.0, 0.0, 0.0],
                look_at: [1.0, 0.0, 0.0],
                fov_deg: 50.0,
                resolution: [1920, 1080],
            },
            meshes: vec![MeshDescription {
                name: "rock".to_string(),
                position: [30.0, 0.0, 0.0],
                half_extent: [1.0, 1.0, 1.0],
                faces: 5000,
                vertices: 2500,
                hidden: false,
                instance_source: false,
                images: vec![],
                normal_strength: Some(0.8),
                displacement_scale: None,
            }],
            images: vec![],
            collections: vec![],
        })
    }

    #[test]
    fn test_geometry_apply_snapshots_then_writes() {
        let mut scene = scene_one_mesh();
        let id = scene.mesh_entities()[0];
        let mut snaps = SnapshotStore::new();

        apply_geometry(&mut scene, &mut snaps, id, 0.4).unwrap();
        assert_eq!(scene.reduction_factor(id), Some(0.4));
        assert_eq!(
            snaps.get(id, SnapshotDim::ReductionFactor),
            Some(&OriginalValue::Scalar(1.0))
        );

        // Second apply must not overwrite the original snapshot.
        apply_geometry(&mut scene, &mut snaps, id, 0.2).unwrap();
        assert_eq!(
            snaps.get(id, SnapshotDim::ReductionFactor),
            Some(&OriginalValue::Scalar(1.0))
        );
    }

    #[test]
    fn test_deleted_entity_fails_soft() {
        let mut scene = scene_one_mesh();
        let id = scene.mesh_entities()[0];
        scene.delete(id);
        let mut snaps = SnapshotStore::new();
        assert!(matches!(
            apply_geometry(&mut scene, &mut snaps, id, 0.4),
            Err(ApplyError::EntityGone)
        ));
        assert!(snaps.is_empty());
    }

    #[test]
    fn test_shader_multiplies_against_original() {
        let mut scene = scene_one_mesh();
        let id = scene.mesh_entities()[0];
        let mut snaps = SnapshotStore::new();
        let cfg = config();

        // Level 2 normal multiplier is 0.3 by default.
        apply_shader(&mut scene, &mut snaps, &cfg, id, LodLevel(2)).unwrap();
        let after_far = scene.shader_scalar(id, ShaderParam::NormalStrength).unwrap();
        assert!((after_far - 0.8 * 0.3).abs() < 1e-6);

        // Back to level 0: restored to the original, not 0.24 * 1.0.
        apply_shader(&mut scene, &mut snaps, &cfg, id, LodLevel(0)).unwrap();
        let after_near = scene.shader_scalar(id, ShaderParam::NormalStrength).unwrap();
        assert!((after_near - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_shader_dead_zone_untouched() {
        let mut scene = scene_one_mesh();
        let id = scene.mesh_entities()[0];
        scene
            .set_shader_scalar(id, ShaderParam::NormalStrength, 0.0005)
            .unwrap();
        let mut snaps = SnapshotStore::new();
        let cfg = config();

        apply_shader(&mut scene, &mut snaps, &cfg, id, LodLevel(3)).unwrap();
        // Neither snapshotted nor modified.
        assert!(snaps.is_empty());
        let v = scene.shader_scalar(id, ShaderParam::NormalStrength).unwrap();
        assert!((v - 0.0005).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_apply_and_far_hide() {
        let mut scene = scene_one_mesh();
        let id = scene.mesh_entities()[0];
        let mut snaps = SnapshotStore::new();
        let mut cfg = config();
        cfg.hide_at_far_level = true;

        apply_viewport(&mut scene, &mut snaps, &cfg, id, LodLevel::FARTHEST).unwrap();
        let (mode, hidden) = vantage_scene::ViewportBackend::display(&scene, id).unwrap();
        assert_eq!(mode, vantage_config::DisplayMode::Bounds);
        assert!(hidden);
        assert!(snaps.get(id, SnapshotDim::Display).is_some());
    }
}
