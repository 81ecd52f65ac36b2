//! Narrow seams between the optimizer and the host scene graph.
//!
//! The scheduler never inspects node graphs, modifier stacks, or host
//! datablocks. Everything it needs is expressed through these traits;
//! the host (or [`MemoryScene`](crate::MemoryScene) in tests and the CLI)
//! implements them however it likes.

use std::path::Path;

use rustc_hash::FxHashSet;

use vantage_config::DisplayMode;

use crate::entity::{CameraState, EntityId, ImageInfo, MeshInfo};
use crate::error::SceneError;

/// Named shader scalar the optimizer is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ShaderParam {
    /// Normal-map strength.
    NormalStrength,
    /// Displacement scale.
    DisplacementScale,
}

/// Read-only view of the host scene.
///
/// Enumeration order must be stable across calls while the scene is
/// unchanged; the task queue builder relies on it for reproducible batches.
pub trait SceneGraph {
    /// All mesh entity ids, in stable enumeration order.
    fn mesh_entities(&self) -> Vec<EntityId>;

    /// All image entity ids, in stable enumeration order.
    fn image_entities(&self) -> Vec<EntityId>;

    /// Whether the entity still exists. Ids outlive entities; check before
    /// every mutation.
    fn is_alive(&self, id: EntityId) -> bool;

    /// Measurement data for a mesh entity, `None` if deleted or not a mesh.
    fn mesh_info(&self, id: EntityId) -> Option<MeshInfo>;

    /// Measurement data for an image entity, `None` if deleted or not an image.
    fn image_info(&self, id: EntityId) -> Option<ImageInfo>;

    /// Entities used as instancing templates (particle systems, procedural
    /// duplication). Optimizing one would corrupt every instance, so the
    /// queue builder excludes them wholesale.
    fn instance_sources(&self) -> FxHashSet<EntityId>;

    /// Image entities referenced by the materials of a mesh entity.
    fn images_used_by(&self, mesh: EntityId) -> Vec<EntityId>;

    /// The active camera, if any. A batch that needs measurements cannot
    /// start without one.
    fn camera(&self) -> Option<CameraState>;
}

/// Mutation seam for geometry reduction modifiers.
pub trait ModifierBackend {
    /// Ensure a reduction modifier exists on the mesh and set its keep-ratio.
    fn set_reduction_factor(&mut self, id: EntityId, factor: f32) -> Result<(), SceneError>;

    /// Current keep-ratio, `None` when no reduction modifier is present.
    fn reduction_factor(&self, id: EntityId) -> Option<f32>;

    /// Remove the reduction modifier entirely.
    fn clear_reduction(&mut self, id: EntityId) -> Result<(), SceneError>;
}

/// Mutation seam for shader detail scalars.
pub trait ShaderBackend {
    /// Current value of a shader scalar. `None` when the entity has no such
    /// parameter or the host drives it (linked input).
    fn shader_scalar(&self, id: EntityId, param: ShaderParam) -> Option<f32>;

    /// Write a shader scalar.
    fn set_shader_scalar(
        &mut self,
        id: EntityId,
        param: ShaderParam,
        value: f32,
    ) -> Result<(), SceneError>;
}

/// Mutation seam for viewport display state.
pub trait ViewportBackend {
    /// Current display mode and hidden flag.
    fn display(&self, id: EntityId) -> Option<(DisplayMode, bool)>;

    /// Set display mode and hidden flag.
    fn set_display(
        &mut self,
        id: EntityId,
        mode: DisplayMode,
        hidden: bool,
    ) -> Result<(), SceneError>;
}

/// Mutation seam for image datablocks.
pub trait ImageBackend {
    /// Point the image at a new file and ask the host to reload it.
    fn repoint(&mut self, id: EntityId, path: &Path) -> Result<(), SceneError>;

    /// Host-native resize fallback: decode, scale to `target_px`, write the
    /// artifact to `dst`, and leave the entity pointing at it. Runs on the
    /// scheduler thread, so the scheduler only ever asks for one per tick.
    fn native_resize(&mut self, id: EntityId, target_px: u32, dst: &Path)
    -> Result<(), SceneError>;
}

/// Everything the scheduler needs from a host, in one bound.
pub trait SceneHost:
    SceneGraph + ModifierBackend + ShaderBackend + ViewportBackend + ImageBackend
{
}

impl<T> SceneHost for T where
    T: SceneGraph + ModifierBackend + ShaderBackend + ViewportBackend + ImageBackend
{
}
