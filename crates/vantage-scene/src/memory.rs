//! In-memory reference scene.
//!
//! [`MemoryScene`] implements every host seam over plain structs. It backs
//! the CLI front end (loading a RON scene description) and the scheduler
//! tests, and doubles as documentation of what a real host integration has
//! to provide.

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use vantage_config::DisplayMode;

use crate::entity::{CameraState, EntityId, ImageInfo, MeshInfo};
use crate::error::SceneError;
use crate::graph::{
    ImageBackend, ModifierBackend, SceneGraph, ShaderBackend, ShaderParam, ViewportBackend,
};

/// Serializable description of a scene, loadable from RON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Camera the optimizer measures against.
    pub camera: CameraDescription,
    /// Mesh objects.
    pub meshes: Vec<MeshDescription>,
    /// Image datablocks.
    pub images: Vec<ImageDescription>,
    /// Named collections grouping meshes by name (for statistics).
    #[serde(default)]
    pub collections: Vec<CollectionDescription>,
}

/// Camera parameters in the scene description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDescription {
    /// World-space position.
    pub position: [f32; 3],
    /// Point the camera looks at.
    pub look_at: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    /// Render resolution in pixels.
    pub resolution: [u32; 2],
}

/// One mesh in the scene description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshDescription {
    /// Unique display name.
    pub name: String,
    /// World-space center.
    pub position: [f32; 3],
    /// Local half extents of the bounding box.
    pub half_extent: [f32; 3],
    /// Face count.
    pub faces: u32,
    /// Vertex count.
    pub vertices: u32,
    /// Hidden in the viewport.
    #[serde(default)]
    pub hidden: bool,
    /// Used as an instancing template.
    #[serde(default)]
    pub instance_source: bool,
    /// Names of images this mesh's materials reference.
    #[serde(default)]
    pub images: Vec<String>,
    /// Initial normal-map strength, if the material has one.
    #[serde(default)]
    pub normal_strength: Option<f32>,
    /// Initial displacement scale, if the material has one.
    #[serde(default)]
    pub displacement_scale: Option<f32>,
}

/// One image in the scene description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDescription {
    /// Unique display name.
    pub name: String,
    /// File path, absent for packed images.
    pub path: Option<PathBuf>,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Packed into the host file.
    #[serde(default)]
    pub packed: bool,
    /// Generated/viewer image, never optimized.
    #[serde(default)]
    pub generated: bool,
}

/// A named group of meshes, for statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDescription {
    /// Collection name.
    pub name: String,
    /// Mesh names in the collection.
    pub meshes: Vec<String>,
}

#[derive(Debug, Clone)]
struct MeshRecord {
    name: String,
    position: Vec3,
    half_extent: Vec3,
    faces: u32,
    vertices: u32,
    hidden: bool,
    instance_source: bool,
    images: Vec<EntityId>,
    display: DisplayMode,
    display_hidden: bool,
    reduction: Option<f32>,
    normal_strength: Option<f32>,
    displacement_scale: Option<f32>,
}

#[derive(Debug, Clone)]
struct ImageRecord {
    name: String,
    path: Option<PathBuf>,
    width: u32,
    height: u32,
    packed: bool,
    generated: bool,
}

/// A scene held entirely in memory, implementing all host seams.
#[derive(Debug, Default)]
pub struct MemoryScene {
    meshes: FxHashMap<EntityId, MeshRecord>,
    images: FxHashMap<EntityId, ImageRecord>,
    mesh_order: Vec<EntityId>,
    image_order: Vec<EntityId>,
    camera: Option<CameraState>,
    collections: Vec<(String, Vec<EntityId>)>,
    next_id: u64,
}

impl MemoryScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from a description.
    pub fn from_description(desc: &SceneDescription) -> Self {
        let mut scene = Self::new();

        let mut image_ids: FxHashMap<String, EntityId> = FxHashMap::default();
        for img in &desc.images {
            let id = scene.add_image(img.clone());
            image_ids.insert(img.name.clone(), id);
        }

        let mut mesh_ids: FxHashMap<String, EntityId> = FxHashMap::default();
        for mesh in &desc.meshes {
            let refs = mesh
                .images
                .iter()
                .filter_map(|name| image_ids.get(name).copied())
                .collect();
            let id = scene.add_mesh(mesh.clone(), refs);
            mesh_ids.insert(mesh.name.clone(), id);
        }

        for col in &desc.collections {
            let members = col
                .meshes
                .iter()
                .filter_map(|name| mesh_ids.get(name).copied())
                .collect();
            scene.collections.push((col.name.clone(), members));
        }

        scene.camera = Some(camera_state(&desc.camera));
        scene
    }

    /// Add an image entity; returns its id.
    pub fn add_image(&mut self, desc: ImageDescription) -> EntityId {
        let id = self.alloc_id();
        self.images.insert(
            id,
            ImageRecord {
                name: desc.name,
                path: desc.path,
                width: desc.width,
                height: desc.height,
                packed: desc.packed,
                generated: desc.generated,
            },
        );
        self.image_order.push(id);
        id
    }

    /// Add a mesh entity; returns its id.
    pub fn add_mesh(&mut self, desc: MeshDescription, images: Vec<EntityId>) -> EntityId {
        let id = self.alloc_id();
        self.meshes.insert(
            id,
            MeshRecord {
                name: desc.name,
                position: Vec3::from_array(desc.position),
                half_extent: Vec3::from_array(desc.half_extent),
                faces: desc.faces,
                vertices: desc.vertices,
                hidden: desc.hidden,
                instance_source: desc.instance_source,
                images,
                display: DisplayMode::Textured,
                display_hidden: false,
                reduction: None,
                normal_strength: desc.normal_strength,
                displacement_scale: desc.displacement_scale,
            },
        );
        self.mesh_order.push(id);
        id
    }

    /// Set the camera directly (tests).
    pub fn set_camera(&mut self, camera: CameraState) {
        self.camera = Some(camera);
    }

    /// Delete an entity, simulating the user removing it mid-batch.
    pub fn delete(&mut self, id: EntityId) {
        self.meshes.remove(&id);
        self.images.remove(&id);
        self.mesh_order.retain(|&m| m != id);
        self.image_order.retain(|&m| m != id);
    }

    /// Named collections with their member ids, for statistics.
    pub fn collections(&self) -> &[(String, Vec<EntityId>)] {
        &self.collections
    }

    /// Total vertices across the meshes of one collection.
    pub fn collection_vertices(&self, members: &[EntityId]) -> u64 {
        members
            .iter()
            .filter_map(|id| self.meshes.get(id))
            .map(|m| m.vertices as u64)
            .sum()
    }

    /// Merge duplicate images: an image named `base.001` (numeric duplicate
    /// suffix) whose path equals `base`'s path is dropped and every material
    /// reference is remapped onto `base`. Returns the number of remapped
    /// references.
    pub fn dedupe_images(&mut self) -> usize {
        let mut remap: FxHashMap<EntityId, EntityId> = FxHashMap::default();

        let by_name: FxHashMap<String, EntityId> = self
            .image_order
            .iter()
            .filter_map(|&id| self.images.get(&id).map(|r| (r.name.clone(), id)))
            .collect();

        for &id in &self.image_order {
            let Some(record) = self.images.get(&id) else {
                continue;
            };
            let Some(base_name) = duplicate_base_name(&record.name) else {
                continue;
            };
            let Some(&base_id) = by_name.get(base_name) else {
                continue;
            };
            if base_id == id {
                continue;
            }
            let Some(base) = self.images.get(&base_id) else {
                continue;
            };
            if base.path.is_some() && base.path == record.path {
                remap.insert(id, base_id);
            }
        }

        let mut remapped = 0;
        for mesh in self.meshes.values_mut() {
            for img in mesh.images.iter_mut() {
                if let Some(&target) = remap.get(img) {
                    *img = target;
                    remapped += 1;
                }
            }
        }

        // Drop duplicates nothing references anymore.
        let referenced: FxHashSet<EntityId> = self
            .meshes
            .values()
            .flat_map(|m| m.images.iter().copied())
            .collect();
        for (&dup, _) in remap.iter() {
            if !referenced.contains(&dup) {
                self.images.remove(&dup);
                self.image_order.retain(|&m| m != dup);
            }
        }

        if remapped > 0 {
            tracing::debug!(remapped, "duplicate image references merged");
        }
        remapped
    }
}

impl MemoryScene {
    fn alloc_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    fn mesh_mut(&mut self, id: EntityId) -> Result<&mut MeshRecord, SceneError> {
        self.meshes
            .get_mut(&id)
            .ok_or(SceneError::EntityNotFound(id))
    }

    fn image_mut(&mut self, id: EntityId) -> Result<&mut ImageRecord, SceneError> {
        self.images
            .get_mut(&id)
            .ok_or(SceneError::EntityNotFound(id))
    }
}

/// `name.001` style duplicate suffix: returns the base name when present.
fn duplicate_base_name(name: &str) -> Option<&str> {
    let (base, suffix) = name.rsplit_once('.')?;
    if suffix.len() == 3 && suffix.chars().all(|c| c.is_ascii_digit()) && !base.is_empty() {
        Some(base)
    } else {
        None
    }
}

fn camera_state(desc: &CameraDescription) -> CameraState {
    let position = Vec3::from_array(desc.position);
    let look_at = Vec3::from_array(desc.look_at);
    let view = Mat4::look_at_rh(position, look_at, Vec3::Z);
    let aspect = desc.resolution[0] as f32 / desc.resolution[1] as f32;
    let projection = Mat4::perspective_rh(desc.fov_deg.to_radians(), aspect, 0.1, 10_000.0);
    CameraState {
        position,
        view,
        projection,
        resolution: desc.resolution,
    }
}

impl SceneGraph for MemoryScene {
    fn mesh_entities(&self) -> Vec<EntityId> {
        self.mesh_order.clone()
    }

    fn image_entities(&self) -> Vec<EntityId> {
        self.image_order.clone()
    }

    fn is_alive(&self, id: EntityId) -> bool {
        self.meshes.contains_key(&id) || self.images.contains_key(&id)
    }

    fn mesh_info(&self, id: EntityId) -> Option<MeshInfo> {
        let m = self.meshes.get(&id)?;
        let world = Mat4::from_translation(m.position);
        Some(MeshInfo {
            name: m.name.clone(),
            world_corners: MeshInfo::corners_from_transform(world, m.half_extent),
            face_count: m.faces,
            vertex_count: m.vertices,
            hidden: m.hidden,
            already_degraded: m.reduction.is_some(),
        })
    }

    fn image_info(&self, id: EntityId) -> Option<ImageInfo> {
        let i = self.images.get(&id)?;
        Some(ImageInfo {
            name: i.name.clone(),
            path: i.path.clone(),
            width: i.width,
            height: i.height,
            packed: i.packed,
            generated: i.generated,
        })
    }

    fn instance_sources(&self) -> FxHashSet<EntityId> {
        self.mesh_order
            .iter()
            .filter(|id| self.meshes.get(id).is_some_and(|m| m.instance_source))
            .copied()
            .collect()
    }

    fn images_used_by(&self, mesh: EntityId) -> Vec<EntityId> {
        self.meshes
            .get(&mesh)
            .map(|m| m.images.clone())
            .unwrap_or_default()
    }

    fn camera(&self) -> Option<CameraState> {
        self.camera
    }
}

impl ModifierBackend for MemoryScene {
    fn set_reduction_factor(&mut self, id: EntityId, factor: f32) -> Result<(), SceneError> {
        self.mesh_mut(id)?.reduction = Some(factor);
        Ok(())
    }

    fn reduction_factor(&self, id: EntityId) -> Option<f32> {
        self.meshes.get(&id).and_then(|m| m.reduction)
    }

    fn clear_reduction(&mut self, id: EntityId) -> Result<(), SceneError> {
        self.mesh_mut(id)?.reduction = None;
        Ok(())
    }
}

impl ShaderBackend for MemoryScene {
    fn shader_scalar(&self, id: EntityId, param: ShaderParam) -> Option<f32> {
        let m = self.meshes.get(&id)?;
        match param {
            ShaderParam::NormalStrength => m.normal_strength,
            ShaderParam::DisplacementScale => m.displacement_scale,
        }
    }

    fn set_shader_scalar(
        &mut self,
        id: EntityId,
        param: ShaderParam,
        value: f32,
    ) -> Result<(), SceneError> {
        let m = self.mesh_mut(id)?;
        let slot = match param {
            ShaderParam::NormalStrength => &mut m.normal_strength,
            ShaderParam::DisplacementScale => &mut m.displacement_scale,
        };
        if slot.is_none() {
            return Err(SceneError::ParameterDriven(id));
        }
        *slot = Some(value);
        Ok(())
    }
}

impl ViewportBackend for MemoryScene {
    fn display(&self, id: EntityId) -> Option<(DisplayMode, bool)> {
        self.meshes.get(&id).map(|m| (m.display, m.display_hidden))
    }

    fn set_display(
        &mut self,
        id: EntityId,
        mode: DisplayMode,
        hidden: bool,
    ) -> Result<(), SceneError> {
        let m = self.mesh_mut(id)?;
        m.display = mode;
        m.display_hidden = hidden;
        Ok(())
    }
}

impl ImageBackend for MemoryScene {
    fn repoint(&mut self, id: EntityId, path: &Path) -> Result<(), SceneError> {
        let record = self.image_mut(id)?;
        record.path = Some(path.to_path_buf());
        Ok(())
    }

    fn native_resize(
        &mut self,
        id: EntityId,
        _target_px: u32,
        dst: &Path,
    ) -> Result<(), SceneError> {
        // The reference scene has no codec; real hosts scale in-process here.
        // A byte copy keeps the artifact contract observable in tests.
        let record = self.images.get(&id).ok_or(SceneError::EntityNotFound(id))?;
        let src = record
            .path
            .clone()
            .ok_or(SceneError::ParameterDriven(id))?;
        std::fs::copy(&src, dst)?;
        let record = self.image_mut(id)?;
        record.path = Some(dst.to_path_buf());
        Ok(())
    }
}
