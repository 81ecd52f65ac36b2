//! Entity identity and per-entity measurement data.
//!
//! An [`EntityId`] is a stable, copyable key into the host scene graph. It is
//! never a pointer: the entity behind it may be deleted by the user at any
//! time, so every id must be re-resolved (and may fail) at the moment of use.

use std::path::PathBuf;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Stable identifier for a scene object or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// What kind of entity an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A mesh object with geometry, materials, and a viewport presence.
    Mesh,
    /// An image datablock referenced by materials.
    Image,
}

/// Measurement snapshot of a mesh entity, valid only for the current tick.
#[derive(Debug, Clone)]
pub struct MeshInfo {
    /// Display name (diagnostics only).
    pub name: String,
    /// World-space corners of the bounding box.
    pub world_corners: [Vec3; 8],
    /// Number of faces in the evaluated geometry.
    pub face_count: u32,
    /// Number of vertices in the evaluated geometry.
    pub vertex_count: u32,
    /// Hidden in the viewport (still optimized, at floor level).
    pub hidden: bool,
    /// A reduction modifier is already present on this mesh.
    pub already_degraded: bool,
}

impl MeshInfo {
    /// Bounding-box center: the mean of the eight world-space corners.
    pub fn center(&self) -> Vec3 {
        let sum: Vec3 = self.world_corners.iter().copied().sum();
        sum / 8.0
    }

    /// World-space corners of an axis-aligned box described by a transform
    /// and local half extents.
    pub fn corners_from_transform(world_from_local: Mat4, half_extent: Vec3) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sign = Vec3::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i & 4 == 0 { -1.0 } else { 1.0 },
            );
            *corner = world_from_local.transform_point3(sign * half_extent);
        }
        corners
    }
}

/// Measurement snapshot of an image entity, valid only for the current tick.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Display name (diagnostics and duplicate detection).
    pub name: String,
    /// Current file path, if the image is file-backed.
    pub path: Option<PathBuf>,
    /// Pixel width of the source.
    pub width: u32,
    /// Pixel height of the source.
    pub height: u32,
    /// Packed into the host file rather than living on disk.
    pub packed: bool,
    /// Procedurally generated or a viewer buffer; never optimized.
    pub generated: bool,
}

impl ImageInfo {
    /// Largest source dimension; resize targets never exceed this.
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    /// A zero-sized image means the backing file is missing or unreadable.
    pub fn is_broken(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Camera state needed for screen-coverage measurement.
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    /// World-space camera position.
    pub position: Vec3,
    /// World-to-camera transform.
    pub view: Mat4,
    /// Camera-to-clip projection.
    pub projection: Mat4,
    /// Render resolution in pixels.
    pub resolution: [u32; 2],
}
