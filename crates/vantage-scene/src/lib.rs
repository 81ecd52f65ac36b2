//! Scene entity model for Vantage: ids, measurement data, narrow host
//! seams, original-value snapshots, and an in-memory reference scene.
//!
//! The optimizer core never holds references into the host scene graph.
//! It works with copyable [`EntityId`]s and re-resolves them through the
//! [`SceneGraph`] trait at every use, because the user may delete entities
//! while a batch is running.

mod entity;
mod error;
mod graph;
mod memory;
mod snapshot;
pub mod stats;

pub use entity::{CameraState, EntityId, EntityKind, ImageInfo, MeshInfo};
pub use error::SceneError;
pub use graph::{
    ImageBackend, ModifierBackend, SceneGraph, SceneHost, ShaderBackend, ShaderParam,
    ViewportBackend,
};
pub use memory::{
    CameraDescription, CollectionDescription, ImageDescription, MemoryScene, MeshDescription,
    SceneDescription,
};
pub use snapshot::{OriginalSnapshot, OriginalValue, SnapshotDim, SnapshotStore};
