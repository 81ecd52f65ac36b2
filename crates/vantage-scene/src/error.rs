//! Scene access error types.

use crate::entity::EntityId;

/// Errors from scene graph access and snapshot persistence.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The entity no longer exists in the scene.
    #[error("entity {0:?} not found")]
    EntityNotFound(EntityId),

    /// The entity exists but is not of the kind the operation expects.
    #[error("entity {0:?} has the wrong kind for this operation")]
    WrongKind(EntityId),

    /// The parameter is driven by the host (linked) and cannot be written.
    #[error("parameter on entity {0:?} is externally driven")]
    ParameterDriven(EntityId),

    /// Snapshot sidecar I/O failed.
    #[error("snapshot store I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot sidecar contents could not be parsed.
    #[error("snapshot store format: {0}")]
    Format(#[from] serde_json::Error),
}
