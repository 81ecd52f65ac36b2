//! Original-value snapshots for idempotent reset.
//!
//! The first time the optimizer touches an entity along some dimension it
//! records the pre-optimization value here. Later touches never overwrite it,
//! so running a batch twice and restoring still lands on the true original.
//! The store round-trips through a JSON sidecar, which is how the reference
//! scene satisfies the host persistence contract.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use vantage_config::DisplayMode;

use crate::entity::EntityId;
use crate::error::SceneError;
use crate::graph::ShaderParam;

/// The dimension of an entity a snapshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotDim {
    /// Geometry reduction keep-ratio.
    ReductionFactor,
    /// A shader scalar.
    Shader(ShaderParam),
    /// Viewport display mode + hidden flag.
    Display,
    /// Image file path.
    ImagePath,
}

/// A recorded pre-optimization value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OriginalValue {
    /// A scalar (reduction ratio or shader value).
    Scalar(f32),
    /// Viewport display state.
    Display {
        /// Display mode before optimization.
        mode: DisplayMode,
        /// Hidden flag before optimization.
        hidden: bool,
    },
    /// Image file path before repointing.
    Path(PathBuf),
}

/// One persisted snapshot entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalSnapshot {
    /// Entity the value belongs to.
    pub entity: EntityId,
    /// Dimension the value covers.
    pub dim: SnapshotDim,
    /// The pre-optimization value.
    pub value: OriginalValue,
}

/// Write-once store of original values, keyed by `(entity, dimension)`.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: FxHashMap<(EntityId, SnapshotDim), OriginalValue>,
}

impl SnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value unless one already exists for this entity/dimension.
    ///
    /// Returns `true` if the value was recorded, `false` if a snapshot was
    /// already present (first touch wins).
    pub fn record_once(&mut self, entity: EntityId, dim: SnapshotDim, value: OriginalValue) -> bool {
        use std::collections::hash_map::Entry;
        match self.entries.entry((entity, dim)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Look up the recorded original, if any.
    pub fn get(&self, entity: EntityId, dim: SnapshotDim) -> Option<&OriginalValue> {
        self.entries.get(&(entity, dim))
    }

    /// Remove and return the recorded original (used after a restore).
    pub fn remove(&mut self, entity: EntityId, dim: SnapshotDim) -> Option<OriginalValue> {
        self.entries.remove(&(entity, dim))
    }

    /// All entries, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = OriginalSnapshot> + '_ {
        self.entries.iter().map(|(&(entity, dim), value)| OriginalSnapshot {
            entity,
            dim,
            value: value.clone(),
        })
    }

    /// Number of recorded snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a store from a JSON sidecar. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(path)?;
        let entries: Vec<OriginalSnapshot> = serde_json::from_str(&contents)?;
        let mut store = Self::new();
        for e in entries {
            // First entry wins on duplicates, same as record_once.
            store.record_once(e.entity, e.dim, e.value);
        }
        Ok(store)
    }

    /// Save the store to a JSON sidecar.
    pub fn save(&self, path: &Path) -> Result<(), SceneError> {
        let entries: Vec<OriginalSnapshot> = self.iter().collect();
        let contents = serde_json::to_string_pretty(&entries)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
