//! Artifact cache for generated texture variants.
//!
//! Artifact paths are a pure function of the source name, target size, and
//! category, so "does the file exist" doubles as the cache probe. A hit
//! skips worker dispatch entirely.

mod key;
mod layer;

pub use key::{ArtifactCategory, CacheAction, CacheKey};
pub use layer::{CacheError, CacheLayer, existing_categories, find_variant, purge_category};
