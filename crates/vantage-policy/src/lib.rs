//! LOD decision policy: screen-coverage measurement, distance buckets,
//! keep-ratio computation, and texture target sizing.
//!
//! Everything in this crate is pure: measurements go in, factors come out,
//! nothing touches the scene or the filesystem.

mod coverage;
mod distance;
mod policy;
mod texture;

pub use coverage::{ScreenCoverage, measure_coverage};
pub use distance::{DistanceThresholds, LodLevel};
pub use policy::{LodPolicy, Measurement};
pub use texture::{INVISIBLE_FLOOR_PX, bucketed_target, required_pixels};
