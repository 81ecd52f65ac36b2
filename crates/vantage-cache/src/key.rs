//! Deterministic artifact naming.
//!
//! Every generated variant lives at a path computable from its source file
//! name, target size, and category alone. That determinism *is* the cache:
//! if the path exists, the work was already done.

use std::path::{Path, PathBuf};

/// What the worker is asked to do with a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheAction {
    /// Aspect-preserving downscale.
    Resize,
    /// Byte-identical copy (formats that must not be re-encoded).
    Copy,
}

impl CacheAction {
    /// Pick the action for a source file: high-dynamic-range formats are
    /// copied untouched, everything else is resized.
    pub fn for_source(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("exr") | Some("hdr") => CacheAction::Copy,
            _ => CacheAction::Resize,
        }
    }

    /// The token the worker CLI expects.
    pub fn as_cli_arg(self) -> &'static str {
        match self {
            CacheAction::Resize => "RESIZE",
            CacheAction::Copy => "COPY",
        }
    }
}

/// Which variant family an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactCategory {
    /// Uniform resize to a fixed edge length.
    Fixed(u32),
    /// Per-image targets computed from screen coverage.
    CameraOptimized,
}

impl ArtifactCategory {
    /// Directory name under the project dir: `textures_{N}px` or
    /// `textures_camera_optimized`.
    pub fn dir_name(self) -> String {
        match self {
            ArtifactCategory::Fixed(px) => format!("textures_{px}px"),
            ArtifactCategory::CameraOptimized => "textures_camera_optimized".to_string(),
        }
    }

    /// Parse a directory name back into a category.
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        if name == "textures_camera_optimized" {
            return Some(ArtifactCategory::CameraOptimized);
        }
        let px = name.strip_prefix("textures_")?.strip_suffix("px")?;
        px.parse().ok().map(ArtifactCategory::Fixed)
    }
}

/// Identity of one cacheable artifact.
///
/// The source identity is the source *file name* (not its contents): base
/// names are namespaced by the category directory, so two sources with the
/// same name in different projects never collide, and a swapped source with
/// an unchanged name is served stale. That staleness is accepted behavior,
/// not a bug to fix here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Source file name (`stem.ext`).
    pub source_name: String,
    /// Target edge length in pixels.
    pub target_px: u32,
    /// Resize or copy.
    pub action: CacheAction,
}

impl CacheKey {
    /// Build a key from a source path. Sources without a file name fall back
    /// to a `.png` placeholder name derived from `fallback_stem`.
    pub fn for_source(path: &Path, fallback_stem: &str, target_px: u32) -> Self {
        let source_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{fallback_stem}.png"),
        };
        Self {
            source_name,
            target_px,
            action: CacheAction::for_source(path),
        }
    }

    /// Artifact file name: `{stem}_{target}px{ext}`. Extension defaults to
    /// `.png` when the source has none.
    pub fn artifact_name(&self) -> String {
        let (stem, ext) = match self.source_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
            _ => (self.source_name.as_str(), ".png".to_string()),
        };
        format!("{stem}_{}px{ext}", self.target_px)
    }

    /// Full artifact path under a category directory.
    pub fn artifact_path(&self, base_dir: &Path, category: ArtifactCategory) -> PathBuf {
        base_dir.join(category.dir_name()).join(self.artifact_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_dir_names() {
        assert_eq!(ArtifactCategory::Fixed(512).dir_name(), "textures_512px");
        assert_eq!(
            ArtifactCategory::CameraOptimized.dir_name(),
            "textures_camera_optimized"
        );
    }

    #[test]
    fn test_category_parse_roundtrip() {
        for cat in [ArtifactCategory::Fixed(1024), ArtifactCategory::CameraOptimized] {
            assert_eq!(ArtifactCategory::parse_dir_name(&cat.dir_name()), Some(cat));
        }
        assert_eq!(ArtifactCategory::parse_dir_name("textures"), None);
        assert_eq!(ArtifactCategory::parse_dir_name("renders_512px"), None);
    }

    #[test]
    fn test_artifact_name_shape() {
        let key = CacheKey::for_source(Path::new("/tex/wood_floor.png"), "img", 512);
        assert_eq!(key.artifact_name(), "wood_floor_512px.png");
        assert_eq!(key.action, CacheAction::Resize);
    }

    #[test]
    fn test_hdr_sources_are_copied() {
        let key = CacheKey::for_source(Path::new("/tex/sky.HDR"), "img", 1024);
        assert_eq!(key.action, CacheAction::Copy);
        let key = CacheKey::for_source(Path::new("/tex/env.exr"), "img", 1024);
        assert_eq!(key.action, CacheAction::Copy);
    }

    #[test]
    fn test_missing_extension_defaults_to_png() {
        let key = CacheKey::for_source(Path::new("/tex/noext"), "img", 256);
        assert_eq!(key.artifact_name(), "noext_256px.png");
    }

    #[test]
    fn test_missing_file_name_uses_fallback() {
        let key = CacheKey::for_source(Path::new("/"), "orphan", 256);
        assert_eq!(key.source_name, "orphan.png");
    }

    #[test]
    fn test_artifact_path_layout() {
        let key = CacheKey::for_source(Path::new("/tex/brick.jpg"), "img", 2048);
        let path = key.artifact_path(Path::new("/project"), ArtifactCategory::Fixed(2048));
        assert_eq!(
            path,
            PathBuf::from("/project/textures_2048px/brick_2048px.jpg")
        );
    }
}
