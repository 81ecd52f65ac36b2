//! Command-line front end for Vantage.
//!
//! Loads a scene description from RON, runs batches against it with a
//! simple sleep-per-tick host loop, and prints the final accounting.
//! Settings come from `settings.ron` and can be overridden via CLI flags:
//! `vantage --scene scene.ron optimize --max-workers 8`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use vantage_cache::ArtifactCategory;
use vantage_config::{BatchConfig, Settings, SettingsOverrides};
use vantage_scene::{MemoryScene, SceneDescription, SnapshotStore, stats::SceneStats};
use vantage_scheduler::{BatchState, Scheduler};
use vantage_tasks::BatchRequest;

/// Batch scene optimizer driven by camera vantage.
#[derive(Parser, Debug)]
#[command(name = "vantage", about = "Vantage scene optimizer", version)]
struct Cli {
    /// RON scene description to operate on.
    #[arg(long)]
    scene: PathBuf,

    /// Project directory for generated artifacts; defaults to the scene
    /// file's directory.
    #[arg(long)]
    project: Option<PathBuf>,

    #[command(flatten)]
    overrides: SettingsOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pass: geometry, shaders, viewport, camera-sized textures.
    Optimize,
    /// Resize every eligible image to the configured fixed target.
    Resize,
    /// Camera-sized texture regeneration only.
    CameraTextures,
    /// Recompute geometry reduction by camera distance.
    Geometry,
    /// Rescale shader detail by camera distance.
    Shaders,
    /// Reassign viewport display modes by camera distance.
    Viewport,
    /// Put every touched entity back to its original state.
    Restore,
    /// Repoint images at an existing variant folder (e.g. `512` or `camera`).
    Switch {
        /// Variant category: a pixel size or `camera`.
        #[arg(long)]
        to: String,
    },
    /// Delete a variant folder, restoring images that point into it.
    Purge {
        /// Variant category: a pixel size or `camera`.
        #[arg(long)]
        category: String,
    },
    /// Print scene statistics.
    Stats,
    /// Merge duplicate image datablocks.
    Dedupe,
}

fn main() {
    let cli = Cli::parse();

    let config_dir = cli
        .overrides
        .config
        .clone()
        .unwrap_or_else(Settings::default_dir);
    let mut settings = match Settings::load_or_create(&config_dir) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to load settings: {err}");
            std::process::exit(1);
        }
    };
    settings.apply_cli_overrides(&cli.overrides);

    vantage_log::init_logging(Some(&config_dir.join("logs")), Some(&settings));

    if let Err(err) = run(&cli, &settings) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(&cli.scene)?;
    let description: SceneDescription = ron::from_str(&contents)?;
    let mut scene = MemoryScene::from_description(&description);

    let project_dir = match &cli.project {
        Some(dir) => dir.clone(),
        None => cli
            .scene
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let sidecar = project_dir.join("vantage_snapshots.json");
    let mut snapshots = SnapshotStore::load(&sidecar)?;

    let config = BatchConfig::from_settings(settings, project_dir.clone())?;

    match &cli.command {
        Command::Optimize => run_batch(
            &mut scene,
            &mut snapshots,
            BatchRequest::OptimizeAll {
                max_size_px: config.max_size_px,
            },
            config,
            settings,
        )?,
        Command::Resize => run_batch(
            &mut scene,
            &mut snapshots,
            BatchRequest::ResizeImages {
                target_px: config.target_size_px,
            },
            config,
            settings,
        )?,
        Command::CameraTextures => run_batch(
            &mut scene,
            &mut snapshots,
            BatchRequest::OptimizeByCamera {
                max_size_px: config.max_size_px,
            },
            config,
            settings,
        )?,
        Command::Geometry => run_batch(
            &mut scene,
            &mut snapshots,
            BatchRequest::UpdateGeometry,
            config,
            settings,
        )?,
        Command::Shaders => run_batch(
            &mut scene,
            &mut snapshots,
            BatchRequest::UpdateShaders,
            config,
            settings,
        )?,
        Command::Viewport => run_batch(
            &mut scene,
            &mut snapshots,
            BatchRequest::UpdateViewport,
            config,
            settings,
        )?,
        Command::Restore => {
            let summary = vantage_scheduler::restore_all(&mut scene, &mut snapshots);
            println!(
                "restored {} values ({} originals missing, {} entities gone)",
                summary.restored, summary.skipped_missing, summary.dropped_dead
            );
        }
        Command::Switch { to } => {
            let category = parse_category(to)?;
            let summary = vantage_scheduler::switch_variants(
                &mut scene,
                &mut snapshots,
                &project_dir,
                category,
            );
            println!(
                "switched {} images ({} without a matching variant)",
                summary.switched, summary.missing
            );
        }
        Command::Purge { category } => {
            let category = parse_category(category)?;
            let summary = vantage_scheduler::purge_variants(
                &mut scene,
                &mut snapshots,
                &project_dir,
                category,
            )?;
            if summary.existed {
                println!("purged; {} images restored first", summary.restored);
            } else {
                println!("nothing to purge");
            }
        }
        Command::Stats => print_stats(&scene),
        Command::Dedupe => {
            let remapped = scene.dedupe_images();
            println!("remapped {remapped} duplicate image references");
        }
    }

    snapshots.save(&sidecar)?;
    Ok(())
}

/// Drive a batch to completion with a sleep-per-tick host loop.
fn run_batch(
    scene: &mut MemoryScene,
    snapshots: &mut SnapshotStore,
    request: BatchRequest,
    config: BatchConfig,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let interval = Duration::from_millis(settings.workers.tick_interval_ms.max(1));
    let mut scheduler = Scheduler::new();
    let handle = scheduler.start(scene, request, config)?;

    loop {
        let progress = scheduler.tick(handle, scene, snapshots)?;
        if progress.state.is_terminal() {
            let summary = scheduler.summary(handle)?;
            info!(state = ?progress.state, "batch terminated");
            println!(
                "{}: {}/{} processed ({} ok, {} failed, {} skipped, {} cache hits, {} workers spawned)",
                match progress.state {
                    BatchState::Finished => "finished",
                    BatchState::Cancelled => "cancelled",
                    _ => "terminated",
                },
                progress.processed,
                progress.total,
                summary.succeeded,
                summary.failed,
                summary.skipped,
                summary.cache_hits,
                summary.worker_spawns,
            );
            return Ok(());
        }
        std::thread::sleep(interval);
    }
}

fn parse_category(value: &str) -> Result<ArtifactCategory, String> {
    if value.eq_ignore_ascii_case("camera") {
        return Ok(ArtifactCategory::CameraOptimized);
    }
    value
        .trim_end_matches("px")
        .parse::<u32>()
        .map(ArtifactCategory::Fixed)
        .map_err(|_| format!("not a variant category: {value} (expected a pixel size or `camera`)"))
}

fn print_stats(scene: &MemoryScene) {
    use vantage_scene::stats::{HeatThresholds, format_count};

    let stats = SceneStats::gather(scene);
    println!("meshes:   {}", stats.mesh_count);
    println!("faces:    {}", format_count(stats.total_faces));
    println!("vertices: {}", format_count(stats.total_vertices));
    println!("images:   {}", stats.image_count);
    println!("image memory: {:.2} MB (uncompressed estimate)", stats.image_memory_mb);

    let thresholds = HeatThresholds::default();
    for (name, members) in scene.collections() {
        let verts = scene.collection_vertices(members);
        println!(
            "  collection {:20} {:>8} verts  [{:?}]",
            name,
            format_count(verts),
            thresholds.classify(verts)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category("512").unwrap(), ArtifactCategory::Fixed(512));
        assert_eq!(
            parse_category("1024px").unwrap(),
            ArtifactCategory::Fixed(1024)
        );
        assert_eq!(
            parse_category("camera").unwrap(),
            ArtifactCategory::CameraOptimized
        );
        assert!(parse_category("huge").is_err());
    }
}
