//! The worker subprocess.
//!
//! Speaks the fixed CLI contract the pool relies on:
//! `vantage-worker --src <path> --dst <path> --size <int> --action RESIZE|COPY`.
//! Prints a literal `SUCCESS` line on stdout when the artifact was written;
//! anything else on stdout is diagnostic. Exit codes: 0 success, 1 generic
//! processing error, 2 missing runtime dependency (e.g. codec support).

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use image::ImageError;
use image::imageops::FilterType;

/// Action the worker performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Aspect-preserving downscale.
    #[value(name = "RESIZE")]
    Resize,
    /// Byte-identical copy, no re-encode.
    #[value(name = "COPY")]
    Copy,
}

/// Image transcode worker for Vantage.
#[derive(Parser, Debug)]
#[command(name = "vantage-worker", about = "Vantage image worker")]
struct WorkerArgs {
    /// Source image path.
    #[arg(long)]
    src: PathBuf,

    /// Destination image path.
    #[arg(long)]
    dst: PathBuf,

    /// Target size in pixels.
    #[arg(long, default_value_t = 1024)]
    size: u32,

    /// Action to perform.
    #[arg(long, value_enum, default_value = "RESIZE")]
    action: Action,
}

#[derive(Debug)]
enum WorkerFailure {
    Io(std::io::Error),
    Image(ImageError),
}

impl WorkerFailure {
    fn exit_code(&self) -> i32 {
        match self {
            // No decoder/encoder for this format: the runtime dependency
            // (codec support) is missing, which callers treat differently
            // from a corrupt file.
            WorkerFailure::Image(ImageError::Unsupported(_)) => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerFailure::Io(err) => write!(f, "{err}"),
            WorkerFailure::Image(err) => write!(f, "{err}"),
        }
    }
}

impl From<std::io::Error> for WorkerFailure {
    fn from(err: std::io::Error) -> Self {
        WorkerFailure::Io(err)
    }
}

impl From<ImageError> for WorkerFailure {
    fn from(err: ImageError) -> Self {
        WorkerFailure::Image(err)
    }
}

fn main() {
    let args = WorkerArgs::parse();
    match run(&args) {
        Ok(()) => println!("SUCCESS"),
        Err(err) => {
            // Diagnostics go to stdout so the supervisor captures them even
            // when stderr is swallowed by the host.
            println!("ERROR: {err}");
            std::process::exit(err.exit_code());
        }
    }
}

fn run(args: &WorkerArgs) -> Result<(), WorkerFailure> {
    match args.action {
        Action::Copy => copy_file(&args.src, &args.dst),
        Action::Resize => resize_file(&args.src, &args.dst, args.size),
    }
}

/// Byte-identical copy; used for formats that must not be re-encoded.
fn copy_file(src: &Path, dst: &Path) -> Result<(), WorkerFailure> {
    if !same_path(src, dst) {
        std::fs::copy(src, dst)?;
    }
    Ok(())
}

fn resize_file(src: &Path, dst: &Path, size: u32) -> Result<(), WorkerFailure> {
    let img = image::open(src)?;
    let (width, height) = (img.width(), img.height());

    // Never upscale: a source already within the target is copied as-is.
    if width <= size && height <= size {
        return copy_file(src, dst);
    }

    let ratio = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_width = ((width as f32 * ratio) as u32).max(1);
    let new_height = ((height as f32 * ratio) as u32).max(1);
    let resized = img.resize(new_width, new_height, FilterType::Lanczos3);

    match extension_of(dst).as_deref() {
        Some("jpg") | Some("jpeg") => {
            // JPEG has no alpha; composite onto white so transparent areas
            // do not turn black.
            let rgb = flatten_onto_white(&resized.to_rgba8());
            let mut out = std::io::BufWriter::new(std::fs::File::create(dst)?);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95);
            rgb.write_with_encoder(encoder)?;
        }
        Some("png") => {
            // Keep the alpha channel intact.
            resized.to_rgba8().save(dst)?;
        }
        _ => {
            resized.save(dst)?;
        }
    }

    Ok(())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn same_path(a: &Path, b: &Path) -> bool {
    let norm = |p: &Path| std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
    norm(a) == norm(b)
}

fn flatten_onto_white(rgba: &image::RgbaImage) -> image::RgbImage {
    let mut rgb = image::RgbImage::new(rgba.width(), rgba.height());
    for (out, px) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = px[3] as u32;
        for c in 0..3 {
            let blended = (px[c] as u32 * alpha + 255 * (255 - alpha)) / 255;
            out[c] = blended as u8;
        }
    }
    rgb
}
