//! img2svg: background-removed raster images → compact SVG paths.
//!
//! Quantizes colors with k-means, segments the label map into
//! same-color regions, traces and simplifies their outer boundaries,
//! and emits one filled `<path>` per region.
//!
//! # Example
//!
//! ```no_run
//! use img2svg::{convert, ConvertConfig, Quality};
//! use std::path::Path;
//!
//! let config = ConvertConfig::with_quality(Quality::Medium);
//! let result = convert(Path::new("logo.png"), &config)?;
//! println!("{} paths → {}", result.document.records.len(), result.svg_path.display());
//! # Ok::<(), img2svg::ConvertError>(())
//! ```

#![forbid(unsafe_code)]

mod geom;

pub mod analyze;
pub mod background;
pub mod bitmap;
pub mod config;
pub mod contour;
pub mod error;
pub mod optimize;
pub mod output;
pub mod quantize;
pub mod render;
pub mod simplify;

// Re-export kurbo so downstream users get the same version
// used by VectorRecord.path.
pub use kurbo;

pub use analyze::{analyze, Recommendation};
pub use background::{BackgroundModel, BackgroundRemover, BackgroundSpec};
pub use bitmap::PixelBuffer;
pub use config::{ConvertConfig, Quality, QualityProfile};
pub use error::{BackgroundError, ConvertError};
pub use optimize::{OptimizeConfig, OptimizeOutcome, Provider};
pub use simplify::VectorRecord;

use std::path::{Path, PathBuf};
use std::time::Instant;

/// In-memory result of vectorizing one buffer.
#[derive(Debug, Clone)]
pub struct Vectorized {
    pub width: u32,
    pub height: u32,
    /// Whether the source carried transparency (no background plate).
    pub has_alpha: bool,
    /// Records in paint order.
    pub records: Vec<VectorRecord>,
}

impl Vectorized {
    /// Serialize to an SVG file at `path`.
    pub fn write_svg(&self, path: &Path) -> std::io::Result<()> {
        output::svg::write(path, self.width, self.height, self.has_alpha, &self.records)
    }
}

/// Summary of one file conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub svg_path: PathBuf,
    pub profile: QualityProfile,
    /// The emitted document, before minification.
    pub document: Vectorized,
    pub optimize: OptimizeOutcome,
}

/// Core pipeline on a decoded buffer: quantize → segment → simplify.
///
/// Pure computation; the only failure is an invalid profile.
pub fn vectorize(buffer: &PixelBuffer, profile: &QualityProfile) -> Result<Vectorized, ConvertError> {
    profile.validate()?;
    let (width, height) = buffer.dimensions();

    // ── Quantize ──────────────────────────────────────────
    let quantized = quantize::quantize(buffer, profile);
    let distinct = quantized.labels.distinct().len();
    tracing::info!(
        "Quantize    {} colors requested, {} used",
        profile.palette_size,
        distinct
    );

    // ── Segment ───────────────────────────────────────────
    let regions = contour::segment(&quantized.labels, &buffer.alpha, profile.minimum_region_area);
    tracing::info!(
        "Segment     {} regions (min area {} px)",
        regions.len(),
        profile.minimum_region_area
    );

    // ── Simplify ──────────────────────────────────────────
    let records = simplify::vectorize(&regions, &quantized.palette, profile.simplify_tolerance);
    let raw_points: usize = regions.iter().map(|r| r.points.len()).sum();
    let kept_points: usize = records.iter().map(|r| r.vertices().len()).sum();
    tracing::info!(
        "Simplify    {} \u{2192} {} points (tolerance {})",
        raw_points,
        kept_points,
        profile.simplify_tolerance
    );

    Ok(Vectorized {
        width,
        height,
        has_alpha: buffer.has_alpha,
        records,
    })
}

/// Full pipeline: image path → SVG file beside it (or at `config.output`).
///
/// Nothing is written unless the image decodes. Minification is
/// best-effort and never turns a successful conversion into a failure.
pub fn convert(input: &Path, config: &ConvertConfig) -> Result<Conversion, ConvertError> {
    let t_start = Instant::now();

    // ── Load ──────────────────────────────────────────────
    let mut buffer = bitmap::load(input)?;
    let (w, h) = buffer.dimensions();
    tracing::info!(
        "Load        {}x{} px, {}",
        w,
        h,
        if buffer.has_alpha { "alpha" } else { "opaque" }
    );

    if let Some(spec) = &config.background {
        buffer = background::composite(&buffer, spec);
        tracing::info!("Background  {:?}", spec);
    }
    if config.enhance {
        buffer = background::sharpen(&buffer);
        tracing::info!("Enhance     3x3 sharpen");
    }

    let profile = if config.auto_profile {
        let recommendation = analyze::analyze(&buffer);
        tracing::info!(
            "Analyze     edges {:.4}, hue var {:.4} \u{2192} {} ({} colors)",
            recommendation.edge_density,
            recommendation.hue_variance,
            recommendation.quality,
            recommendation.palette_size
        );
        recommendation.to_profile()
    } else {
        config.profile
    };

    let result = vectorize(&buffer, &profile)?;

    // ── Emit ──────────────────────────────────────────────
    let svg_path = output_path(input, config.output.as_deref());
    result.write_svg(&svg_path)?;

    let optimize = optimize::optimize_file(&svg_path, &config.optimize);

    tracing::info!(
        "Result      {} paths \u{00b7} {}  ({}ms)",
        result.records.len(),
        svg_path.display(),
        t_start.elapsed().as_millis()
    );

    Ok(Conversion {
        svg_path,
        profile,
        document: result,
        optimize,
    })
}

/// `explicit`, or the input path with an `.svg` extension.
pub fn output_path(input: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("svg"),
    }
}

/// Convert every file in `dir` whose name matches `pattern`.
///
/// Files are processed one at a time in name order. A file that fails
/// is logged and skipped; only an unreadable directory is an error.
/// `config.output` is ignored: each SVG lands beside its source.
pub fn batch_convert(
    dir: &Path,
    pattern: &str,
    config: &ConvertConfig,
) -> Result<Vec<PathBuf>, ConvertError> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| wildcard_match(pattern, name));
        if matches && path.is_file() {
            inputs.push(path);
        }
    }
    inputs.sort();
    tracing::info!("Batch       {} files match {}", inputs.len(), pattern);

    let per_file = ConvertConfig {
        output: None,
        ..config.clone()
    };
    let mut outputs = Vec::with_capacity(inputs.len());
    for input in &inputs {
        tracing::info!("Convert     {}", input.display());
        match convert(input, &per_file) {
            Ok(conversion) => outputs.push(conversion.svg_path),
            Err(e) => tracing::warn!("Skipped     {}: {}", input.display(), e),
        }
    }
    tracing::info!("Batch       {} of {} converted", outputs.len(), inputs.len());
    Ok(outputs)
}

/// Glob-style match of a whole file name: `*` any run, `?` one char.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
