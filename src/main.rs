use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use img2svg::{
    BackgroundSpec, ConvertConfig, OptimizeOutcome, Provider, Quality, QualityProfile,
};

#[derive(Parser)]
#[command(name = "img2svg", version, about = "Raster image to compact SVG paths")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one image to SVG
    Convert {
        /// Input image path (PNG, JPEG, BMP, WebP)
        input: PathBuf,

        /// Output SVG path (defaults to <input>.svg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quality level: low, medium, high
        #[arg(short, long, default_value = "high")]
        quality: String,

        /// Pick quality, colors and tolerance from the image itself
        #[arg(long, conflicts_with_all = ["preset", "quality", "colors"])]
        auto: bool,

        /// JSON quality profile (overrides --quality)
        #[arg(long)]
        preset: Option<PathBuf>,

        /// Palette size override
        #[arg(long)]
        colors: Option<usize>,

        /// Background to composite behind transparency:
        /// "#rrggbb" or "linear-gradient(#rrggbb, #rrggbb)"
        #[arg(long)]
        background: Option<String>,

        /// Sharpen the image before vectorizing
        #[arg(long)]
        enhance: bool,

        /// Minifiers to try, in order (svgo, scour, compact)
        #[arg(long, value_delimiter = ',', default_value = "svgo,scour")]
        minifier: Vec<Provider>,

        /// Skip minification
        #[arg(long)]
        no_optimize: bool,

        /// Also rasterize the result to this PNG
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// Convert every matching image in a directory
    Batch {
        dir: PathBuf,

        /// File name pattern (* and ? wildcards)
        #[arg(short, long, default_value = "*.png")]
        pattern: String,

        /// Quality level: low, medium, high
        #[arg(short, long, default_value = "high")]
        quality: String,
    },

    /// Recommend settings for an image
    Analyze {
        input: PathBuf,

        /// Print the recommendation as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match Cli::parse().command {
        Command::Convert {
            input,
            output,
            quality,
            auto,
            preset,
            colors,
            background,
            enhance,
            minifier,
            no_optimize,
            preview,
        } => {
            let mut profile = match &preset {
                Some(path) => QualityProfile::from_json_file(path)?,
                None => QualityProfile::for_quality(parse_quality(&quality)),
            };
            if let Some(n) = colors {
                profile = profile.with_palette_size(n);
            }

            let mut config = ConvertConfig {
                profile,
                auto_profile: auto,
                output,
                ..ConvertConfig::default()
            };
            if let Some(spec) = &background {
                config.background = Some(BackgroundSpec::parse(spec)?);
            }
            config.enhance = enhance;
            config.optimize.enabled = !no_optimize;
            config.optimize.providers = minifier;

            eprintln!();
            eprintln!("  img2svg \u{00b7} {}", input.display());
            eprintln!();

            let conversion = img2svg::convert(&input, &config)
                .with_context(|| format!("converting {}", input.display()))?;

            match &conversion.optimize {
                OptimizeOutcome::Optimized { provider, before, after } => {
                    eprintln!("  Minified    {} \u{2192} {} bytes ({})", before, after, provider)
                }
                OptimizeOutcome::Degraded { attempts } => {
                    for (tool, err) in attempts {
                        eprintln!("  Minify      {}: {}", tool, err);
                    }
                }
                OptimizeOutcome::Disabled => {}
            }

            if let Some(png_path) = &preview {
                write_preview(&conversion.document, png_path)?;
                eprintln!("  Preview     {}", png_path.display());
            }

            eprintln!();
            eprintln!("  \u{2713} {}", conversion.svg_path.display());
            eprintln!();
        }

        Command::Batch { dir, pattern, quality } => {
            let config = ConvertConfig::with_quality(parse_quality(&quality));
            let outputs = img2svg::batch_convert(&dir, &pattern, &config)
                .with_context(|| format!("reading {}", dir.display()))?;
            eprintln!();
            for path in &outputs {
                eprintln!("  \u{2713} {}", path.display());
            }
            eprintln!();
        }

        Command::Analyze { input, json } => {
            let buffer = img2svg::bitmap::load(&input)?;
            let recommendation = img2svg::analyze(&buffer);
            if json {
                println!("{}", serde_json::to_string_pretty(&recommendation)?);
            } else {
                print!("{}", recommendation);
            }
        }
    }

    Ok(())
}

fn parse_quality(keyword: &str) -> Quality {
    let quality = Quality::from_keyword(keyword);
    if quality.as_str() != keyword.trim().to_ascii_lowercase() {
        tracing::warn!("unknown quality {:?}, using {}", keyword, quality);
    }
    quality
}

fn write_preview(document: &img2svg::Vectorized, path: &Path) -> anyhow::Result<()> {
    let Some(pixmap) =
        img2svg::render::rasterize(document.width, document.height, document.has_alpha, &document.records)
    else {
        bail!("cannot render an empty {}x{} canvas", document.width, document.height);
    };
    img2svg::render::save_png(&pixmap, path)
        .with_context(|| format!("writing {}", path.display()))
}
