use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::background::BackgroundSpec;
use crate::error::ConvertError;
use crate::optimize::OptimizeConfig;

/// Largest palette the clusterer can index (cluster ids are `u8`).
pub const MAX_PALETTE_SIZE: usize = 256;

/// Named quality levels. Each maps to a fixed [`QualityProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    /// Resolve a quality keyword. Unknown keywords fall back to `Medium`.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "low" => Quality::Low,
            "high" => Quality::High,
            _ => Quality::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All parameters controlling clustering and simplification for one run.
///
/// Serializable so presets can be saved and reloaded as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    // -- Quantizer --
    /// Number of palette entries (k-means clusters).
    pub palette_size: usize,
    /// Median prefilter window width in pixels. 0 disables the prefilter,
    /// 1 is an identity window.
    pub prefilter_radius: u32,

    // -- Segmenter --
    /// Minimum enclosed contour area in pixels (filter speckles).
    pub minimum_region_area: u32,

    // -- Simplifier --
    /// Douglas-Peucker tolerance as a fraction of each contour's perimeter.
    pub simplify_tolerance: f64,
}

impl QualityProfile {
    /// Fixed lookup table for the named quality levels.
    pub fn for_quality(quality: Quality) -> Self {
        match quality {
            Quality::Low => Self {
                palette_size: 12,
                prefilter_radius: 5,
                minimum_region_area: 100,
                simplify_tolerance: 0.01,
            },
            Quality::Medium => Self {
                palette_size: 24,
                prefilter_radius: 3,
                minimum_region_area: 50,
                simplify_tolerance: 0.005,
            },
            Quality::High => Self {
                palette_size: 32,
                prefilter_radius: 1,
                minimum_region_area: 20,
                simplify_tolerance: 0.002,
            },
        }
    }

    pub fn from_keyword(keyword: &str) -> Self {
        Self::for_quality(Quality::from_keyword(keyword))
    }

    pub fn with_palette_size(mut self, palette_size: usize) -> Self {
        self.palette_size = palette_size;
        self
    }

    pub fn with_simplify_tolerance(mut self, simplify_tolerance: f64) -> Self {
        self.simplify_tolerance = simplify_tolerance;
        self
    }

    /// Reject profiles the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.palette_size == 0 {
            return Err(ConvertError::InvalidProfile(
                "palette_size must be at least 1".into(),
            ));
        }
        if self.palette_size > MAX_PALETTE_SIZE {
            return Err(ConvertError::InvalidProfile(format!(
                "palette_size must be at most {}",
                MAX_PALETTE_SIZE
            )));
        }
        if !(self.simplify_tolerance.is_finite() && self.simplify_tolerance > 0.0) {
            return Err(ConvertError::InvalidProfile(format!(
                "simplify_tolerance must be a positive fraction, got {}",
                self.simplify_tolerance
            )));
        }
        if self.minimum_region_area == 0 {
            return Err(ConvertError::InvalidProfile(
                "minimum_region_area must be at least 1".into(),
            ));
        }
        if self.prefilter_radius != 0 && self.prefilter_radius % 2 == 0 {
            return Err(ConvertError::InvalidProfile(format!(
                "prefilter_radius must be 0 or odd, got {}",
                self.prefilter_radius
            )));
        }
        Ok(())
    }

    /// Load and validate a JSON preset.
    pub fn from_json_file(path: &Path) -> Result<Self, ConvertError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConvertError::Preset(format!("{}: {}", path.display(), e)))?;
        let profile: Self = serde_json::from_str(&text)
            .map_err(|e| ConvertError::Preset(format!("{}: {}", path.display(), e)))?;
        profile.validate()?;
        Ok(profile)
    }
}

/// The `medium` profile, same as an unrecognized quality keyword.
///
/// A conversion run defaults to `high` instead; see [`ConvertConfig`].
impl Default for QualityProfile {
    fn default() -> Self {
        Self::for_quality(Quality::default())
    }
}

/// Everything one conversion run needs, passed explicitly down the pipeline.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Profile used unless `auto_profile` is set.
    pub profile: QualityProfile,
    /// Derive the profile from the image itself (edge density, hue variance).
    pub auto_profile: bool,
    /// Composite the image over this background before vectorizing.
    pub background: Option<BackgroundSpec>,
    /// Sharpen the color channels after compositing.
    pub enhance: bool,
    /// Explicit output path. `None` writes `<input stem>.svg` beside the input.
    pub output: Option<PathBuf>,
    /// Post-emission minification.
    pub optimize: OptimizeConfig,
}

/// Runs at the `high` profile, the tool's default, rather than
/// [`QualityProfile::default()`] (`medium`, the keyword fallback).
impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            profile: QualityProfile::for_quality(Quality::High),
            auto_profile: false,
            background: None,
            enhance: false,
            output: None,
            optimize: OptimizeConfig::default(),
        }
    }
}

impl ConvertConfig {
    pub fn with_quality(quality: Quality) -> Self {
        Self {
            profile: QualityProfile::for_quality(quality),
            ..Self::default()
        }
    }
}
