//! Image analysis for automatic profile selection.
//!
//! Measures edge density (Canny) and hue variance (HSV) and maps them
//! through a fixed decision table to a recommended quality level,
//! palette size, and simplification tolerance. Purely advisory.

use std::fmt;

use image::{GrayImage, Luma};
use imageproc::edges::canny;
use palette::{Hsv, IntoColor, Srgb};
use serde::Serialize;

use crate::bitmap::PixelBuffer;
use crate::config::{Quality, QualityProfile};

/// Images with more pixels than this use the large-image thresholds.
pub const LARGE_IMAGE_PIXELS: usize = 1_000_000;

const CANNY_LOW: f32 = 100.0;
const CANNY_HIGH: f32 = 200.0;

/// Hue range used for the variance normalization (half-degree units).
const HUE_RANGE: f64 = 180.0;

/// Analyzer output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recommendation {
    pub quality: Quality,
    pub palette_size: usize,
    pub simplify_tolerance: f64,
    /// Fraction of pixels flagged as edges.
    pub edge_density: f64,
    /// Hue variance normalized by the hue range.
    pub hue_variance: f64,
}

impl Recommendation {
    /// Base profile for the recommended quality, with palette size and
    /// tolerance overridden.
    pub fn to_profile(&self) -> QualityProfile {
        QualityProfile::for_quality(self.quality)
            .with_palette_size(self.palette_size)
            .with_simplify_tolerance(self.simplify_tolerance)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Edge density    {:.4}", self.edge_density)?;
        writeln!(f, "  Hue variance    {:.4}", self.hue_variance)?;
        writeln!(f, "  Quality         {}", self.quality)?;
        writeln!(f, "  Colors          {}", self.palette_size)?;
        writeln!(f, "  Simplify        {:.4}", self.simplify_tolerance)
    }
}

/// Analyze a buffer and recommend settings.
pub fn analyze(buffer: &PixelBuffer) -> Recommendation {
    let edge_density = edge_density(buffer);
    let hue_variance = hue_variance(buffer);
    let recommendation = recommend(buffer.pixel_count(), edge_density, hue_variance);
    tracing::debug!(
        edge_density,
        hue_variance,
        quality = %recommendation.quality,
        palette_size = recommendation.palette_size,
        "analysis"
    );
    recommendation
}

/// Fixed decision table.
pub fn recommend(pixel_count: usize, edge_density: f64, hue_variance: f64) -> Recommendation {
    let scaled = |base: f64, cap: usize| cap.min((base + hue_variance * base) as usize);

    let (quality, palette_size) = if pixel_count > LARGE_IMAGE_PIXELS {
        if edge_density > 0.05 || hue_variance > 0.1 {
            (Quality::High, scaled(32.0, 48))
        } else {
            (Quality::Medium, scaled(24.0, 32))
        }
    } else if edge_density > 0.08 || hue_variance > 0.15 {
        (Quality::Medium, scaled(24.0, 32))
    } else {
        (Quality::Low, scaled(16.0, 24))
    };

    let simplify_tolerance = (0.005 - edge_density * 0.03).clamp(0.001, 0.01);

    Recommendation {
        quality,
        palette_size: palette_size.max(1),
        simplify_tolerance,
        edge_density,
        hue_variance,
    }
}

/// Fraction of pixels marked by the Canny detector.
pub fn edge_density(buffer: &PixelBuffer) -> f64 {
    let count = buffer.pixel_count();
    if count == 0 {
        return 0.0;
    }
    let (w, h) = buffer.dimensions();
    let gray = GrayImage::from_fn(w, h, |x, y| {
        let [r, g, b] = buffer.rgb.get_pixel(x, y).0;
        Luma([luma(r, g, b)])
    });
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let flagged = edges.pixels().filter(|p| p.0[0] > 0).count();
    flagged as f64 / count as f64
}

/// Population variance of the hue channel (0..180 scale) divided by 180.
pub fn hue_variance(buffer: &PixelBuffer) -> f64 {
    let count = buffer.pixel_count();
    if count == 0 {
        return 0.0;
    }
    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    for p in buffer.rgb.pixels() {
        let h = hue(p.0);
        sum += h;
        sum_sq += h * h;
    }
    let n = count as f64;
    let mean = sum / n;
    ((sum_sq / n - mean * mean).max(0.0)) / HUE_RANGE
}

/// HSV hue in half-degrees, `[0, 180)`. Achromatic pixels have hue 0.
fn hue([r, g, b]: [u8; 3]) -> f64 {
    let hsv: Hsv = Srgb::new(r, g, b).into_format::<f32>().into_color();
    let degrees = hsv.hue.into_positive_degrees() as f64;
    (degrees / 2.0).round() % HUE_RANGE
}

/// ITU-R BT.601 luma.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn flat_image_has_no_edges_or_hue_spread() {
        let buffer = PixelBuffer::from_rgb(RgbImage::from_pixel(64, 64, Rgb([30, 120, 200])));
        assert_eq!(edge_density(&buffer), 0.0);
        assert_eq!(hue_variance(&buffer), 0.0);
        let rec = analyze(&buffer);
        assert_eq!(rec.quality, Quality::Low);
        assert_eq!(rec.palette_size, 16);
        assert!((rec.simplify_tolerance - 0.005).abs() < 1e-12);
    }

    #[test]
    fn checkerboard_is_edgy() {
        let buffer = PixelBuffer::from_rgb(RgbImage::from_fn(64, 64, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        assert!(edge_density(&buffer) > 0.08);
        assert_eq!(analyze(&buffer).quality, Quality::Medium);
    }

    #[test]
    fn hue_matches_hsv_half_degrees() {
        assert_eq!(hue([255, 0, 0]), 0.0);
        assert_eq!(hue([0, 255, 0]), 60.0);
        assert_eq!(hue([0, 0, 255]), 120.0);
        assert_eq!(hue([128, 128, 128]), 0.0);
        assert_eq!(hue([255, 255, 0]), 30.0);
        assert_eq!(hue([255, 0, 255]), 150.0);
    }

    #[test]
    fn decision_table() {
        let small_plain = recommend(10_000, 0.01, 0.0);
        assert_eq!(small_plain.quality, Quality::Low);

        let small_busy = recommend(10_000, 0.09, 0.5);
        assert_eq!(small_busy.quality, Quality::Medium);
        assert_eq!(small_busy.palette_size, 32);

        let large_plain = recommend(2_000_000, 0.01, 0.05);
        assert_eq!(large_plain.quality, Quality::Medium);
        assert_eq!(large_plain.palette_size, 25);

        let large_busy = recommend(2_000_000, 0.2, 2.0);
        assert_eq!(large_busy.quality, Quality::High);
        assert_eq!(large_busy.palette_size, 48);
    }

    #[test]
    fn tolerance_is_clamped() {
        assert_eq!(recommend(1, 1.0, 0.0).simplify_tolerance, 0.001);
        assert_eq!(recommend(1, 0.0, 0.0).simplify_tolerance, 0.005);
        assert!(recommend(1, 0.05, 0.0).simplify_tolerance < 0.005);
    }

    #[test]
    fn recommendation_feeds_profile() {
        let rec = recommend(10_000, 0.0, 0.25);
        let profile = rec.to_profile();
        assert_eq!(profile.palette_size, rec.palette_size);
        assert_eq!(profile.simplify_tolerance, rec.simplify_tolerance);
        assert_eq!(
            profile.minimum_region_area,
            QualityProfile::for_quality(rec.quality).minimum_region_area
        );
        assert!(profile.validate().is_ok());
    }
}
