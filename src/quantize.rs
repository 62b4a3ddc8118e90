//! Color quantization: k-means palette + per-pixel label map.
//!
//! 1. Median prefilter on the color channels (optional)
//! 2. Candidate set: pixels above the transparency threshold
//! 3. Weighted k-means over the distinct candidate colors
//! 4. Nearest-centroid assignment for every pixel in the buffer
//!
//! Seeding uses a fixed RNG seed, so identical input always yields
//! identical output.

use std::collections::{HashMap, HashSet};

use image::RgbImage;
use imageproc::filter::median_filter;
use kmeans_colors::get_kmeans;
use palette::Srgb;

use crate::bitmap::{PixelBuffer, NEAR_TRANSPARENT};
use crate::config::QualityProfile;

/// Lloyd iteration budget.
pub const KMEANS_MAX_ITERATIONS: usize = 20;

/// Convergence threshold on centroid movement (channels scaled to 0..1).
const KMEANS_CONVERGE: f32 = 1e-4;

/// Fixed RNG seed: identical input always yields the same palette.
const KMEANS_SEED: u64 = 0;

/// A color centroid, kept in floating point until emission.
pub type Centroid = [f32; 3];

/// Per-pixel palette indices, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<u16>,
}

impl LabelMap {
    fn filled(width: u32, height: u32, label: u16) -> Self {
        Self {
            width,
            height,
            labels: vec![label; width as usize * height as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> u16 {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.labels
    }

    /// Distinct labels present, ascending.
    pub fn distinct(&self) -> Vec<u16> {
        let mut seen = vec![false; self.labels.iter().copied().max().map_or(0, |m| m as usize + 1)];
        for &l in &self.labels {
            seen[l as usize] = true;
        }
        seen.iter()
            .enumerate()
            .filter(|(_, &s)| s)
            .map(|(i, _)| i as u16)
            .collect()
    }
}

/// Quantizer output.
#[derive(Debug, Clone)]
pub struct Quantized {
    pub palette: Vec<Centroid>,
    pub labels: LabelMap,
}

pub fn round_color(c: Centroid) -> [u8; 3] {
    c.map(|v| v.round().clamp(0.0, 255.0) as u8)
}

/// Reduce the buffer to `profile.palette_size` colors.
///
/// Never fails: too few candidate pixels yields a one-entry palette with
/// every pixel labelled 0.
pub fn quantize(buffer: &PixelBuffer, profile: &QualityProfile) -> Quantized {
    let (w, h) = buffer.dimensions();
    let filtered = prefilter(&buffer.rgb, profile.prefilter_radius);

    let mut candidates: Vec<[u8; 3]> = if buffer.has_alpha {
        filtered
            .pixels()
            .zip(buffer.alpha.pixels())
            .filter(|(_, a)| a.0[0] > NEAR_TRANSPARENT)
            .map(|(p, _)| p.0)
            .collect()
    } else {
        Vec::new()
    };
    if candidates.is_empty() {
        candidates = filtered.pixels().map(|p| p.0).collect();
    }

    let k = profile.palette_size.max(1);
    if candidates.len() < k {
        tracing::debug!(
            candidates = candidates.len(),
            palette_size = k,
            "too few candidates, skipping clustering"
        );
        return Quantized {
            palette: vec![mean_color(&candidates)],
            labels: LabelMap::filled(w, h, 0),
        };
    }

    let palette = kmeans(&candidates, k);
    let labels = assign(&filtered, &palette);

    Quantized { palette, labels }
}

/// Median prefilter with window width `radius` (0 and 1 are identity).
fn prefilter(rgb: &RgbImage, radius: u32) -> RgbImage {
    if radius <= 1 {
        return rgb.clone();
    }
    let half = radius / 2;
    median_filter(rgb, half, half)
}

fn mean_color(colors: &[[u8; 3]]) -> Centroid {
    if colors.is_empty() {
        return [0.0; 3];
    }
    let mut sum = [0f64; 3];
    for c in colors {
        for ch in 0..3 {
            sum[ch] += c[ch] as f64;
        }
    }
    let n = colors.len() as f64;
    sum.map(|s| (s / n) as f32)
}

// ── K-means ──────────────────────────────────────────────

/// Lloyd's algorithm via `kmeans_colors`, k-means++ seeded from a fixed seed.
///
/// `k` is capped at the number of distinct colors so every seed lands on
/// a different color.
fn kmeans(candidates: &[[u8; 3]], k: usize) -> Vec<Centroid> {
    let distinct: HashSet<[u8; 3]> = candidates.iter().copied().collect();
    let k = k.min(distinct.len());
    let pixels: Vec<Srgb<f32>> = candidates
        .iter()
        .map(|&[r, g, b]| Srgb::new(r, g, b).into_format())
        .collect();

    let result = get_kmeans(k, KMEANS_MAX_ITERATIONS, KMEANS_CONVERGE, false, &pixels, KMEANS_SEED);
    tracing::debug!(clusters = k, score = result.score, "k-means");
    result
        .centroids
        .iter()
        .map(|c| [c.red * 255.0, c.green * 255.0, c.blue * 255.0])
        .collect()
}

/// Label every pixel with its nearest centroid.
fn assign(rgb: &RgbImage, palette: &[Centroid]) -> LabelMap {
    let (w, h) = rgb.dimensions();
    let mut cache: HashMap<[u8; 3], u16> = HashMap::new();
    let labels = rgb
        .pixels()
        .map(|p| {
            *cache
                .entry(p.0)
                .or_insert_with(|| nearest(palette, &to_f32(p.0)).0 as u16)
        })
        .collect();
    LabelMap {
        width: w,
        height: h,
        labels,
    }
}

/// Index and squared distance of the nearest centroid (ties → lowest index).
fn nearest(centroids: &[Centroid], p: &Centroid) -> (usize, f32) {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(c, p);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    (best, best_dist)
}

fn dist_sq(a: &Centroid, b: &Centroid) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn to_f32(c: [u8; 3]) -> Centroid {
    c.map(|v| v as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Quality, QualityProfile};
    use image::{Rgb, Rgba, RgbaImage};

    fn color(result: &Quantized, index: usize) -> [u8; 3] {
        round_color(result.palette[index])
    }

    fn two_tone(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::from_rgb(RgbImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 255, 0])
            }
        }))
    }

    #[test]
    fn labels_stay_within_palette() {
        let buffer = PixelBuffer::from_rgb(RgbImage::from_fn(32, 32, |x, y| {
            Rgb([(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8])
        }));
        for q in [Quality::Low, Quality::Medium, Quality::High] {
            let profile = QualityProfile::for_quality(q);
            let result = quantize(&buffer, &profile);
            assert!(result.palette.len() <= profile.palette_size);
            assert!(result
                .labels
                .as_slice()
                .iter()
                .all(|&l| (l as usize) < profile.palette_size && (l as usize) < result.palette.len()));
        }
    }

    #[test]
    fn two_colors_get_two_labels() {
        let buffer = two_tone(20, 10);
        let result = quantize(&buffer, &QualityProfile::for_quality(Quality::Low));
        let distinct = result.labels.distinct();
        assert_eq!(distinct.len(), 2);
        let left = result.labels.get(0, 0) as usize;
        let right = result.labels.get(19, 9) as usize;
        assert_eq!(color(&result, left), [255, 0, 0]);
        assert_eq!(color(&result, right), [0, 255, 0]);
    }

    #[test]
    fn deterministic_across_runs() {
        let buffer = PixelBuffer::from_rgb(RgbImage::from_fn(24, 24, |x, y| {
            Rgb([(x * 10) as u8, (y * 10) as u8, 128])
        }));
        let profile = QualityProfile::for_quality(Quality::Medium);
        let a = quantize(&buffer, &profile);
        let b = quantize(&buffer, &profile);
        assert_eq!(a.palette, b.palette);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn transparent_pixels_do_not_claim_palette_entries() {
        // Opaque blue square on a transparent magenta field.
        let img = RgbaImage::from_fn(20, 20, |x, y| {
            if (5..15).contains(&x) && (5..15).contains(&y) {
                Rgba([0, 0, 255, 255])
            } else {
                Rgba([255, 0, 255, 0])
            }
        });
        let buffer = PixelBuffer::from_rgba(&img);
        let profile = QualityProfile {
            palette_size: 1,
            prefilter_radius: 0,
            ..QualityProfile::default()
        };
        let result = quantize(&buffer, &profile);
        assert_eq!(color(&result, 0), [0, 0, 255]);
    }

    #[test]
    fn fully_transparent_falls_back_to_all_pixels() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 0]));
        let buffer = PixelBuffer::from_rgba(&img);
        let result = quantize(&buffer, &QualityProfile::for_quality(Quality::Low));
        assert_eq!(color(&result, result.labels.get(0, 0) as usize), [9, 9, 9]);
    }

    #[test]
    fn too_few_candidates_is_degenerate() {
        let buffer = PixelBuffer::from_rgb(RgbImage::from_fn(3, 2, |x, _| Rgb([x as u8 * 10, 0, 0])));
        let profile = QualityProfile::for_quality(Quality::High);
        let result = quantize(&buffer, &profile);
        assert_eq!(result.palette.len(), 1);
        assert!(result.labels.as_slice().iter().all(|&l| l == 0));
        assert_eq!(color(&result, 0), [10, 0, 0]);
    }

    #[test]
    fn fewer_colors_than_clusters_keeps_each_color() {
        let buffer = PixelBuffer::from_rgb(RgbImage::from_fn(30, 10, |x, _| match x / 10 {
            0 => Rgb([0, 0, 0]),
            1 => Rgb([10, 0, 0]),
            _ => Rgb([255, 255, 255]),
        }));
        let profile = QualityProfile {
            palette_size: 8,
            prefilter_radius: 0,
            ..QualityProfile::default()
        };
        let result = quantize(&buffer, &profile);
        assert_eq!(result.palette.len(), 3);
        assert_eq!(color(&result, result.labels.get(0, 0) as usize), [0, 0, 0]);
        assert_eq!(color(&result, result.labels.get(15, 5) as usize), [10, 0, 0]);
        assert_eq!(color(&result, result.labels.get(29, 9) as usize), [255, 255, 255]);
        assert_eq!(result.labels.distinct().len(), 3);
    }
}
