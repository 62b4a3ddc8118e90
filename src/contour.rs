//! Region segmentation: label map → filtered outer contours.
//!
//! For each palette index present, a binary mask is traced with
//! Suzuki-Abe border following and only outermost borders are kept.
//! Enclosed borders (holes, and islands inside holes) are not extracted.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

use crate::bitmap::NEAR_TRANSPARENT;
use crate::geom::{bounds, signed_area};
use crate::quantize::LabelMap;

/// One surviving region boundary, in pixel coordinates (y=0 is the top row).
#[derive(Debug, Clone)]
pub struct Region {
    /// Closed contour through boundary pixel centers.
    pub points: Vec<(i32, i32)>,
    pub palette_index: usize,
    /// Enclosed area (shoelace, pixel centers).
    pub area: f64,
    /// Mean source alpha over the filled contour, 0-255.
    pub mean_alpha: f64,
}

/// Extract outer contours per palette index, dropping small and
/// near-transparent regions.
///
/// Ordered by palette index, then by discovery order (row-major scan).
pub fn segment(labels: &LabelMap, alpha: &GrayImage, minimum_region_area: u32) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut dropped_small = 0usize;
    let mut dropped_transparent = 0usize;

    for index in labels.distinct() {
        let mask = padded_mask(labels, index);

        for contour in find_contours::<i32>(&mask) {
            if contour.border_type != BorderType::Outer || contour.parent.is_some() {
                continue;
            }
            let points: Vec<(i32, i32)> = contour.points.iter().map(|p| (p.x - 1, p.y - 1)).collect();

            let area = signed_area(&points).abs();
            if area < minimum_region_area as f64 {
                dropped_small += 1;
                continue;
            }

            let mean_alpha = mean_alpha(&points, alpha);
            if mean_alpha < NEAR_TRANSPARENT as f64 {
                dropped_transparent += 1;
                continue;
            }

            tracing::debug!(
                palette_index = index,
                points = points.len(),
                area,
                mean_alpha,
                "region"
            );
            regions.push(Region {
                points,
                palette_index: index as usize,
                area,
                mean_alpha,
            });
        }
    }

    tracing::debug!(
        kept = regions.len(),
        dropped_small,
        dropped_transparent,
        "segmentation"
    );
    regions
}

/// Binary mask of `index` inside a one-pixel zero frame.
///
/// Border following only starts a border after a background pixel, so
/// without the frame a region touching column 0 is never traced.
fn padded_mask(labels: &LabelMap, index: u16) -> GrayImage {
    let (w, h) = labels.dimensions();
    let mut mask = GrayImage::new(w + 2, h + 2);
    for y in 0..h {
        for x in 0..w {
            if labels.get(x, y) == index {
                mask.put_pixel(x + 1, y + 1, Luma([255]));
            }
        }
    }
    mask
}

/// Mean alpha over the pixels covered by the filled contour (boundary included).
///
/// Rasterizes into a mask the size of the contour's bounding box only.
pub fn mean_alpha(points: &[(i32, i32)], alpha: &GrayImage) -> f64 {
    let Some((min_x, min_y, max_x, max_y)) = bounds(points) else {
        return 0.0;
    };
    let bw = (max_x - min_x + 1) as u32;
    let bh = (max_y - min_y + 1) as u32;
    let mut fill = GrayImage::new(bw, bh);

    let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let p = Point::new(x - min_x, y - min_y);
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    if poly.len() < 3 {
        for p in &poly {
            fill.put_pixel(p.x as u32, p.y as u32, Luma([255]));
        }
    } else {
        draw_polygon_mut(&mut fill, &poly, Luma([255]));
    }

    let (aw, ah) = alpha.dimensions();
    let mut sum = 0u64;
    let mut count = 0u64;
    for (x, y, p) in fill.enumerate_pixels() {
        if p.0[0] == 0 {
            continue;
        }
        let sx = x as i32 + min_x;
        let sy = y as i32 + min_y;
        if sx < 0 || sy < 0 || sx as u32 >= aw || sy as u32 >= ah {
            continue;
        }
        sum += alpha.get_pixel(sx as u32, sy as u32).0[0] as u64;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::PixelBuffer;
    use crate::config::QualityProfile;
    use crate::quantize::quantize;
    use image::{Rgb, RgbImage};

    fn labels_for(rgb: RgbImage) -> (LabelMap, GrayImage) {
        let buffer = PixelBuffer::from_rgb(rgb);
        let profile = QualityProfile {
            palette_size: 8,
            prefilter_radius: 0,
            minimum_region_area: 1,
            simplify_tolerance: 0.01,
        };
        (quantize(&buffer, &profile).labels, buffer.alpha)
    }

    #[test]
    fn full_canvas_is_one_region() {
        let (labels, alpha) = labels_for(RgbImage::from_pixel(30, 20, Rgb([200, 10, 10])));
        let regions = segment(&labels, &alpha, 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 29.0 * 19.0);
        assert_eq!(regions[0].mean_alpha, 255.0);
    }

    #[test]
    fn small_regions_are_dropped() {
        // 3x3 dot (area 4) on a 40x40 field.
        let (labels, alpha) = labels_for(RgbImage::from_fn(40, 40, |x, y| {
            if (10..13).contains(&x) && (10..13).contains(&y) {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let regions = segment(&labels, &alpha, 5);
        assert_eq!(regions.len(), 1);
        assert!(regions.iter().all(|r| r.area >= 5.0));

        let regions = segment(&labels, &alpha, 4);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn holes_are_not_extracted() {
        // White ring with a black core: the ring yields one outer contour only.
        let (labels, alpha) = labels_for(RgbImage::from_fn(30, 30, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let white = labels.get(0, 0) as usize;
        let regions = segment(&labels, &alpha, 1);
        let white_regions: Vec<_> = regions.iter().filter(|r| r.palette_index == white).collect();
        assert_eq!(white_regions.len(), 1);
        assert_eq!(white_regions[0].area, 29.0 * 29.0);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn regions_ordered_by_palette_index() {
        let (labels, alpha) = labels_for(RgbImage::from_fn(40, 20, |x, _| {
            if x < 20 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        }));
        let regions = segment(&labels, &alpha, 1);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].palette_index < regions[1].palette_index);
    }

    #[test]
    fn regions_touching_each_edge_are_traced() {
        // Four bars, one hugging each side of the canvas.
        let (labels, alpha) = labels_for(RgbImage::from_fn(40, 40, |x, y| {
            if x < 5 {
                Rgb([255, 0, 0])
            } else if x >= 35 {
                Rgb([0, 255, 0])
            } else if y < 5 {
                Rgb([0, 0, 255])
            } else if y >= 35 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let regions = segment(&labels, &alpha, 1);
        assert_eq!(regions.len(), 5);

        let left = labels.get(0, 20) as usize;
        let left_region = regions.iter().find(|r| r.palette_index == left).unwrap();
        assert_eq!(bounds(&left_region.points), Some((0, 0, 4, 39)));
        assert_eq!(left_region.area, 4.0 * 39.0);

        let bottom = labels.get(20, 39) as usize;
        let bottom_region = regions.iter().find(|r| r.palette_index == bottom).unwrap();
        assert_eq!(bounds(&bottom_region.points), Some((5, 35, 34, 39)));
    }

    #[test]
    fn contour_points_stay_on_canvas() {
        let (labels, alpha) = labels_for(RgbImage::from_pixel(12, 7, Rgb([9, 9, 9])));
        let regions = segment(&labels, &alpha, 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(bounds(&regions[0].points), Some((0, 0, 11, 6)));
    }

    #[test]
    fn mean_alpha_covers_filled_interior() {
        let alpha = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 0 } else { 200 }]));
        let left = [(0, 0), (4, 0), (4, 9), (0, 9)];
        let right = [(5, 0), (9, 0), (9, 9), (5, 9)];
        assert_eq!(mean_alpha(&left, &alpha), 0.0);
        assert_eq!(mean_alpha(&right, &alpha), 200.0);
        let both = [(0, 0), (9, 0), (9, 9), (0, 9)];
        assert!((mean_alpha(&both, &alpha) - 100.0).abs() < 1e-9);
    }
}
