//! Polygon simplification and opacity sampling: regions → vector records.
//!
//! Per region:
//! 1. Absolute tolerance = relative tolerance × closed perimeter
//! 2. Douglas-Peucker on the closed ring (vertices stay a subset)
//! 3. Opacity from the region's mean source alpha

use geo::Simplify;
use kurbo::{BezPath, PathEl, Point};

use crate::contour::Region;
use crate::geom::{closed_ring, perimeter};
use crate::quantize::{round_color, Centroid};

/// Upper bound on emitted opacity.
pub const MAX_OPACITY: f64 = 0.99;

/// One filled, simplified shape ready for emission.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Closed polygon: one MoveTo, LineTos, ClosePath.
    pub path: BezPath,
    pub fill: [u8; 3],
    /// In `[0, MAX_OPACITY]`.
    pub opacity: f64,
}

impl VectorRecord {
    /// Polygon vertices in drawing order.
    pub fn vertices(&self) -> Vec<Point> {
        self.path
            .elements()
            .iter()
            .filter_map(|el| match *el {
                PathEl::MoveTo(p) | PathEl::LineTo(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

/// Simplify every region and attach its palette color and opacity.
pub fn vectorize(regions: &[Region], palette: &[Centroid], tolerance: f64) -> Vec<VectorRecord> {
    regions
        .iter()
        .map(|region| to_record(region, palette[region.palette_index], tolerance))
        .collect()
}

fn to_record(region: &Region, color: Centroid, tolerance: f64) -> VectorRecord {
    let epsilon = tolerance * perimeter(&region.points);
    let polygon = simplify_closed(&region.points, epsilon);
    VectorRecord {
        path: polygon_to_path(&polygon),
        fill: round_color(color),
        opacity: opacity(region.mean_alpha),
    }
}

/// `min(MAX_OPACITY, alpha / 255)`, clamped at zero.
pub fn opacity(mean_alpha: f64) -> f64 {
    (mean_alpha / 255.0).clamp(0.0, MAX_OPACITY)
}

/// Douglas-Peucker on a closed contour.
///
/// The ring is closed by repeating the first point, simplified, and the
/// closing duplicate dropped again. Every kept vertex is an original point
/// and no original point lies farther than `epsilon` from the result.
pub fn simplify_closed(points: &[(i32, i32)], epsilon: f64) -> Vec<(i32, i32)> {
    if points.len() <= 3 || epsilon <= 0.0 {
        return points.to_vec();
    }
    let simplified = closed_ring(points).simplify(&epsilon);
    let mut out: Vec<(i32, i32)> = simplified
        .into_inner()
        .into_iter()
        .map(|c| (c.x.round() as i32, c.y.round() as i32))
        .collect();
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Convert polygon vertices to a closed line-segment BezPath.
fn polygon_to_path(points: &[(i32, i32)]) -> BezPath {
    let mut path = BezPath::new();
    if let Some(&(x, y)) = points.first() {
        path.move_to(Point::new(x as f64, y as f64));
        for &(x, y) in &points[1..] {
            path.line_to(Point::new(x as f64, y as f64));
        }
        path.push(PathEl::ClosePath);
    }
    path
}
