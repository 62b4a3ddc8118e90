//! Shared geometry utilities for closed integer polygons.

use geo::{Coord, EuclideanLength, LineString};

/// Signed area via shoelace formula. Positive = CCW, negative = CW
/// (in y-down image coordinates the visual sense is reversed).
pub fn signed_area(points: &[(i32, i32)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area: i64 = 0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].0 as i64 * points[j].1 as i64 - points[j].0 as i64 * points[i].1 as i64;
    }
    area as f64 / 2.0
}

/// Closed ring as a `geo` line string (first point repeated at the end).
pub fn closed_ring(points: &[(i32, i32)]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = points
        .iter()
        .map(|&(x, y)| Coord {
            x: x as f64,
            y: y as f64,
        })
        .collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

/// Arc length of the closed polygon, including the closing edge.
pub fn perimeter(points: &[(i32, i32)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    closed_ring(points).euclidean_length()
}

/// Distance from `p` to the segment `a`–`b`.
#[cfg(test)]
pub fn point_segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    if len_sq < 1e-12 {
        return apx.hypot(apy);
    }
    let t = ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (a.0 + t * abx, a.1 + t * aby);
    (p.0 - cx).hypot(p.1 - cy)
}

/// Inclusive bounding box `(min_x, min_y, max_x, max_y)`.
pub fn bounds(points: &[(i32, i32)]) -> Option<(i32, i32, i32, i32)> {
    let first = *points.first()?;
    Some(points.iter().fold(
        (first.0, first.1, first.0, first.1),
        |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_area_and_perimeter() {
        let square = [(0, 0), (10, 0), (10, 10), (0, 10)];
        assert_eq!(signed_area(&square).abs(), 100.0);
        assert!((perimeter(&square) - 40.0).abs() < 1e-9);
        assert_eq!(bounds(&square), Some((0, 0, 10, 10)));
    }

    #[test]
    fn degenerate_polygons_have_no_area() {
        assert_eq!(signed_area(&[(0, 0), (5, 5)]), 0.0);
        assert_eq!(perimeter(&[(3, 3)]), 0.0);
        assert_eq!(bounds(&[]), None);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        assert!((point_segment_distance((5.0, 3.0), (0.0, 0.0), (10.0, 0.0)) - 3.0).abs() < 1e-12);
        assert!((point_segment_distance((13.0, 4.0), (0.0, 0.0), (10.0, 0.0)) - 5.0).abs() < 1e-12);
        assert!((point_segment_distance((3.0, 4.0), (0.0, 0.0), (0.0, 0.0)) - 5.0).abs() < 1e-12);
    }
}
