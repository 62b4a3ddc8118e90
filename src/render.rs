//! Raster preview of emitted vector records.
//!
//! Converts records back to pixels via tiny-skia, painting them in
//! document order exactly as an SVG viewer would, so the result can be
//! compared against the source image.

use std::path::Path;

use kurbo::{BezPath, PathEl};

use crate::simplify::VectorRecord;

/// Convert a kurbo `BezPath` to a `tiny_skia::Path`.
fn kurbo_to_tinyskia(bezpath: &BezPath) -> Option<tiny_skia::Path> {
    let mut pb = tiny_skia::PathBuilder::new();
    for el in bezpath.elements() {
        match *el {
            PathEl::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => pb.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => pb.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

/// Rasterize records at the document's own size.
///
/// Returns `None` for a zero-sized canvas.
pub fn rasterize(
    width: u32,
    height: u32,
    has_alpha: bool,
    records: &[VectorRecord],
) -> Option<tiny_skia::Pixmap> {
    let mut pixmap = tiny_skia::Pixmap::new(width, height)?;
    if !has_alpha {
        pixmap.fill(tiny_skia::Color::WHITE);
    }

    let mut paint = tiny_skia::Paint::default();
    paint.anti_alias = false;
    for record in records {
        let Some(path) = kurbo_to_tinyskia(&record.path) else {
            continue;
        };
        let [r, g, b] = record.fill;
        let a = (record.opacity * 255.0).round().clamp(0.0, 255.0) as u8;
        paint.set_color_rgba8(r, g, b, a);
        pixmap.fill_path(
            &path,
            &paint,
            tiny_skia::FillRule::Winding,
            tiny_skia::Transform::identity(),
            None,
        );
    }
    Some(pixmap)
}

/// Encode a pixmap to PNG bytes (straight alpha).
fn encode_png(pixmap: &tiny_skia::Pixmap) -> Result<Vec<u8>, png::EncodingError> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for p in pixmap.pixels() {
        let c = p.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut buf = Vec::new();
    let mut encoder = png::Encoder::new(&mut buf, pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&data)?;
    writer.finish()?;
    Ok(buf)
}

/// Write a pixmap as PNG.
pub fn save_png(pixmap: &tiny_skia::Pixmap, path: &Path) -> std::io::Result<()> {
    let bytes = encode_png(pixmap).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(path, bytes)
}
