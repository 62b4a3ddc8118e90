//! SVG document emission.
//!
//! Serializes vector records into a standalone SVG string. Each record
//! becomes one `<path>` using only `M`, `L` and `Z` commands, with an
//! `rgb(r,g,b)` fill and a two-decimal opacity. Records are written in
//! order, so later records paint over earlier ones.

use std::fmt::Write;
use std::path::Path;

use kurbo::PathEl;

use crate::simplify::VectorRecord;

/// Build the complete SVG document.
///
/// When the source had no alpha channel an opaque white plate is painted
/// first. An empty record list still yields a well-formed document.
pub fn to_svg(width: u32, height: u32, has_alpha: bool, records: &[VectorRecord]) -> String {
    let mut out = String::with_capacity(256 + records.len() * 96);

    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#);
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}">"#,
    );
    let _ = writeln!(out, "<g>");

    if !has_alpha {
        let _ = writeln!(
            out,
            r#"<rect x="0" y="0" width="{width}" height="{height}" fill="rgb(255,255,255)"/>"#,
        );
    }

    for record in records {
        let Some(d) = path_data(record) else {
            continue;
        };
        let [r, g, b] = record.fill;
        let _ = writeln!(
            out,
            r#"<path d="{d}" fill="rgb({r},{g},{b})" opacity="{:.2}"/>"#,
            record.opacity,
        );
    }

    let _ = writeln!(out, "</g>");
    out.push_str("</svg>\n");
    out
}

/// Serialize and write the document in one step.
///
/// The file is only created once the whole document is built; I/O
/// errors propagate unchanged.
pub fn write(
    path: &Path,
    width: u32,
    height: u32,
    has_alpha: bool,
    records: &[VectorRecord],
) -> std::io::Result<()> {
    std::fs::write(path, to_svg(width, height, has_alpha, records))
}

/// `M x,y L x,y ... Z` for one record. `None` if the path is empty.
fn path_data(record: &VectorRecord) -> Option<String> {
    let mut d = String::new();
    for el in record.path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let _ = write!(d, "M {},{} ", p.x, p.y);
            }
            PathEl::LineTo(p) => {
                let _ = write!(d, "L {},{} ", p.x, p.y);
            }
            PathEl::ClosePath => d.push('Z'),
            // Records only carry polygons.
            PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
        }
    }
    if d.is_empty() {
        None
    } else {
        Some(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{BezPath, Point};

    fn square_record(opacity: f64) -> VectorRecord {
        let mut path = BezPath::new();
        path.move_to(Point::new(0.0, 0.0));
        path.line_to(Point::new(9.0, 0.0));
        path.line_to(Point::new(9.0, 9.0));
        path.line_to(Point::new(0.0, 9.0));
        path.close_path();
        VectorRecord {
            path,
            fill: [255, 0, 0],
            opacity,
        }
    }

    #[test]
    fn header_carries_dimensions() {
        let svg = to_svg(120, 80, true, &[]);
        assert!(svg.starts_with("<?xml version=\"1.0\""));
        assert!(svg.contains(r#"viewBox="0 0 120 80" width="120" height="80""#));
        assert!(!svg.contains("<rect"));
        assert!(!svg.contains("<path"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn opaque_sources_get_white_plate_first() {
        let svg = to_svg(10, 10, false, &[square_record(0.99)]);
        let rect = svg.find("<rect").unwrap();
        let path = svg.find("<path").unwrap();
        assert!(rect < path);
        assert!(svg.contains(r#"fill="rgb(255,255,255)""#));
    }

    #[test]
    fn path_uses_move_line_close() {
        let svg = to_svg(10, 10, true, &[square_record(128.0 / 255.0)]);
        assert!(svg.contains(r#"<path d="M 0,0 L 9,0 L 9,9 L 0,9 Z" fill="rgb(255,0,0)" opacity="0.50"/>"#));
    }

    #[test]
    fn document_parses_as_xml() {
        let svg = to_svg(10, 10, false, &[square_record(0.99), square_record(0.3)]);
        let doc = roxmltree::Document::parse(&svg).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().name(), "svg");
        assert_eq!(root.attribute("width"), Some("10"));
        assert_eq!(
            doc.descendants().filter(|n| n.has_tag_name("path")).count(),
            2
        );
    }

    #[test]
    fn write_reports_io_errors() {
        let result = write(Path::new("/nonexistent-dir/out.svg"), 1, 1, true, &[]);
        assert!(result.is_err());
    }
}
