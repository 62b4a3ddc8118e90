//! Background handling around the vectorizer.
//!
//! - [`BackgroundSpec`]: a solid color or vertical linear gradient,
//!   composited behind the transparent parts of an image.
//! - [`BackgroundRemover`]: the contract for an external foreground
//!   segmentation model. No model ships with this crate.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::sharpen3x3;
use regex::Regex;

use crate::bitmap::PixelBuffer;
use crate::error::{BackgroundError, ConvertError};

fn hex_color() -> &'static Regex {
    static HEX: OnceLock<Regex> = OnceLock::new();
    HEX.get_or_init(|| Regex::new(r"#([0-9a-fA-F]{6})").expect("static regex"))
}

fn parse_hex(hex: &str) -> [u8; 3] {
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
    [channel(0), channel(2), channel(4)]
}

/// Fill painted behind transparent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundSpec {
    Solid([u8; 3]),
    /// Top color to bottom color.
    LinearGradient([u8; 3], [u8; 3]),
}

impl BackgroundSpec {
    /// Parse `#rrggbb` or `linear-gradient(... #rrggbb ... #rrggbb ...)`.
    pub fn parse(spec: &str) -> Result<Self, BackgroundError> {
        let spec = spec.trim();
        if spec.starts_with("linear-gradient") {
            let colors: Vec<[u8; 3]> = hex_color()
                .captures_iter(spec)
                .map(|c| parse_hex(&c[1]))
                .collect();
            if colors.len() < 2 {
                return Err(BackgroundError::GradientNeedsTwoColors);
            }
            return Ok(BackgroundSpec::LinearGradient(colors[0], colors[1]));
        }
        hex_color()
            .captures(spec)
            .map(|c| BackgroundSpec::Solid(parse_hex(&c[1])))
            .ok_or_else(|| BackgroundError::InvalidColor(spec.to_string()))
    }

    /// Fill color for row `y` of an image `height` rows tall.
    fn color_at(&self, y: u32, height: u32) -> [f64; 3] {
        match *self {
            BackgroundSpec::Solid(c) => c.map(|v| v as f64),
            BackgroundSpec::LinearGradient(top, bottom) => {
                let ratio = if height == 0 { 0.0 } else { y as f64 / height as f64 };
                let mut out = [0.0; 3];
                for ch in 0..3 {
                    out[ch] = (1.0 - ratio) * top[ch] as f64 + ratio * bottom[ch] as f64;
                }
                out
            }
        }
    }
}

impl FromStr for BackgroundSpec {
    type Err = BackgroundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Blend the image over the background by its alpha.
///
/// The result is opaque (`has_alpha == false`), so the emitter will add
/// its own white plate underneath, fully hidden by the composited pixels.
pub fn composite(buffer: &PixelBuffer, spec: &BackgroundSpec) -> PixelBuffer {
    let (w, h) = buffer.dimensions();
    let rgb = RgbImage::from_fn(w, h, |x, y| {
        let fg = buffer.rgb.get_pixel(x, y).0;
        let a = buffer.alpha.get_pixel(x, y).0[0] as f64 / 255.0;
        let bg = spec.color_at(y, h);
        let mut out = [0u8; 3];
        for ch in 0..3 {
            out[ch] = (fg[ch] as f64 * a + bg[ch] * (1.0 - a)).round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    });
    PixelBuffer {
        rgb,
        alpha: GrayImage::from_pixel(w, h, Luma([255])),
        has_alpha: false,
    }
}

/// Sharpen the color channels with a 3x3 kernel. Alpha is untouched.
pub fn sharpen(buffer: &PixelBuffer) -> PixelBuffer {
    let (w, h) = buffer.dimensions();
    let channels: Vec<GrayImage> = (0..3)
        .map(|ch| {
            let plane = GrayImage::from_fn(w, h, |x, y| Luma([buffer.rgb.get_pixel(x, y).0[ch]]));
            sharpen3x3(&plane)
        })
        .collect();
    let rgb = RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            channels[0].get_pixel(x, y).0[0],
            channels[1].get_pixel(x, y).0[0],
            channels[2].get_pixel(x, y).0[0],
        ])
    });
    PixelBuffer {
        rgb,
        alpha: buffer.alpha.clone(),
        has_alpha: buffer.has_alpha,
    }
}

// ── Background removal contract ──────────────────────────

/// Segmentation models a remover may be asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundModel {
    #[default]
    Silueta,
    U2netp,
    U2net,
    IsnetGeneralUse,
}

impl BackgroundModel {
    pub fn as_str(self) -> &'static str {
        match self {
            BackgroundModel::Silueta => "silueta",
            BackgroundModel::U2netp => "u2netp",
            BackgroundModel::U2net => "u2net",
            BackgroundModel::IsnetGeneralUse => "isnet-general-use",
        }
    }
}

impl fmt::Display for BackgroundModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundModel {
    type Err = BackgroundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "silueta" => Ok(BackgroundModel::Silueta),
            "u2netp" => Ok(BackgroundModel::U2netp),
            "u2net" => Ok(BackgroundModel::U2net),
            "isnet-general-use" => Ok(BackgroundModel::IsnetGeneralUse),
            other => Err(BackgroundError::UnknownModel(other.to_string())),
        }
    }
}

/// A foreground segmentation model: returns the same image with alpha
/// populated (0 = background).
pub trait BackgroundRemover {
    fn remove(&self, model: BackgroundModel, buffer: PixelBuffer) -> Result<PixelBuffer, ConvertError>;
}

/// Remove the background, then optionally composite a new one.
pub fn prepare(
    buffer: PixelBuffer,
    remover: &dyn BackgroundRemover,
    model: BackgroundModel,
    background: Option<&BackgroundSpec>,
) -> Result<PixelBuffer, ConvertError> {
    let (w, h) = buffer.dimensions();
    tracing::info!("Remove bg   {} model, {}x{} px", model, w, h);
    let removed = remover.remove(model, buffer)?;
    if removed.dimensions() != (w, h) {
        return Err(ConvertError::BackgroundRemoval(format!(
            "model returned {:?}, expected {:?}",
            removed.dimensions(),
            (w, h)
        )));
    }
    Ok(match background {
        Some(spec) => composite(&removed, spec),
        None => removed,
    })
}
