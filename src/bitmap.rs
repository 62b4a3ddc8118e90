use std::path::Path;

use image::{DynamicImage, GrayImage, ImageReader, Luma, RgbImage, RgbaImage};

use crate::error::ConvertError;

/// Alpha values at or below this are treated as transparent background.
pub const NEAR_TRANSPARENT: u8 = 10;

/// Decoded source image: color channels plus an independent alpha channel.
///
/// When the source has no alpha channel, `alpha` is fully opaque and
/// `has_alpha` is false.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub rgb: RgbImage,
    pub alpha: GrayImage,
    pub has_alpha: bool,
}

impl PixelBuffer {
    /// Split an RGBA image into color and alpha.
    pub fn from_rgba(img: &RgbaImage) -> Self {
        let (w, h) = img.dimensions();
        let rgb = RgbImage::from_fn(w, h, |x, y| {
            let p = img.get_pixel(x, y).0;
            image::Rgb([p[0], p[1], p[2]])
        });
        let alpha = GrayImage::from_fn(w, h, |x, y| Luma([img.get_pixel(x, y).0[3]]));
        Self {
            rgb,
            alpha,
            has_alpha: true,
        }
    }

    /// Wrap an opaque RGB image.
    pub fn from_rgb(rgb: RgbImage) -> Self {
        let (w, h) = rgb.dimensions();
        Self {
            rgb,
            alpha: GrayImage::from_pixel(w, h, Luma([255])),
            has_alpha: false,
        }
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        if img.color().has_alpha() {
            Self::from_rgba(&img.into_rgba8())
        } else {
            Self::from_rgb(img.into_rgb8())
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }

    pub fn pixel_count(&self) -> usize {
        let (w, h) = self.dimensions();
        w as usize * h as usize
    }

    /// Recombine into a single RGBA image.
    pub fn to_rgba(&self) -> RgbaImage {
        let (w, h) = self.dimensions();
        RgbaImage::from_fn(w, h, |x, y| {
            let [r, g, b] = self.rgb.get_pixel(x, y).0;
            image::Rgba([r, g, b, self.alpha.get_pixel(x, y).0[0]])
        })
    }
}

/// Load an image file into a [`PixelBuffer`].
///
/// Any open or decode failure is reported as [`ConvertError::ImageLoad`].
pub fn load(path: &Path) -> Result<PixelBuffer, ConvertError> {
    let img = ImageReader::open(path)
        .map_err(|e| ConvertError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| ConvertError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| ConvertError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    Ok(PixelBuffer::from_dynamic(img))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_source_is_fully_opaque() {
        let buffer = PixelBuffer::from_rgb(RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3])));
        assert!(!buffer.has_alpha);
        assert_eq!(buffer.dimensions(), (4, 3));
        assert!(buffer.alpha.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn rgba_source_keeps_alpha() {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 128]));
        let buffer = PixelBuffer::from_rgba(&img);
        assert!(buffer.has_alpha);
        assert_eq!(buffer.rgb.get_pixel(1, 1).0, [10, 20, 30]);
        assert_eq!(buffer.alpha.get_pixel(1, 1).0, [128]);
        assert_eq!(buffer.to_rgba(), img);
    }

    #[test]
    fn missing_file_is_image_load_error() {
        let result = load(Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(ConvertError::ImageLoad(_))));
    }
}
