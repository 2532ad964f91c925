//! Downscaling and re-encoding images before they are sent to the model.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use super::loader::ImageError;

/// Default longest side of a transmitted image, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 512;

/// An image in its transmission form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Wrap PNG bytes.
    pub fn png(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            mime_type: "image/png",
            data,
            width,
            height,
        }
    }
}

/// Dimensions after bounding the longest side by `max_dim`.
///
/// The longest side becomes exactly `max_dim`; the other side is scaled by
/// the same factor and rounded, never below one pixel. Images already within
/// the bound are left as they are.
pub fn target_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dim || max_dim == 0 {
        return (width, height);
    }

    let scale = max_dim as f64 / longest as f64;
    let shrink = |side: u32| {
        if side == longest {
            max_dim
        } else {
            ((side as f64 * scale).round() as u32).max(1)
        }
    };

    (shrink(width), shrink(height))
}

/// Downscale (never upscale) and encode as PNG.
pub fn prepare_for_upload(image: &DynamicImage, max_dim: u32) -> Result<EncodedImage, ImageError> {
    let (width, height) = target_dimensions(image.width(), image.height(), max_dim);

    let resized;
    let source = if (width, height) != (image.width(), image.height()) {
        resized = image.resize_exact(width, height, FilterType::CatmullRom);
        &resized
    } else {
        image
    };

    // PNG has no float pixel formats.
    let converted;
    let source = match source {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            converted = DynamicImage::ImageRgba8(source.to_rgba8());
            &converted
        }
        _ => source,
    };

    let mut buffer = Cursor::new(Vec::new());
    source
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    Ok(EncodedImage::png(buffer.into_inner(), width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb32FImage, RgbImage};

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30])))
    }

    #[test]
    fn test_target_dimensions_landscape() {
        assert_eq!(target_dimensions(1024, 768, 512), (512, 384));
        assert_eq!(target_dimensions(4000, 3000, 512), (512, 384));
    }

    #[test]
    fn test_target_dimensions_portrait_rounds() {
        // 513 * 512 / 1000 = 262.656
        assert_eq!(target_dimensions(513, 1000, 512), (263, 512));
    }

    #[test]
    fn test_target_dimensions_square_and_thin() {
        assert_eq!(target_dimensions(600, 600, 512), (512, 512));
        assert_eq!(target_dimensions(2000, 3, 512), (512, 1));
    }

    #[test]
    fn test_target_dimensions_never_upscale() {
        assert_eq!(target_dimensions(512, 300, 512), (512, 300));
        assert_eq!(target_dimensions(100, 40, 512), (100, 40));
    }

    #[test]
    fn test_aspect_ratio_preserved() {
        for (w, h) in [(1920, 1080), (777, 2049), (5000, 513)] {
            let (tw, th) = target_dimensions(w, h, 512);
            assert_eq!(tw.max(th), 512);
            let original = w as f64 / h as f64;
            let scaled = tw as f64 / th as f64;
            // One pixel of rounding on the short side.
            assert!((scaled / original - 1.0).abs() <= 1.0 / tw.min(th) as f64, "{w}x{h}");
        }
    }

    #[test]
    fn test_prepare_downscales_to_png() {
        let encoded = prepare_for_upload(&solid(1200, 800), 512).unwrap();
        assert_eq!(encoded.mime_type, "image/png");
        assert_eq!((encoded.width, encoded.height), (512, 341));

        let decoded = image::load_from_memory_with_format(&encoded.data, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (512, 341));
    }

    #[test]
    fn test_prepare_keeps_small_image_dimensions() {
        let encoded = prepare_for_upload(&solid(320, 200), 512).unwrap();
        let decoded = image::load_from_memory(&encoded.data).unwrap();
        assert_eq!(decoded.dimensions(), (320, 200));
    }

    #[test]
    fn test_prepare_float_image() {
        let pixels = Rgb32FImage::from_pixel(4, 4, image::Rgb([0.5, 0.5, 0.5]));
        let image = DynamicImage::ImageRgb32F(pixels);
        let encoded = prepare_for_upload(&image, 512).unwrap();
        assert!(image::load_from_memory(&encoded.data).is_ok());
    }
}
