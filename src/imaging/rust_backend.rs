//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF, TIFF) | `image::load_from_memory` |
//! | Redraw at new size | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//!
//! JPEG has no alpha channel. Transparent pixels are composited onto white
//! before encoding, the same thing a canvas does when exporting JPEG.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::Quality;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// MIME types whose decoders are compiled in.
const DECODABLE: &[(&str, ImageFormat)] = &[
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
    ("image/webp", ImageFormat::WebP),
    ("image/gif", ImageFormat::Gif),
    ("image/tiff", ImageFormat::Tiff),
];

/// Returns true when a decoder for `mime` is compiled in.
pub fn can_decode(mime: &str) -> bool {
    DECODABLE
        .iter()
        .any(|(m, fmt)| m.eq_ignore_ascii_case(mime) && fmt.reading_enabled())
}

/// Pure Rust backend using the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop the alpha channel by blending every pixel over white.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

impl ImageBackend for RustBackend {
    type Bitmap = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn dimensions(&self, bitmap: &DynamicImage) -> Dimensions {
        Dimensions {
            width: bitmap.width(),
            height: bitmap.height(),
        }
    }

    fn draw(&self, bitmap: DynamicImage, size: Dimensions) -> Result<DynamicImage, BackendError> {
        if size.width == 0 || size.height == 0 {
            return Err(BackendError::Draw(format!("invalid target size {size}")));
        }
        if bitmap.width() == size.width && bitmap.height() == size.height {
            return Ok(bitmap);
        }
        Ok(bitmap.resize_exact(size.width, size.height, FilterType::Lanczos3))
    }

    fn encode_jpeg(
        &self,
        bitmap: &DynamicImage,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let rgb = flatten_onto_white(bitmap);
        let mut buf = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.percent());
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{noisy_rgb, png_bytes, rgba_with_transparency};

    #[test]
    fn can_decode_compiled_formats() {
        for mime in ["image/jpeg", "image/png", "image/webp", "image/gif", "IMAGE/PNG"] {
            assert!(can_decode(mime), "expected decoder for {mime}");
        }
        assert!(!can_decode("image/heic"));
        assert!(!can_decode("application/pdf"));
    }

    #[test]
    fn decode_synthetic_png() {
        let backend = RustBackend::new();
        let bytes = png_bytes(&DynamicImage::ImageRgb8(noisy_rgb(120, 80)));

        let bitmap = backend.decode(&bytes).unwrap();
        assert_eq!(
            backend.dimensions(&bitmap),
            Dimensions {
                width: 120,
                height: 80
            }
        );
    }

    #[test]
    fn decode_garbage_errors() {
        let backend = RustBackend::new();
        let result = backend.decode(b"definitely not an image");
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn draw_resizes_to_exact_size() {
        let backend = RustBackend::new();
        let bitmap = DynamicImage::ImageRgb8(noisy_rgb(300, 200));
        let drawn = backend
            .draw(
                bitmap,
                Dimensions {
                    width: 150,
                    height: 100,
                },
            )
            .unwrap();
        assert_eq!((drawn.width(), drawn.height()), (150, 100));
    }

    #[test]
    fn draw_rejects_zero_size() {
        let backend = RustBackend::new();
        let bitmap = DynamicImage::ImageRgb8(noisy_rgb(10, 10));
        let result = backend.draw(
            bitmap,
            Dimensions {
                width: 0,
                height: 10,
            },
        );
        assert!(matches!(result, Err(BackendError::Draw(_))));
    }

    #[test]
    fn encode_produces_decodable_jpeg() {
        let backend = RustBackend::new();
        let bitmap = DynamicImage::ImageRgb8(noisy_rgb(64, 48));
        let bytes = backend.encode_jpeg(&bitmap, Quality::new(0.85)).unwrap();

        assert_eq!(bytes[..2], [0xFF_u8, 0xD8]);
        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            image::ImageFormat::Jpeg
        );
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn lower_quality_gives_smaller_output() {
        let backend = RustBackend::new();
        let bitmap = DynamicImage::ImageRgb8(noisy_rgb(256, 256));
        let high = backend.encode_jpeg(&bitmap, Quality::new(0.95)).unwrap();
        let low = backend.encode_jpeg(&bitmap, Quality::new(0.3)).unwrap();
        assert!(low.len() < high.len(), "{} !< {}", low.len(), high.len());
    }

    #[test]
    fn transparent_pixels_become_white() {
        let flattened = flatten_onto_white(&DynamicImage::ImageRgba8(rgba_with_transparency(4, 4)));
        assert_eq!(flattened.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flattened.get_pixel(3, 3).0, [10, 20, 30]);
    }
}
