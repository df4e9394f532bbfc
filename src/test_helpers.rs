//! Shared test utilities for the upload pipeline tests.
//!
//! Builds real encoded images in memory so backend tests exercise the
//! actual codecs, plus [`SourceFile`] shorthands for pipeline tests.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let bytes = jpeg_bytes(&DynamicImage::ImageRgb8(noisy_rgb(640, 480)), 95);
//! let source = source_file("photo.jpg", bytes);
//! ```

use crate::types::{SourceFile, mime_for_name};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

// =========================================================================
// Pixel fixtures
// =========================================================================

/// Deterministic high-entropy content.
///
/// Flat images compress to almost nothing at any quality; noise makes
/// output size respond to the quality setting.
pub fn noisy_rgb(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x2545_F491;
    RgbImage::from_fn(width, height, |x, y| {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [a, b, c, _] = state.to_le_bytes();
        Rgb([
            a.wrapping_add((x % 256) as u8),
            b.wrapping_add((y % 256) as u8),
            c,
        ])
    })
}

/// Top-left pixel fully transparent, bottom-right opaque `[10, 20, 30]`.
pub fn rgba_with_transparency(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if x == 0 && y == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([10, 20, 30, 255])
        }
    })
}

// =========================================================================
// Encoded bytes
// =========================================================================

pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn jpeg_bytes(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&img.to_rgb8())
        .unwrap();
    buf
}

// =========================================================================
// Source files
// =========================================================================

/// A source file whose declared MIME type follows its extension.
pub fn source_file(name: &str, bytes: Vec<u8>) -> SourceFile {
    SourceFile::new(name, mime_for_name(name), bytes)
}

/// A real `width`x`height` noisy JPEG.
pub fn noisy_jpeg_source(name: &str, width: u32, height: u32) -> SourceFile {
    let img = DynamicImage::ImageRgb8(noisy_rgb(width, height));
    source_file(name, jpeg_bytes(&img, 95))
}
