//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the "canvas" the compression pipeline draws
//! on: decode bytes into a bitmap, read its size, redraw it at new
//! dimensions, and export it as JPEG at a given quality.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording mock in [`tests`].

use super::params::Quality;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("resize failed: {0}")]
    Draw(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of a decoded bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// The bitmap type is backend-defined so the mock can stand in without
/// holding real pixels.
pub trait ImageBackend: Sync {
    type Bitmap;

    /// Decode encoded image bytes into a drawable bitmap.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Bitmap, BackendError>;

    /// Natural size of a decoded bitmap.
    fn dimensions(&self, bitmap: &Self::Bitmap) -> Dimensions;

    /// Redraw the bitmap at `size`, consuming the original.
    fn draw(&self, bitmap: Self::Bitmap, size: Dimensions) -> Result<Self::Bitmap, BackendError>;

    /// Serialize the bitmap as a JPEG at `quality`.
    fn encode_jpeg(&self, bitmap: &Self::Bitmap, quality: Quality)
    -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching pixels.
    ///
    /// Encode sizes are scripted: each `encode_jpeg` pops the next size;
    /// once the script runs dry the last size repeats. Uses Mutex (not
    /// RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub decode_result: Mutex<Option<Dimensions>>,
        pub encode_sizes: Mutex<VecDeque<usize>>,
        pub fail_encode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode { len: usize },
        Draw { width: u32, height: u32 },
        Encode { quality: f32, size: usize },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_image(width: u32, height: u32, encode_sizes: Vec<usize>) -> Self {
            Self {
                decode_result: Mutex::new(Some(Dimensions { width, height })),
                encode_sizes: Mutex::new(encode_sizes.into()),
                ..Self::default()
            }
        }

        pub fn failing_encode(width: u32, height: u32) -> Self {
            Self {
                fail_encode: true,
                ..Self::with_image(width, height, vec![])
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encode_qualities(&self) -> Vec<f32> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Encode { quality, .. } => Some(quality),
                    _ => None,
                })
                .collect()
        }

        pub fn decode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Decode { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        type Bitmap = Dimensions;

        fn decode(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode { len: bytes.len() });

            self.decode_result
                .lock()
                .unwrap()
                .ok_or_else(|| BackendError::Decode("no mock image".to_string()))
        }

        fn dimensions(&self, bitmap: &Dimensions) -> Dimensions {
            *bitmap
        }

        fn draw(&self, _bitmap: Dimensions, size: Dimensions) -> Result<Dimensions, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Draw {
                width: size.width,
                height: size.height,
            });
            Ok(size)
        }

        fn encode_jpeg(
            &self,
            _bitmap: &Dimensions,
            quality: Quality,
        ) -> Result<Vec<u8>, BackendError> {
            if self.fail_encode {
                return Err(BackendError::Encode("mock encoder unavailable".to_string()));
            }
            let size = {
                let mut sizes = self.encode_sizes.lock().unwrap();
                if sizes.len() > 1 {
                    sizes.pop_front().unwrap()
                } else {
                    sizes.front().copied().unwrap_or(0)
                }
            };
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                quality: quality.value(),
                size,
            });
            Ok(vec![0u8; size])
        }
    }

    #[test]
    fn mock_records_decode() {
        let backend = MockBackend::with_image(800, 600, vec![10]);

        let bitmap = backend.decode(b"abc").unwrap();
        assert_eq!(bitmap, Dimensions { width: 800, height: 600 });

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Decode { len: 3 }]);
    }

    #[test]
    fn mock_decode_without_image_errors() {
        let backend = MockBackend::new();
        assert!(matches!(backend.decode(b"x"), Err(BackendError::Decode(_))));
    }

    #[test]
    fn mock_encode_sizes_repeat_last() {
        let backend = MockBackend::with_image(10, 10, vec![300, 200]);
        let bmp = Dimensions { width: 10, height: 10 };
        let q = Quality::new(0.5);

        assert_eq!(backend.encode_jpeg(&bmp, q).unwrap().len(), 300);
        assert_eq!(backend.encode_jpeg(&bmp, q).unwrap().len(), 200);
        assert_eq!(backend.encode_jpeg(&bmp, q).unwrap().len(), 200);
    }

    #[test]
    fn dimensions_display() {
        assert_eq!(Dimensions { width: 1920, height: 1280 }.to_string(), "1920x1280");
    }
}
