//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Resize** | Lanczos3 via `resize_exact` |
//! | **Encode** | `image::codecs::jpeg::JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math and quality tiers (unit testable)
//! - **Parameters**: Data structures describing encode settings
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{fit_within_width, quality_schedule, select_initial_quality};
pub use params::{DEFAULT_DECAY, DEFAULT_MAX_ATTEMPTS, Quality, QualityTier, ReencodeParams};
pub use rust_backend::{RustBackend, can_decode};
