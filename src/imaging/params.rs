//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! the [`compress`](crate::compress) pipeline (which decides how hard to
//! squeeze a file) and the [`backend`](super::backend) (which does the
//! actual pixel work), so the pipeline can run against a mock in tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality as a fraction in `(0, 1]`. Clamped on construction.
//! - [`QualityTier`]: One row of the size → starting-quality lookup table.
//! - [`ReencodeParams`]: Budget, attempt ceiling and decay for the re-encode loop.

use serde::{Deserialize, Serialize};

/// Lowest quality the re-encoder will ever ask for.
const MIN_QUALITY: f32 = 0.01;

/// Default multiplier applied to quality after an over-budget attempt.
pub const DEFAULT_DECAY: f32 = 0.85;

/// Default number of encode attempts before the last result is accepted.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// JPEG encoding quality as a fraction (0.01–1.0).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(MIN_QUALITY);
        }
        Self(value.clamp(MIN_QUALITY, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the 1–100 scale the JPEG encoder expects.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// Quality for the next attempt after an over-budget encode.
    pub fn decayed(self, factor: f32) -> Self {
        Self::new(self.0 * factor)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.85)
    }
}

/// Starting quality for sources strictly larger than `above_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityTier {
    pub above_bytes: u64,
    pub quality: Quality,
}

/// Parameters for the iterative re-encode loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReencodeParams {
    pub initial: Quality,
    /// Target maximum output size. Best-effort: the last attempt is kept
    /// even when it still exceeds this.
    pub budget_bytes: u64,
    pub max_attempts: u32,
    pub decay: f32,
}

impl ReencodeParams {
    pub fn new(initial: Quality, budget_bytes: u64) -> Self {
        Self {
            initial,
            budget_bytes,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            decay: DEFAULT_DECAY,
        }
    }
}
