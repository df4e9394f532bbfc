//! Pure calculation functions for image dimensions and quality selection.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use super::params::{Quality, QualityTier};

/// Fit an image inside a maximum width, preserving aspect ratio.
///
/// Width becomes `min(natural.width, max_width)`; height is scaled by the
/// same ratio and rounded to the nearest pixel. Images that already fit are
/// returned unchanged. Never upscales.
///
/// # Examples
/// ```
/// # use lando_upload::imaging::{Dimensions, fit_within_width};
/// let out = fit_within_width(Dimensions { width: 3000, height: 2000 }, 1920);
/// assert_eq!((out.width, out.height), (1920, 1280));
///
/// let small = fit_within_width(Dimensions { width: 800, height: 600 }, 1920);
/// assert_eq!((small.width, small.height), (800, 600));
/// ```
pub fn fit_within_width(natural: Dimensions, max_width: u32) -> Dimensions {
    if natural.width <= max_width || natural.width == 0 {
        return natural;
    }
    let height = (natural.height as f64 * max_width as f64 / natural.width as f64).round() as u32;
    Dimensions {
        width: max_width,
        height: height.max(1),
    }
}

/// Pick the starting JPEG quality from the source file size.
///
/// A tier matches when `size > above_bytes`; among matching tiers the one
/// with the highest threshold wins, regardless of table order. With no
/// match, `fallback` is used.
pub fn select_initial_quality(size: u64, tiers: &[QualityTier], fallback: Quality) -> Quality {
    tiers
        .iter()
        .filter(|tier| size > tier.above_bytes)
        .max_by_key(|tier| tier.above_bytes)
        .map(|tier| tier.quality)
        .unwrap_or(fallback)
}

/// The sequence of qualities the re-encoder will try, in order.
///
/// Always has `max(max_attempts, 1)` entries; entry `n + 1` is entry `n`
/// times `decay`.
pub fn quality_schedule(initial: Quality, decay: f32, max_attempts: u32) -> Vec<Quality> {
    let mut schedule = Vec::with_capacity(max_attempts.max(1) as usize);
    let mut current = initial;
    schedule.push(current);
    for _ in 1..max_attempts {
        current = current.decayed(decay);
        schedule.push(current);
    }
    schedule
}
