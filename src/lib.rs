//! # Lando Upload
//!
//! The image upload pipeline shared by every Lando Hypermarket surface that
//! accepts a photo: event banners (create and edit), product images, and
//! review photos. Each surface used to carry its own copy of "shrink this
//! before sending it"; this crate is the one copy.
//!
//! # Architecture: One Pipeline, Many Profiles
//!
//! ```text
//! selection ─→ validate ─→ compress ─→ form
//!                 │           │          │
//!              reject      Notice     multipart parts
//! ```
//!
//! What differs between surfaces (size limit, accepted types, max width,
//! target size, bypass threshold) is data, not code: a named profile in
//! [`config`]. The pipeline itself never changes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`validate`] | Type and size checks that run before any decoding |
//! | [`compress`] | Bypass, decode, fit, quality-decay re-encode loop, fallback |
//! | [`imaging`] | Backend trait plus the `image`-crate implementation and pure sizing math |
//! | [`form`] | Multipart field layout, explicit image removal |
//! | [`memo`] | TTL cache with in-flight request coalescing (wishlist checks) |
//! | [`api_error`] | HTTP status + body → one user-facing error shape |
//! | [`config`] | Layered `upload.toml` loading, profiles, endpoints |
//! | [`types`] | Source/output files, encoding attempts, notices |
//! | [`naming`] | Output file naming (`photo.png` → `photo.jpg`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Validate Before Decoding
//!
//! A 40 MB PDF dropped on a banner picker should cost a string comparison,
//! not a decode attempt. [`validate`] looks only at the declared MIME type
//! and byte size, and a rejection stops the pipeline cold.
//!
//! ## Best-Effort Size Budget
//!
//! The re-encode loop lowers quality until the output fits the budget, but
//! it gives up after a fixed number of attempts and keeps the last result.
//! An upload that is a little too large is better than no upload.
//!
//! ## Never Block the Upload
//!
//! If the image cannot be decoded or encoded, the original file goes up
//! with a warning. Server-side processing is the safety net.
//!
//! ## Backends Behind a Trait
//!
//! [`imaging::ImageBackend`] separates *what* the pipeline asks for from
//! the pixel work. Tests swap in a recording mock, so pipeline properties
//! (attempt count, quality schedule, no decode on rejection) are asserted
//! without encoding a single JPEG.

pub mod api_error;
pub mod compress;
pub mod config;
pub mod form;
pub mod imaging;
pub mod memo;
pub mod naming;
pub mod output;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
