//! Upload configuration module.
//!
//! Handles loading, validating, and merging `upload.toml`. Stock defaults
//! carry one compression profile per upload surface of the storefront;
//! a user file overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [api]
//! base_url = "http://localhost:8000"   # LANDO_API_URL overrides
//!
//! [processing]
//! max_processes = 4         # Max parallel workers for `batch` (omit for auto)
//!
//! [wishlist]
//! ttl_secs = 30             # How long a wishlist check stays fresh
//!
//! [form]
//! removal = "flag"          # or "empty-string" for the legacy backend
//!
//! [profiles.banner]
//! max_file_bytes = 52428800
//! accepted_types = ["image/jpeg", "image/png", "image/webp", "image/gif"]
//! max_width = 1920
//! budget_bytes = 2097152
//! max_attempts = 5
//! decay = 0.85
//! fallback_quality = 0.85
//! quality_tiers = [
//!     { above_bytes = 52428800, quality = 0.6 },
//!     { above_bytes = 10485760, quality = 0.75 },
//! ]
//! # bypass_above_bytes = 20971520
//! ```
//!
//! ## Partial Configuration
//!
//! ```toml
//! # Only tighten the review photo budget
//! [profiles.review]
//! budget_bytes = 262144
//! ```
//!
//! A profile name not in the stock set starts from the stock profile
//! defaults. Unknown keys are rejected to catch typos early.

use crate::form::RemovalEncoding;
use crate::imaging::{
    DEFAULT_DECAY, DEFAULT_MAX_ATTEMPTS, Quality, QualityTier, ReencodeParams,
};
use crate::validate::Constraints;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "LANDO_API_URL";

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Unknown profile '{name}'. Available: {available}")]
    UnknownProfile { name: String, available: String },
}

/// Configuration loaded from `upload.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub api: ApiConfig,
    pub processing: ProcessingConfig,
    pub wishlist: WishlistConfig,
    pub form: FormConfig,
    /// Compression profiles keyed by upload surface.
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            processing: ProcessingConfig::default(),
            wishlist: WishlistConfig::default(),
            form: FormConfig::default(),
            profiles: stock_profiles(),
        }
    }
}

impl UploadConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("api.base_url must not be empty".into()));
        }
        if self.wishlist.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "wishlist.ttl_secs must be positive".into(),
            ));
        }
        for (name, profile) in &self.profiles {
            profile
                .validate()
                .map_err(|msg| ConfigError::Validation(format!("profiles.{name}.{msg}")))?;
        }
        Ok(())
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&ProfileConfig, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: name.to_string(),
                available: self.profiles.keys().cloned().collect::<Vec<_>>().join(", "),
            })
    }

    /// Backend endpoints, honoring the `LANDO_API_URL` override.
    pub fn endpoints(&self) -> Endpoints {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Endpoints::from_base(&url),
            _ => Endpoints::from_base(&self.api.base_url),
        }
    }
}

/// Backend location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Backend host; `/api` and `/storage` are derived from it.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// URLs derived from the single backend base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// JSON API root (`<base>/api`).
    pub api_url: String,
    /// Static asset root (`<base>/storage`).
    pub storage_url: String,
}

impl Endpoints {
    pub fn from_base(base: &str) -> Self {
        let base = base.trim().trim_end_matches('/');
        Self {
            api_url: format!("{base}/api"),
            storage_url: format!("{base}/storage"),
        }
    }

    /// Absolute URL for a stored asset path. Absolute URLs pass through.
    pub fn storage_asset(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        let path = path.strip_prefix("storage/").unwrap_or(path);
        format!("{}/{}", self.storage_url, path)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Wishlist check cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WishlistConfig {
    pub ttl_secs: u64,
}

impl Default for WishlistConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 }
    }
}

impl WishlistConfig {
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }
}

/// Upload form settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormConfig {
    /// How "remove the existing image" is sent to the backend.
    pub removal: RemovalEncoding,
}

/// Compression settings for one upload surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    /// Files larger than this are rejected before decoding.
    pub max_file_bytes: u64,
    /// Declared MIME types the picker accepts.
    pub accepted_types: Vec<String>,
    /// Output is never wider than this.
    pub max_width: u32,
    /// Target maximum output size (best-effort).
    pub budget_bytes: u64,
    /// Re-encode attempts before the last result is kept.
    pub max_attempts: u32,
    /// Quality multiplier after an over-budget attempt.
    pub decay: f32,
    /// Starting quality when no tier matches.
    pub fallback_quality: Quality,
    /// Size → starting quality lookup.
    pub quality_tiers: Vec<QualityTier>,
    /// Skip client-side compression entirely above this size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass_above_bytes: Option<u64>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * MIB,
            accepted_types: default_accepted_types(),
            max_width: 1920,
            budget_bytes: 2 * MIB,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            decay: DEFAULT_DECAY,
            fallback_quality: Quality::new(0.85),
            quality_tiers: default_quality_tiers(),
            bypass_above_bytes: None,
        }
    }
}

impl ProfileConfig {
    /// Returns the offending key and reason on failure.
    fn validate(&self) -> Result<(), String> {
        if self.accepted_types.is_empty() {
            return Err("accepted_types must not be empty".into());
        }
        if self.max_width == 0 {
            return Err("max_width must be positive".into());
        }
        if self.budget_bytes == 0 {
            return Err("budget_bytes must be positive".into());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".into());
        }
        if !(self.decay > 0.0 && self.decay < 1.0) {
            return Err("decay must be between 0 and 1 (exclusive)".into());
        }
        let in_range = |q: Quality| q.value() > 0.0 && q.value() <= 1.0;
        if !in_range(self.fallback_quality) {
            return Err("fallback_quality must be in (0, 1]".into());
        }
        if let Some(tier) = self.quality_tiers.iter().find(|t| !in_range(t.quality)) {
            return Err(format!(
                "quality_tiers: quality {} must be in (0, 1]",
                tier.quality.value()
            ));
        }
        Ok(())
    }

    pub fn constraints(&self) -> Constraints {
        Constraints {
            max_file_bytes: self.max_file_bytes,
            accepted_types: self.accepted_types.clone(),
        }
    }

    /// Re-encode parameters for a source of `source_size` bytes.
    pub fn reencode_params(&self, source_size: u64) -> ReencodeParams {
        ReencodeParams {
            initial: crate::imaging::select_initial_quality(
                source_size,
                &self.quality_tiers,
                self.fallback_quality,
            ),
            budget_bytes: self.budget_bytes,
            max_attempts: self.max_attempts,
            decay: self.decay,
        }
    }
}

fn default_accepted_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp", "image/gif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_quality_tiers() -> Vec<QualityTier> {
    vec![
        QualityTier {
            above_bytes: 50 * MIB,
            quality: Quality::new(0.6),
        },
        QualityTier {
            above_bytes: 10 * MIB,
            quality: Quality::new(0.75),
        },
    ]
}

/// One profile per upload surface of the storefront.
fn stock_profiles() -> BTreeMap<String, ProfileConfig> {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        "banner".to_string(),
        ProfileConfig {
            max_file_bytes: 50 * MIB,
            ..ProfileConfig::default()
        },
    );
    profiles.insert(
        "banner-edit".to_string(),
        ProfileConfig {
            max_file_bytes: 100 * MIB,
            bypass_above_bytes: Some(20 * MIB),
            ..ProfileConfig::default()
        },
    );
    profiles.insert(
        "product".to_string(),
        ProfileConfig {
            max_file_bytes: 10 * MIB,
            max_width: 1200,
            budget_bytes: MIB,
            ..ProfileConfig::default()
        },
    );
    profiles.insert(
        "review".to_string(),
        ProfileConfig {
            max_file_bytes: 2 * MIB,
            accepted_types: vec!["image/jpeg".into(), "image/png".into(), "image/webp".into()],
            max_width: 1080,
            budget_bytes: 512 * KIB,
            ..ProfileConfig::default()
        },
    );
    profiles
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(UploadConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<UploadConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: UploadConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or stock defaults when `path` is `None`.
///
/// A path that does not exist is an error: it was asked for explicitly.
pub fn load_config(path: Option<&Path>) -> Result<UploadConfig, ConfigError> {
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `upload.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Lando Upload Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Backend
# ---------------------------------------------------------------------------
[api]
# Backend host. JSON calls go to <base_url>/api, assets live under
# <base_url>/storage. The LANDO_API_URL environment variable overrides this.
base_url = "http://localhost:8000"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel compression workers for `batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Wishlist check cache
# ---------------------------------------------------------------------------
[wishlist]
# Seconds a wishlist lookup result stays fresh.
ttl_secs = 30

# ---------------------------------------------------------------------------
# Upload form
# ---------------------------------------------------------------------------
[form]
# How removing an existing image is signaled:
#   "flag"         -> sends remove_<field> = 1
#   "empty-string" -> sends <field> = "" (legacy backend convention)
removal = "flag"

# ---------------------------------------------------------------------------
# Compression profiles
# ---------------------------------------------------------------------------
# Sizes are in bytes. quality values are fractions in (0, 1].
# A source larger than a tier's above_bytes starts at that tier's quality;
# otherwise fallback_quality is used. Each over-budget attempt multiplies
# quality by decay, up to max_attempts; the last attempt is kept even if
# it is still over budget_bytes.

[profiles.banner]
max_file_bytes = 52428800        # 50 MB
accepted_types = ["image/jpeg", "image/png", "image/webp", "image/gif"]
max_width = 1920
budget_bytes = 2097152           # 2 MB
max_attempts = 5
decay = 0.85
fallback_quality = 0.85
quality_tiers = [
    { above_bytes = 52428800, quality = 0.6 },
    { above_bytes = 10485760, quality = 0.75 },
]

[profiles.banner-edit]
max_file_bytes = 104857600       # 100 MB
accepted_types = ["image/jpeg", "image/png", "image/webp", "image/gif"]
max_width = 1920
budget_bytes = 2097152
max_attempts = 5
decay = 0.85
fallback_quality = 0.85
quality_tiers = [
    { above_bytes = 52428800, quality = 0.6 },
    { above_bytes = 10485760, quality = 0.75 },
]
# Above this size the file is uploaded as-is and optimized server-side.
bypass_above_bytes = 20971520    # 20 MB

[profiles.product]
max_file_bytes = 10485760        # 10 MB
accepted_types = ["image/jpeg", "image/png", "image/webp", "image/gif"]
max_width = 1200
budget_bytes = 1048576           # 1 MB
max_attempts = 5
decay = 0.85
fallback_quality = 0.85
quality_tiers = [
    { above_bytes = 52428800, quality = 0.6 },
    { above_bytes = 10485760, quality = 0.75 },
]

[profiles.review]
max_file_bytes = 2097152         # 2 MB
accepted_types = ["image/jpeg", "image/png", "image/webp"]
max_width = 1080
budget_bytes = 524288            # 512 KB
max_attempts = 5
decay = 0.85
fallback_quality = 0.85
quality_tiers = [
    { above_bytes = 52428800, quality = 0.6 },
    { above_bytes = 10485760, quality = 0.75 },
]
"##
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<UploadConfig, ConfigError> {
        resolve_config(Some(toml::from_str(toml_str).unwrap()))
    }

    #[test]
    fn default_config_has_stock_profiles() {
        let config = UploadConfig::default();
        let names: Vec<&str> = config.profiles.keys().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["banner", "banner-edit", "product", "review"]);
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(UploadConfig::default().validate().is_ok());
    }

    #[test]
    fn banner_edit_has_bypass() {
        let config = UploadConfig::default();
        assert_eq!(
            config.profile("banner-edit").unwrap().bypass_above_bytes,
            Some(20 * MIB)
        );
        assert_eq!(config.profile("banner").unwrap().bypass_above_bytes, None);
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let from_file: UploadConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = UploadConfig::default();
        assert_eq!(from_file.profiles, defaults.profiles);
        assert_eq!(from_file.api.base_url, defaults.api.base_url);
        assert_eq!(from_file.wishlist.ttl_secs, defaults.wishlist.ttl_secs);
        assert_eq!(from_file.form.removal, defaults.form.removal);
    }

    #[test]
    fn partial_profile_override_keeps_other_keys() {
        let config = parse("[profiles.review]\nbudget_bytes = 1000\n").unwrap();
        let review = config.profile("review").unwrap();
        assert_eq!(review.budget_bytes, 1000);
        assert_eq!(review.max_width, 1080);
        assert_eq!(config.profiles.len(), 4);
    }

    #[test]
    fn new_profile_starts_from_defaults() {
        let config = parse("[profiles.avatar]\nmax_width = 256\n").unwrap();
        let avatar = config.profile("avatar").unwrap();
        assert_eq!(avatar.max_width, 256);
        assert_eq!(avatar.max_attempts, 5);
        assert_eq!(avatar.decay, 0.85);
    }

    #[test]
    fn quality_tiers_replaced_wholesale() {
        let config = parse(
            "[profiles.product]\nquality_tiers = [{ above_bytes = 1, quality = 0.5 }]\n",
        )
        .unwrap();
        let tiers = &config.profile("product").unwrap().quality_tiers;
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers[0].quality.value(), 0.5);
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(matches!(parse("bogus = 1\n"), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_profile_key_rejected() {
        assert!(parse("[profiles.banner]\nmax_widht = 10\n").is_err());
    }

    #[test]
    fn unknown_profile_lookup_lists_available() {
        let config = UploadConfig::default();
        let err = config.profile("avatar").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown profile 'avatar'. Available: banner, banner-edit, product, review"
        );
    }

    #[test]
    fn validate_decay_out_of_range() {
        let err = parse("[profiles.banner]\ndecay = 1.0\n").unwrap_err();
        assert!(err.to_string().contains("profiles.banner.decay"));
    }

    #[test]
    fn validate_zero_attempts() {
        assert!(matches!(
            parse("[profiles.banner]\nmax_attempts = 0\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_empty_accepted_types() {
        assert!(parse("[profiles.banner]\naccepted_types = []\n").is_err());
    }

    #[test]
    fn validate_tier_quality_out_of_range() {
        let err = parse(
            "[profiles.banner]\nquality_tiers = [{ above_bytes = 1, quality = 1.5 }]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("quality_tiers"));
    }

    #[test]
    fn validate_zero_ttl() {
        assert!(parse("[wishlist]\nttl_secs = 0\n").is_err());
    }

    #[test]
    fn parse_removal_encoding() {
        let config = parse("[form]\nremoval = \"empty-string\"\n").unwrap();
        assert_eq!(config.form.removal, RemovalEncoding::EmptyString);
    }

    #[test]
    fn load_config_without_path_is_stock() {
        let config = load_config(None).unwrap();
        assert_eq!(config.profiles, UploadConfig::default().profiles);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("upload.toml");
        fs::write(&path, "[processing]\nmax_processes = 2\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.processing.max_processes, Some(2));
    }

    #[test]
    fn load_config_missing_file_is_error() {
        let result = load_config(Some(Path::new("/nonexistent/upload.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("upload.toml");
        fs::write(&path, "[profiles\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn reencode_params_pick_tier_by_size() {
        let banner = UploadConfig::default().profile("banner").unwrap().clone();
        assert_eq!(banner.reencode_params(15 * MIB).initial.value(), 0.75);
        assert_eq!(banner.reencode_params(60 * MIB).initial.value(), 0.6);
        assert_eq!(banner.reencode_params(MIB).initial.value(), 0.85);
        assert_eq!(banner.reencode_params(MIB).budget_bytes, 2 * MIB);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn endpoints_derive_api_and_storage() {
        let e = Endpoints::from_base("https://shop.example.com/");
        assert_eq!(e.api_url, "https://shop.example.com/api");
        assert_eq!(e.storage_url, "https://shop.example.com/storage");
    }

    #[test]
    fn storage_asset_joins_paths() {
        let e = Endpoints::from_base("https://shop.example.com");
        assert_eq!(
            e.storage_asset("banners/a.jpg"),
            "https://shop.example.com/storage/banners/a.jpg"
        );
        assert_eq!(
            e.storage_asset("/storage/banners/a.jpg"),
            "https://shop.example.com/storage/banners/a.jpg"
        );
        assert_eq!(
            e.storage_asset("https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
    }
}
