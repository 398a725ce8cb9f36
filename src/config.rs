//! Loader configuration.
//!
//! Handles loading, validating, and merging configuration. Values come from
//! three layers, each overriding the one before:
//!
//! ```text
//! stock defaults               ← LoaderConfig::default()
//! responsive.toml              ← project-wide settings
//! ?sizes[]=500&placeholder     ← per-resource query string
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # size = 800                 # Single width
//! # sizes = [320, 640, 1280]   # Several widths (ignored when `size` is set)
//! # min = 320                  # Range start (used with `max`)
//! # max = 1280                 # Range end
//! steps = 4                    # Widths generated between min and max
//! name = "[hash]-[width].[ext]"
//! # output_path = "images"
//! # public_path = "https://cdn.example.com/assets/"
//! runtime_public_path = "__webpack_public_path__"
//! # context = "src"
//! placeholder = false
//! placeholder_size = 40
//! quality = 85
//! # background = "#ffffff"
//! progressive = false
//! rotate = 0
//! # format = "webp"
//! adapter = "raster"
//! disable = false
//! es_module = false
//! emit_file = true
//!
//! [cache]
//! enabled = false
//! # directory = ".cache/responsive"
//! compression = true
//! identifier = ""
//! ```
//!
//! Unknown keys are rejected to catch typos early. Numeric options accept
//! either numbers or numeric strings, since query strings carry only text.

use crate::imaging::{AdapterKind, Background, Rotation};
use crate::query::{self, QueryError};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up by [`load_base`] when given a directory.
pub const CONFIG_FILENAME: &str = "responsive.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Query error: {0}")]
    Query(#[from] QueryError),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Complete loader configuration.
///
/// All fields have defaults. User config files and query strings need only
/// specify the values they want to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// A single output width. Takes precedence over `sizes`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_u32"
    )]
    pub size: Option<u32>,
    /// Output widths, in the order they should appear.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_vec_u32"
    )]
    pub sizes: Option<Vec<u32>>,
    /// Start of a generated width range.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_u32"
    )]
    pub min: Option<u32>,
    /// End of a generated width range.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_u32"
    )]
    pub max: Option<u32>,
    /// Number of widths generated between `min` and `max` (inclusive).
    #[serde(deserialize_with = "lenient_u32")]
    pub steps: u32,
    /// File name template for artifacts.
    pub name: String,
    /// Directory prefix for emitted files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Literal public URL prefix. When unset, references are built from
    /// `runtime_public_path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,
    /// Expression the host resolves to its public path at runtime.
    pub runtime_public_path: String,
    /// Directory that `[path]` in the name template is relative to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Inline a low-resolution placeholder as a data URI.
    pub placeholder: bool,
    /// Placeholder width in pixels.
    #[serde(deserialize_with = "lenient_u32")]
    pub placeholder_size: u32,
    /// Encoder quality (1 = worst, 100 = best).
    #[serde(deserialize_with = "lenient_u32")]
    pub quality: u32,
    /// Hex color transparent pixels are flattened onto.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Request progressive JPEG encoding.
    pub progressive: bool,
    /// Clockwise rotation in degrees; `0` auto-orients from EXIF.
    #[serde(deserialize_with = "lenient_i32")]
    pub rotate: i32,
    /// Output format override (`jpg`, `jpeg`, `png`, `webp`, `avif`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Backend family used for decoding and resizing.
    pub adapter: AdapterKind,
    /// Skip processing and emit the source as a single artifact.
    pub disable: bool,
    /// Generate `export default` instead of `module.exports =`.
    pub es_module: bool,
    /// Hand artifacts to the emission sink.
    pub emit_file: bool,
    /// Result cache settings.
    pub cache: CacheConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            size: None,
            sizes: None,
            min: None,
            max: None,
            steps: 4,
            name: "[hash]-[width].[ext]".to_string(),
            output_path: None,
            public_path: None,
            runtime_public_path: "__webpack_public_path__".to_string(),
            context: None,
            placeholder: false,
            placeholder_size: 40,
            quality: 85,
            background: None,
            progressive: false,
            rotate: 0,
            format: None,
            adapter: AdapterKind::Raster,
            disable: false,
            es_module: false,
            emit_file: true,
            cache: CacheConfig::default(),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Memoize generated descriptors on disk.
    pub enabled: bool,
    /// Explicit cache directory. When absent the platform cache directory
    /// is used, falling back to the system temp directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Gzip cache files.
    pub compression: bool,
    /// Extra string mixed into every fingerprint; change it to invalidate.
    pub identifier: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: None,
            compression: true,
            identifier: String::new(),
        }
    }
}

impl LoaderConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        if self.steps < 2 {
            return Err(ConfigError::Validation("steps must be at least 2".into()));
        }
        if self.size == Some(0) {
            return Err(ConfigError::Validation("size must be positive".into()));
        }
        if let Some(sizes) = &self.sizes {
            if sizes.is_empty() {
                return Err(ConfigError::Validation("sizes must not be empty".into()));
            }
            if sizes.contains(&0) {
                return Err(ConfigError::Validation("sizes must be positive".into()));
            }
        }
        if self.min == Some(0) || self.max == Some(0) {
            return Err(ConfigError::Validation("min and max must be positive".into()));
        }
        if let (Some(min), Some(max)) = (self.min, self.max)
            && min > max
        {
            return Err(ConfigError::Validation(format!(
                "min ({min}) must not exceed max ({max})"
            )));
        }
        if self.placeholder_size == 0 {
            return Err(ConfigError::Validation(
                "placeholder_size must be positive".into(),
            ));
        }
        if Rotation::from_degrees(self.rotate).is_none() {
            return Err(ConfigError::Validation(format!(
                "rotate must be a multiple of 90, got {}",
                self.rotate
            )));
        }
        if let Some(background) = &self.background {
            background
                .parse::<Background>()
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }
        if self.name.is_empty() {
            return Err(ConfigError::Validation("name must not be empty".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Lenient numeric deserializers
// =============================================================================

/// A number, or text holding a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Value(T),
    Text(String),
}

impl<T: std::str::FromStr> Lenient<T>
where
    T::Err: std::fmt::Display,
{
    fn into_value<E: serde::de::Error>(self) -> Result<T, E> {
        match self {
            Lenient::Value(v) => Ok(v),
            Lenient::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| E::custom(format!("expected a number, got {s:?}: {e}"))),
        }
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Lenient::<u32>::deserialize(d)?.into_value()
}

fn lenient_i32<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    Lenient::<i32>::deserialize(d)?.into_value()
}

fn lenient_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Option::<Lenient<u32>>::deserialize(d)?
        .map(Lenient::into_value)
        .transpose()
}

fn lenient_opt_vec_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u32>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Lenient<u32>>),
        One(Lenient<u32>),
    }
    let values = match Option::<OneOrMany>::deserialize(d)? {
        None => return Ok(None),
        Some(OneOrMany::One(v)) => vec![v],
        Some(OneOrMany::Many(vs)) => vs,
    };
    values
        .into_iter()
        .map(Lenient::into_value::<D::Error>)
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(LoaderConfig::default()).expect("default config must serialize")
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

/// Load a config file as a raw TOML value.
///
/// `path` may name the file itself or a directory containing
/// [`CONFIG_FILENAME`]. Returns `Ok(None)` if no such file exists and `Err`
/// if it exists but is not valid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    };
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<LoaderConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: LoaderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Resolve the configuration for one resource: `base` (defaults plus any
/// config file) with the resource's query string merged on top.
pub fn resolve_for_query(
    base: &toml::Value,
    resource_query: Option<&str>,
) -> Result<LoaderConfig, ConfigError> {
    let overlay = match resource_query {
        Some(q) if !q.is_empty() => Some(toml::Value::Table(query::parse_query(q)?)),
        _ => None,
    };
    resolve_config(base.clone(), overlay)
}

/// Build the base layer: stock defaults with the config file at `path`
/// (if any) merged on top. The result is validated once here so that bad
/// files fail early rather than on the first resource.
pub fn load_base(path: Option<&Path>) -> Result<toml::Value, ConfigError> {
    let base = stock_defaults_value();
    let overlay = match path {
        Some(p) => load_raw_config(p)?,
        None => None,
    };
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: LoaderConfig = merged.clone().try_into()?;
    config.validate()?;
    Ok(merged)
}

/// Append `scope` to `cache.identifier` in `base`, so entries made for one
/// scope (such as an output directory) are never reused by another.
pub fn scope_cache_identifier(base: toml::Value, scope: &str) -> toml::Value {
    let current = base
        .get("cache")
        .and_then(|cache| cache.get("identifier"))
        .and_then(toml::Value::as_str)
        .unwrap_or_default();
    let identifier = if current.is_empty() {
        scope.to_string()
    } else {
        format!("{current}|{scope}")
    };

    let mut cache = toml::Table::new();
    cache.insert("identifier".into(), toml::Value::String(identifier));
    let mut overlay = toml::Table::new();
    overlay.insert("cache".into(), toml::Value::Table(cache));
    merge_toml(base, toml::Value::Table(overlay))
}

/// Returns a fully-commented stock `responsive.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Responsive Loader Configuration
# ===============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Every key can also be overridden per resource with a query string, e.g.
#   photo.jpg?sizes[]=480&sizes[]=960&placeholder
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Widths
# ---------------------------------------------------------------------------
# Exactly one of these styles is used, in this order of precedence:
#   size = 800                   one width
#   sizes = [320, 640, 1280]     explicit widths, output in this order
#   min = 320 / max = 1280       `steps` widths from min to max inclusive
# Widths larger than the source are clamped to its natural width.
# With no width configuration at all, the source is passed through unchanged.
steps = 4

# ---------------------------------------------------------------------------
# Output naming
# ---------------------------------------------------------------------------
# Tokens: [hash] [contenthash] [hash:N] [ext] [name] [path] [folder]
#         [query] [width] [height]
name = "[hash]-[width].[ext]"

# Directory prefix for emitted files.
# output_path = "images"

# Literal public URL prefix. Absolute URLs keep their query and fragment.
# public_path = "https://cdn.example.com/assets/"

# Expression the host resolves to its public path at runtime (used when
# public_path is not set).
runtime_public_path = "__webpack_public_path__"

# Directory that [path] is relative to.
# context = "src"

# ---------------------------------------------------------------------------
# Placeholder
# ---------------------------------------------------------------------------
# Inline a tiny version of the image as a base64 data URI.
placeholder = false
placeholder_size = 40

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
# Encoder quality (1 = worst, 100 = best).
quality = 85

# Color transparent pixels are flattened onto (#rgb, #rrggbb, #rrggbbaa).
# background = "#ffffff"

progressive = false

# Clockwise rotation in degrees (multiple of 90). 0 auto-orients from EXIF.
rotate = 0

# Convert to another format: jpg, jpeg, png, webp, avif.
# format = "webp"

# Backend: "raster" (all formats) or "lite" (jpg/png only).
adapter = "raster"

# ---------------------------------------------------------------------------
# Module output
# ---------------------------------------------------------------------------
# Skip processing: emit the source once, described as 100x100.
disable = false

# Generate `export default` instead of `module.exports =`.
es_module = false

# Write artifacts through the emission sink.
emit_file = true

# ---------------------------------------------------------------------------
# Cache
# ---------------------------------------------------------------------------
[cache]
enabled = false

# Omit to use the platform cache directory (falls back to the temp dir).
# directory = ".cache/responsive"

# Gzip cache files.
compression = true

# Change to invalidate every cached entry.
identifier = ""
"##
}
