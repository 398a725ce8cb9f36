//! Option resolution.
//!
//! Turns a merged [`LoaderConfig`] plus the resource path into the
//! normalized parameters one invocation runs with. Pure: no I/O, no images.

use crate::config::LoaderConfig;
use crate::descriptor::ExportStyle;
use crate::imaging::{AdapterKind, Background, EncodingOptions, Mime, Quality, Rotation, SizeRequest};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum OptionsError {
    #[error("no mime type for file with extension {ext:?} supported")]
    UnsupportedFormat { ext: String },
    #[error("invalid option: {0}")]
    Invalid(String),
}

/// Cache settings for one invocation. Present only when caching is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Explicitly configured directory; `None` means use the default chain.
    pub directory: Option<PathBuf>,
    pub compression: bool,
    pub identifier: String,
}

/// Everything one invocation needs, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub mime: Mime,
    /// Extension used for `[ext]` in the name template.
    pub ext: String,
    /// Name template with `[ext]` already substituted.
    pub name: String,
    /// `None` means no width configuration: pass the source through.
    pub sizes: Option<SizeRequest>,
    /// Placeholder width, when a placeholder was requested.
    pub placeholder: Option<u32>,
    pub encoding: EncodingOptions,
    pub adapter: AdapterKind,
    pub export: ExportStyle,
    pub emit_file: bool,
    pub disable: bool,
    pub context: Option<PathBuf>,
    pub output_path: Option<String>,
    pub public_path: Option<String>,
    pub runtime_public_path: String,
    pub cache: Option<CacheOptions>,
}

/// Resolve `config` for the resource at `resource_path`.
///
/// The output format comes from `format` when set, otherwise from the
/// resource's extension. Either way an unknown format fails with
/// [`OptionsError::UnsupportedFormat`].
pub fn resolve(config: &LoaderConfig, resource_path: &Path) -> Result<ResolvedOptions, OptionsError> {
    let (mime, ext) = match &config.format {
        Some(format) => {
            let mime = Mime::from_extension(format).ok_or_else(|| OptionsError::UnsupportedFormat {
                ext: format.clone(),
            })?;
            (mime, mime.extension().to_string())
        }
        None => {
            let ext = resource_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string();
            let mime = Mime::from_extension(&ext)
                .ok_or_else(|| OptionsError::UnsupportedFormat { ext: ext.clone() })?;
            (mime, ext)
        }
    };

    let rotate = Rotation::from_degrees(config.rotate).ok_or_else(|| {
        OptionsError::Invalid(format!("rotate must be a multiple of 90, got {}", config.rotate))
    })?;
    let background = config
        .background
        .as_deref()
        .map(str::parse::<Background>)
        .transpose()
        .map_err(|e| OptionsError::Invalid(e.to_string()))?;

    Ok(ResolvedOptions {
        mime,
        name: replace_ignore_case(&config.name, "[ext]", &ext),
        ext,
        sizes: size_request(config),
        placeholder: config.placeholder.then_some(config.placeholder_size),
        encoding: EncodingOptions {
            quality: Quality::new(config.quality),
            background,
            progressive: config.progressive,
            rotate,
        },
        adapter: config.adapter,
        export: if config.es_module {
            ExportStyle::EsModule
        } else {
            ExportStyle::CommonJs
        },
        emit_file: config.emit_file,
        disable: config.disable,
        context: config.context.as_ref().map(PathBuf::from),
        output_path: config.output_path.clone().filter(|p| !p.is_empty()),
        public_path: config.public_path.clone().filter(|p| !p.is_empty()),
        runtime_public_path: config.runtime_public_path.clone(),
        cache: config.cache.enabled.then(|| CacheOptions {
            directory: config.cache.directory.as_ref().map(PathBuf::from),
            compression: config.cache.compression,
            identifier: config.cache.identifier.clone(),
        }),
    })
}

/// `size` wins over `sizes`, which wins over a `min`/`max` range. Only one
/// end of a range asks for the natural width.
fn size_request(config: &LoaderConfig) -> Option<SizeRequest> {
    if let Some(size) = config.size {
        return Some(SizeRequest::Explicit(vec![size]));
    }
    if let Some(sizes) = &config.sizes {
        return Some(SizeRequest::Explicit(sizes.clone()));
    }
    match (config.min, config.max) {
        (Some(min), Some(max)) => Some(SizeRequest::Range {
            min,
            max,
            steps: config.steps,
        }),
        (None, None) => None,
        _ => Some(SizeRequest::Natural),
    }
}

/// Replace every case-insensitive occurrence of an ASCII `token`.
pub(crate) fn replace_ignore_case(haystack: &str, token: &str, with: &str) -> String {
    let lower = haystack.to_ascii_lowercase();
    let token = token.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, _) in lower.match_indices(&token) {
        out.push_str(&haystack[last..start]);
        out.push_str(with);
        last = start + token.len();
    }
    out.push_str(&haystack[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn resolve_path(config: &LoaderConfig, path: &str) -> Result<ResolvedOptions, OptionsError> {
        resolve(config, Path::new(path))
    }

    #[test]
    fn mime_from_extension() {
        let config = LoaderConfig::default();
        let cases = [
            ("a.jpg", Mime::Jpeg, "jpg"),
            ("a.jpeg", Mime::Jpeg, "jpeg"),
            ("a.png", Mime::Png, "png"),
            ("a.webp", Mime::Webp, "webp"),
            ("a.avif", Mime::Avif, "avif"),
        ];
        for (path, mime, ext) in cases {
            let opts = resolve_path(&config, path).unwrap();
            assert_eq!(opts.mime, mime, "{path}");
            assert_eq!(opts.ext, ext, "{path}");
        }
    }

    #[test]
    fn unsupported_extension() {
        let err = resolve_path(&LoaderConfig::default(), "photo.gif").unwrap_err();
        assert_eq!(
            err,
            OptionsError::UnsupportedFormat {
                ext: "gif".to_string()
            }
        );
    }

    #[test]
    fn missing_extension_is_unsupported() {
        assert!(matches!(
            resolve_path(&LoaderConfig::default(), "photo"),
            Err(OptionsError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn explicit_format_overrides_extension() {
        let config = LoaderConfig {
            format: Some("webp".into()),
            ..Default::default()
        };
        let opts = resolve_path(&config, "photo.gif").unwrap();
        assert_eq!(opts.mime, Mime::Webp);
        assert_eq!(opts.ext, "webp");
        assert_eq!(opts.name, "[hash]-[width].webp");
    }

    #[test]
    fn jpeg_format_uses_jpg_extension() {
        let config = LoaderConfig {
            format: Some("jpeg".into()),
            ..Default::default()
        };
        assert_eq!(resolve_path(&config, "a.png").unwrap().ext, "jpg");
    }

    #[test]
    fn unknown_format_is_unsupported() {
        let config = LoaderConfig {
            format: Some("tiff".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_path(&config, "a.png"),
            Err(OptionsError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn ext_substituted_case_insensitively() {
        let config = LoaderConfig {
            name: "[name].[EXT]-[ext]".into(),
            ..Default::default()
        };
        assert_eq!(resolve_path(&config, "a.png").unwrap().name, "[name].png-png");
    }

    #[test]
    fn size_precedence() {
        let both = LoaderConfig {
            size: Some(300),
            sizes: Some(vec![100, 200]),
            min: Some(10),
            max: Some(20),
            ..Default::default()
        };
        assert_eq!(
            resolve_path(&both, "a.jpg").unwrap().sizes,
            Some(SizeRequest::Explicit(vec![300]))
        );

        let list = LoaderConfig {
            sizes: Some(vec![100, 200]),
            min: Some(10),
            max: Some(20),
            ..Default::default()
        };
        assert_eq!(
            resolve_path(&list, "a.jpg").unwrap().sizes,
            Some(SizeRequest::Explicit(vec![100, 200]))
        );

        let range = LoaderConfig {
            min: Some(10),
            max: Some(20),
            steps: 3,
            ..Default::default()
        };
        assert_eq!(
            resolve_path(&range, "a.jpg").unwrap().sizes,
            Some(SizeRequest::Range {
                min: 10,
                max: 20,
                steps: 3
            })
        );
    }

    #[test]
    fn half_range_requests_natural_width() {
        let config = LoaderConfig {
            max: Some(800),
            ..Default::default()
        };
        assert_eq!(
            resolve_path(&config, "a.jpg").unwrap().sizes,
            Some(SizeRequest::Natural)
        );
    }

    #[test]
    fn no_size_config_means_passthrough() {
        assert_eq!(resolve_path(&LoaderConfig::default(), "a.jpg").unwrap().sizes, None);
    }

    #[test]
    fn placeholder_only_when_requested() {
        let off = resolve_path(&LoaderConfig::default(), "a.jpg").unwrap();
        assert_eq!(off.placeholder, None);

        let config = LoaderConfig {
            placeholder: true,
            placeholder_size: 24,
            ..Default::default()
        };
        assert_eq!(resolve_path(&config, "a.jpg").unwrap().placeholder, Some(24));
    }

    #[test]
    fn encoding_options() {
        let config = LoaderConfig {
            quality: 60,
            background: Some("#000".into()),
            rotate: -90,
            progressive: true,
            ..Default::default()
        };
        let enc = resolve_path(&config, "a.png").unwrap().encoding;
        assert_eq!(enc.quality.value(), 60);
        assert_eq!(enc.background, Some(Background([0, 0, 0, 255])));
        assert_eq!(enc.rotate, Rotation::Cw270);
        assert!(enc.progressive);
    }

    #[test]
    fn bad_rotation_is_invalid() {
        let config = LoaderConfig {
            rotate: 30,
            ..Default::default()
        };
        assert!(matches!(
            resolve_path(&config, "a.png"),
            Err(OptionsError::Invalid(_))
        ));
    }

    #[test]
    fn export_style() {
        let config = LoaderConfig {
            es_module: true,
            ..Default::default()
        };
        assert_eq!(resolve_path(&config, "a.png").unwrap().export, ExportStyle::EsModule);
        assert_eq!(
            resolve_path(&LoaderConfig::default(), "a.png").unwrap().export,
            ExportStyle::CommonJs
        );
    }

    #[test]
    fn cache_options_only_when_enabled() {
        assert!(resolve_path(&LoaderConfig::default(), "a.png").unwrap().cache.is_none());

        let config = LoaderConfig {
            cache: CacheConfig {
                enabled: true,
                directory: Some("/tmp/rl".into()),
                compression: false,
                identifier: "v2".into(),
            },
            ..Default::default()
        };
        let cache = resolve_path(&config, "a.png").unwrap().cache.unwrap();
        assert_eq!(cache.directory, Some(PathBuf::from("/tmp/rl")));
        assert!(!cache.compression);
        assert_eq!(cache.identifier, "v2");
    }

    #[test]
    fn empty_paths_are_ignored() {
        let config = LoaderConfig {
            output_path: Some(String::new()),
            public_path: Some(String::new()),
            ..Default::default()
        };
        let opts = resolve_path(&config, "a.png").unwrap();
        assert_eq!(opts.output_path, None);
        assert_eq!(opts.public_path, None);
    }

    #[test]
    fn replace_ignore_case_handles_repeats() {
        assert_eq!(replace_ignore_case("a[EXT]b[ext]", "[ext]", "x"), "axbx");
        assert_eq!(replace_ignore_case("none", "[ext]", "x"), "none");
    }
}
