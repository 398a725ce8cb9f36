//! On-disk cache of generated modules.
//!
//! Decoding and re-encoding one source at several widths is by far the most
//! expensive thing the loader does. When caching is on, the whole
//! transformation (resize, name, describe) is memoized: a hit returns the
//! stored module text without touching the image at all.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**. The fingerprint is the SHA-256 of a
//! JSON document holding:
//!
//! - the source identity: resource path plus the SHA-256 of the source bytes,
//! - every resolved configuration value (after the query string is merged),
//! - the user's cache identifier.
//!
//! Any change to the image, to an option, or to the identifier produces a
//! new key. There is no mtime check; bump `cache.identifier` to invalidate
//! everything.
//!
//! ## Storage
//!
//! One file per entry: `<dir>/<fingerprint>.json`, or `.json.gz` when
//! compression is on. The payload is the module text encoded as a JSON
//! string. Files are written to a sibling temp file and renamed into place,
//! so a concurrent reader sees either the old entry, the new entry, or
//! nothing. Two invocations that miss on the same key both compute and both
//! write; the last rename wins and both values are identical anyway.
//!
//! ## Directory
//!
//! `cache.directory` when configured. Otherwise a process-wide default
//! (`<platform cache dir>/responsive-loader`, or the system temp dir when
//! the platform has none), chosen once.
//!
//! If the directory cannot be created or the entry cannot be written, and
//! the directory was *not* explicitly configured and is not already the temp
//! dir, the operation is retried once in the temp dir. Explicit directories
//! never fall back: the user asked for that location.
//!
//! Unreadable or corrupt entries are treated as misses and overwritten.

use crate::config::LoaderConfig;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Directory name under the platform cache dir.
pub const CACHE_DIR_NAME: &str = "responsive-loader";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache directory {} is unwritable: {source}", path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The process-wide default cache directory, computed on first use.
pub fn default_directory() -> &'static Path {
    static DEFAULT: OnceLock<PathBuf> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        dirs::cache_dir()
            .map(|dir| dir.join(CACHE_DIR_NAME))
            .unwrap_or_else(std::env::temp_dir)
    })
}

/// SHA-256 fingerprint of one transformation.
pub fn fingerprint(
    resource_path: &Path,
    source: &[u8],
    config: &LoaderConfig,
    identifier: &str,
) -> String {
    let document = serde_json::json!({
        "source": {
            "path": resource_path.to_string_lossy(),
            "content": format!("{:x}", Sha256::digest(source)),
        },
        "options": config,
        "identifier": identifier,
    });
    format!("{:x}", Sha256::digest(document.to_string().as_bytes()))
}

/// Whether a module came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Caching was off for this invocation.
    Disabled,
    Hit,
    Miss,
}

/// A cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    directory: PathBuf,
    explicit: bool,
    compression: bool,
}

impl ArtifactCache {
    /// Cache in `directory` when given, else in [`default_directory`].
    pub fn new(directory: Option<PathBuf>, compression: bool) -> Self {
        match directory {
            Some(directory) => Self {
                directory,
                explicit: true,
                compression,
            },
            None => Self {
                directory: default_directory().to_path_buf(),
                explicit: false,
                compression,
            },
        }
    }

    /// A cache that treats `directory` as a default, so it may fall back to
    /// the temp dir.
    pub fn with_fallback(directory: PathBuf, compression: bool) -> Self {
        Self {
            directory,
            explicit: false,
            compression,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the entry for `fingerprint` under `dir`.
    pub fn entry_path(&self, dir: &Path, fingerprint: &str) -> PathBuf {
        let ext = if self.compression { "json.gz" } else { "json" };
        dir.join(format!("{fingerprint}.{ext}"))
    }

    /// Read an entry. Missing, unreadable or corrupt entries are `None`.
    pub fn read(&self, dir: &Path, fingerprint: &str) -> Option<String> {
        let path = self.entry_path(dir, fingerprint);
        let raw = fs::read(&path).ok()?;
        let json = if self.compression {
            let mut decoded = Vec::new();
            if let Err(e) = GzDecoder::new(raw.as_slice()).read_to_end(&mut decoded) {
                debug!(path = %path.display(), error = %e, "corrupt cache entry");
                return None;
            }
            decoded
        } else {
            raw
        };
        match serde_json::from_slice::<String>(&json) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "corrupt cache entry");
                None
            }
        }
    }

    /// Write an entry atomically: temp file in the same directory, then
    /// rename over the final path.
    pub fn write(&self, dir: &Path, fingerprint: &str, text: &str) -> io::Result<()> {
        let json = serde_json::to_vec(text)?;
        let payload = if self.compression {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&json)?;
            encoder.finish()?
        } else {
            json
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&payload)?;
        tmp.persist(self.entry_path(dir, fingerprint))
            .map_err(|e| e.error)?;
        Ok(())
    }

    /// Return the cached module for `fingerprint`, or run `compute`, store
    /// its result and return it.
    ///
    /// `compute` runs at most once. Its error propagates untouched and
    /// nothing is stored.
    pub fn get_or_compute<F, E>(&self, fingerprint: &str, compute: F) -> Result<(String, CacheStatus), E>
    where
        F: FnOnce() -> Result<String, E>,
        E: From<CacheError>,
    {
        let temp = std::env::temp_dir();
        let mut fallback = (!self.explicit && self.directory != temp).then_some(temp);
        let mut dir = self.directory.clone();

        if let Some(text) = self.read(&dir, fingerprint) {
            debug!(fingerprint, dir = %dir.display(), "cache hit");
            return Ok((text, CacheStatus::Hit));
        }

        if let Err(e) = fs::create_dir_all(&dir) {
            let Some(temp) = fallback.take() else {
                return Err(CacheError::Unwritable { path: dir, source: e }.into());
            };
            warn!(dir = %dir.display(), error = %e, "cache directory unavailable, using temp dir");
            dir = temp;
            if let Some(text) = self.read(&dir, fingerprint) {
                debug!(fingerprint, dir = %dir.display(), "cache hit");
                return Ok((text, CacheStatus::Hit));
            }
            fs::create_dir_all(&dir)
                .map_err(|source| CacheError::Unwritable { path: dir.clone(), source })?;
        }

        debug!(fingerprint, "cache miss");
        let text = compute()?;

        if let Err(e) = self.write(&dir, fingerprint, &text) {
            let Some(temp) = fallback.take() else {
                return Err(CacheError::Unwritable { path: dir, source: e }.into());
            };
            warn!(dir = %dir.display(), error = %e, "cache write failed, using temp dir");
            fs::create_dir_all(&temp)
                .and_then(|()| self.write(&temp, fingerprint, &text))
                .map_err(|source| CacheError::Unwritable { path: temp, source })?;
        }

        Ok((text, CacheStatus::Miss))
    }
}

/// Summary of cache performance across several invocations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn record(&mut self, status: CacheStatus) {
        match status {
            CacheStatus::Hit => self.hits += 1,
            CacheStatus::Miss => self.misses += 1,
            CacheStatus::Disabled => {}
        }
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} generated ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} generated", self.misses)
        }
    }
}
