//! Emission sinks: where artifact bytes go.
//!
//! The loader never writes artifacts itself. It hands each unique artifact
//! to an [`EmitSink`] exactly once per invocation. Failures are the sink's
//! business; [`DirSink`] logs them and carries on.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Receives emitted artifacts.
///
/// `location` is the output location produced by the namer, a relative
/// posix path such as `images/5f3c...-640.jpg`.
pub trait EmitSink: Send + Sync {
    fn emit(&self, location: &str, data: &[u8]);
}

/// Writes artifacts under a root directory, creating parents as needed.
#[derive(Debug, Clone)]
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EmitSink for DirSink {
    fn emit(&self, location: &str, data: &[u8]) {
        let path = self.root.join(location);
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&path, data));
        match written {
            Ok(()) => debug!(path = %path.display(), bytes = data.len(), "emitted"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to emit artifact"),
        }
    }
}

/// Collects artifacts in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn locations(&self) -> Vec<String> {
        self.files().into_iter().map(|(location, _)| location).collect()
    }
}

impl EmitSink for MemorySink {
    fn emit(&self, location: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((location.to_string(), data.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn dir_sink_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let sink = DirSink::new(tmp.path());

        sink.emit("images/deep/a.jpg", b"jpeg");

        let written = fs::read(tmp.path().join("images/deep/a.jpg")).unwrap();
        assert_eq!(written, b"jpeg");
    }

    #[test]
    fn dir_sink_failure_does_not_panic() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();
        let sink = DirSink::new(&blocker);

        sink.emit("a.jpg", b"jpeg");

        assert!(!blocker.join("a.jpg").exists());
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.emit("b.png", b"2");
        sink.emit("a.png", b"1");

        assert_eq!(sink.locations(), vec!["b.png", "a.png"]);
        assert_eq!(sink.files()[1].1, b"1");
    }
}
