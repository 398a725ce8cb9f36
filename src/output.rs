//! CLI output formatting for the `build` command.
//!
//! # Output Format
//!
//! One block per resource, in completion order. The header names the input
//! and what became of it; the generated module follows, indented, unless
//! `--quiet` is given.
//!
//! ```text
//! photos/dawn.jpg → module (cache miss)
//!     module.exports = {
//!       srcSet: __webpack_public_path__ + "9f2c...-480.jpg"+" 480w",
//!       ...
//!     }
//! photos/logo.png → unchanged (18234 bytes)
//! photos/scan.gif → error: no mime type for file with extension "gif" supported
//!
//! Built 2 resources, 1 failed
//! Cache: 0 cached, 1 generated (1 total)
//! ```
//!
//! With `--json` the same information is emitted as one JSON array after all
//! resources finish.
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::{CacheStats, CacheStatus};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What happened to one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    Generated {
        input: PathBuf,
        cache: CacheStatus,
        module: String,
    },
    Unchanged {
        input: PathBuf,
        bytes: usize,
    },
    Failed {
        input: PathBuf,
        error: String,
    },
}

impl BuildEvent {
    pub fn input(&self) -> &Path {
        match self {
            BuildEvent::Generated { input, .. }
            | BuildEvent::Unchanged { input, .. }
            | BuildEvent::Failed { input, .. } => input,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, BuildEvent::Failed { .. })
    }
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn cache_label(status: CacheStatus) -> &'static str {
    match status {
        CacheStatus::Disabled => "uncached",
        CacheStatus::Hit => "cache hit",
        CacheStatus::Miss => "cache miss",
    }
}

/// Lines for one finished resource.
pub fn format_build_event(event: &BuildEvent, show_module: bool) -> Vec<String> {
    match event {
        BuildEvent::Generated {
            input,
            cache,
            module,
        } => {
            let mut lines = vec![format!(
                "{} → module ({})",
                input.display(),
                cache_label(*cache)
            )];
            if show_module {
                lines.extend(module.lines().map(|l| format!("{}{}", indent(1), l)));
            }
            lines
        }
        BuildEvent::Unchanged { input, bytes } => {
            vec![format!("{} → unchanged ({} bytes)", input.display(), bytes)]
        }
        BuildEvent::Failed { input, error } => {
            vec![format!("{} → error: {}", input.display(), error)]
        }
    }
}

/// Closing summary lines.
pub fn format_build_summary(events: &[BuildEvent]) -> Vec<String> {
    let failed = events.iter().filter(|e| e.is_failure()).count();
    let built = events.len() - failed;
    let noun = if built == 1 { "resource" } else { "resources" };

    let mut stats = CacheStats::default();
    for event in events {
        if let BuildEvent::Generated { cache, .. } = event {
            stats.record(*cache);
        }
    }

    let mut lines = vec![if failed > 0 {
        format!("Built {built} {noun}, {failed} failed")
    } else {
        format!("Built {built} {noun}")
    }];
    if stats.total() > 0 {
        lines.push(format!("Cache: {stats}"));
    }
    lines
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    input: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// All events as a pretty-printed JSON array.
pub fn format_json_summary(events: &[BuildEvent]) -> String {
    let records: Vec<JsonRecord<'_>> = events
        .iter()
        .map(|event| {
            let input = event.input().display().to_string();
            match event {
                BuildEvent::Generated { cache, module, .. } => JsonRecord {
                    input,
                    status: "module",
                    cache: Some(match cache {
                        CacheStatus::Disabled => "disabled",
                        CacheStatus::Hit => "hit",
                        CacheStatus::Miss => "miss",
                    }),
                    module: Some(module),
                    bytes: None,
                    error: None,
                },
                BuildEvent::Unchanged { bytes, .. } => JsonRecord {
                    input,
                    status: "unchanged",
                    cache: None,
                    module: None,
                    bytes: Some(*bytes),
                    error: None,
                },
                BuildEvent::Failed { error, .. } => JsonRecord {
                    input,
                    status: "failed",
                    cache: None,
                    module: None,
                    bytes: None,
                    error: Some(error),
                },
            }
        })
        .collect();
    serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string())
}

pub fn print_build_event(event: &BuildEvent, show_module: bool) {
    for line in format_build_event(event, show_module) {
        println!("{}", line);
    }
}

pub fn print_build_summary(events: &[BuildEvent]) {
    println!();
    for line in format_build_summary(events) {
        println!("{}", line);
    }
}

pub fn print_json_summary(events: &[BuildEvent]) {
    println!("{}", format_json_summary(events));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated(cache: CacheStatus) -> BuildEvent {
        BuildEvent::Generated {
            input: PathBuf::from("photos/dawn.jpg"),
            cache,
            module: "module.exports = {\n  src: \"a.jpg\"\n}".to_string(),
        }
    }

    fn failed() -> BuildEvent {
        BuildEvent::Failed {
            input: PathBuf::from("scan.gif"),
            error: "unsupported".to_string(),
        }
    }

    // =========================================================================
    // format_build_event
    // =========================================================================

    #[test]
    fn generated_event_shows_indented_module() {
        let lines = format_build_event(&generated(CacheStatus::Miss), true);
        assert_eq!(
            lines,
            vec![
                "photos/dawn.jpg → module (cache miss)",
                "    module.exports = {",
                "      src: \"a.jpg\"",
                "    }",
            ]
        );
    }

    #[test]
    fn generated_event_quiet() {
        let lines = format_build_event(&generated(CacheStatus::Hit), false);
        assert_eq!(lines, vec!["photos/dawn.jpg → module (cache hit)"]);
    }

    #[test]
    fn unchanged_event() {
        let event = BuildEvent::Unchanged {
            input: PathBuf::from("logo.png"),
            bytes: 42,
        };
        assert_eq!(
            format_build_event(&event, true),
            vec!["logo.png → unchanged (42 bytes)"]
        );
    }

    #[test]
    fn failed_event() {
        assert_eq!(
            format_build_event(&failed(), true),
            vec!["scan.gif → error: unsupported"]
        );
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    #[test]
    fn summary_counts_failures_and_cache() {
        let events = vec![
            generated(CacheStatus::Hit),
            generated(CacheStatus::Miss),
            failed(),
        ];
        assert_eq!(
            format_build_summary(&events),
            vec![
                "Built 2 resources, 1 failed",
                "Cache: 1 cached, 1 generated (2 total)",
            ]
        );
    }

    #[test]
    fn summary_without_cache_line() {
        let events = vec![generated(CacheStatus::Disabled)];
        assert_eq!(format_build_summary(&events), vec!["Built 1 resource"]);
    }

    #[test]
    fn json_summary_shape() {
        let events = vec![
            generated(CacheStatus::Miss),
            BuildEvent::Unchanged {
                input: PathBuf::from("logo.png"),
                bytes: 7,
            },
            failed(),
        ];
        let json: serde_json::Value =
            serde_json::from_str(&format_json_summary(&events)).unwrap();

        assert_eq!(json[0]["status"], "module");
        assert_eq!(json[0]["cache"], "miss");
        assert!(json[0]["module"].as_str().unwrap().starts_with("module.exports"));
        assert_eq!(json[1]["bytes"], 7);
        assert!(json[1].get("module").is_none());
        assert_eq!(json[2]["error"], "unsupported");
    }
}
