//! Artifact naming: file names, output locations, and public references.
//!
//! Every resize result becomes an [`Artifact`] by way of three steps:
//!
//! 1. **File name**: the name template is interpolated with the result's
//!    content hash, dimensions and facts about the source resource.
//! 2. **Output location**: `output_path` joined with the file name, or a
//!    caller-supplied function of it.
//! 3. **Public reference**: the expression the generated module uses to
//!    reach the artifact at runtime.
//!
//! ## Template tokens
//!
//! | Token | Value |
//! |---|---|
//! | `[hash]`, `[contenthash]` | SHA-256 hex of the artifact bytes |
//! | `[hash:8]`, `[contenthash:sha256:8]` | the same, truncated |
//! | `[ext]` | output extension (after any `format` conversion) |
//! | `[name]` | source file stem |
//! | `[path]` | source directory relative to the context, `..` → `_` |
//! | `[folder]` | last segment of `[path]` |
//! | `[query]` | resource query, up to any `#` |
//! | `[width]`, `[height]` | artifact dimensions |
//!
//! Tokens match case-insensitively. Anything else in brackets is left alone.

use crate::descriptor::Artifact;
use crate::emit::EmitSink;
use crate::imaging::ResizeResult;
use crate::options::replace_ignore_case;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// SHA-256 of `data`, as lowercase hex.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

fn hash_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[(?:[^:\]]+:)?(?:hash|contenthash)(?::[a-z]+\d*)?(?::(\d+))?\]")
            .expect("hash token pattern is valid")
    })
}

fn dotdot_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.\.(/)?").expect("dot-dot pattern is valid"))
}

/// The resource being transformed, as seen by the name template.
#[derive(Debug, Clone, Copy)]
pub struct Resource<'a> {
    pub path: &'a Path,
    /// Extension of the artifacts, not of the source.
    pub ext: &'a str,
    pub query: Option<&'a str>,
    pub context: Option<&'a Path>,
}

impl Resource<'_> {
    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string())
    }

    /// Source directory relative to the context, posix separators, with a
    /// trailing `/` unless empty.
    fn directory(&self) -> String {
        let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return String::new();
        };
        let relative = match self.context {
            Some(context) => relative_path(context, dir),
            None => dir.to_path_buf(),
        };
        let posix = relative.to_string_lossy().replace('\\', "/");
        let mut directory = dotdot_pattern().replace_all(&posix, "_$1").into_owned();
        if directory.is_empty() || directory == "/" {
            return String::new();
        }
        if !directory.ends_with('/') {
            directory.push('/');
        }
        directory
    }

    fn query_token(&self) -> &str {
        match self.query {
            Some(q) if q.len() > 1 => q.split('#').next().unwrap_or_default(),
            _ => "",
        }
    }
}

/// Lexical relative path from `base` to `target`. Neither path is touched
/// on disk.
fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();
    let target: Vec<Component> = target.components().filter(|c| *c != Component::CurDir).collect();
    let common = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for component in &target[common..] {
        out.push(component.as_os_str());
    }
    out
}

/// Fill in the name template for one resize result.
pub fn interpolate_name(template: &str, resource: &Resource<'_>, result: &ResizeResult) -> String {
    let hash = content_hash(&result.data);
    let name = hash_pattern().replace_all(template, |caps: &regex::Captures<'_>| {
        let len = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(hash.len());
        hash[..len.min(hash.len())].to_string()
    });

    let directory = resource.directory();
    let folder = directory
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    [
        ("[ext]", resource.ext.to_string()),
        ("[name]", resource.stem()),
        ("[path]", directory),
        ("[folder]", folder),
        ("[query]", resource.query_token().to_string()),
        ("[width]", result.width.to_string()),
        ("[height]", result.height.to_string()),
    ]
    .iter()
    .fold(name.into_owned(), |acc, (token, value)| {
        replace_ignore_case(&acc, token, value)
    })
}

/// A caller-supplied mapping from file name to path or URL.
pub type PathFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// How to derive a location from a file name.
#[derive(Clone)]
pub enum PathTransform {
    /// Join onto this prefix.
    Prefix(String),
    /// Call a function with the file name.
    Custom(PathFn),
}

impl fmt::Debug for PathTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathTransform::Prefix(p) => f.debug_tuple("Prefix").field(p).finish(),
            PathTransform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Where a generated module finds an artifact at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicReference {
    /// The host's runtime public path followed by the output location.
    Runtime { expression: String, location: String },
    /// A fixed URL or path.
    Literal(String),
}

impl PublicReference {
    /// Source text of the expression, e.g.
    /// `__webpack_public_path__ + "img/a-640.jpg"` or `"https://cdn/a-640.jpg"`.
    pub fn to_expression(&self) -> String {
        match self {
            PublicReference::Runtime {
                expression,
                location,
            } => format!("{expression} + {}", js_string(location)),
            PublicReference::Literal(url) => js_string(url),
        }
    }
}

/// Quote `s` as a string literal. JSON string syntax is valid JavaScript.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

/// Output path and public path rules for one invocation.
#[derive(Debug, Clone)]
pub struct PathRules {
    pub output_path: Option<PathTransform>,
    pub public_path: Option<PathTransform>,
    pub runtime_public_path: String,
}

impl PathRules {
    /// Output location for `file_name`: a posix join onto the prefix, or
    /// the file name itself when there is no rule.
    pub fn output_location(&self, file_name: &str) -> String {
        match &self.output_path {
            None => file_name.to_string(),
            Some(PathTransform::Custom(f)) => f(file_name),
            Some(PathTransform::Prefix(prefix)) => posix_join(prefix, file_name),
        }
    }

    pub fn public_reference(&self, file_name: &str, location: &str) -> PublicReference {
        match &self.public_path {
            None => PublicReference::Runtime {
                expression: self.runtime_public_path.clone(),
                location: location.to_string(),
            },
            Some(PathTransform::Custom(f)) => PublicReference::Literal(f(file_name)),
            Some(PathTransform::Prefix(prefix)) => {
                PublicReference::Literal(join_public_path(prefix, file_name))
            }
        }
    }
}

/// Append `file_name` to a public path. Absolute URLs get it joined onto
/// their path with query and fragment kept; anything else is concatenated
/// with a `/` in between.
fn join_public_path(public_path: &str, file_name: &str) -> String {
    if let Ok(mut url) = url::Url::parse(public_path)
        && !url.cannot_be_a_base()
    {
        let mut path = url.path().to_string();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(file_name);
        url.set_path(&path);
        return url.to_string();
    }
    if public_path.ends_with('/') {
        format!("{public_path}{file_name}")
    } else {
        format!("{public_path}/{file_name}")
    }
}

/// Join posix path segments, collapsing `.` and resolving `..` lexically.
fn posix_join(prefix: &str, file_name: &str) -> String {
    let absolute = prefix.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in prefix.split('/').chain(file_name.split('/')) {
        match segment {
            "" | "." => {}
            ".." if parts.last().is_some_and(|p| *p != "..") => {
                parts.pop();
            }
            ".." if absolute => {}
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Turns resize results into artifacts, emitting each location once.
pub struct Namer<'a> {
    template: &'a str,
    resource: Resource<'a>,
    rules: &'a PathRules,
    sink: Option<&'a dyn EmitSink>,
    emitted: HashSet<String>,
}

impl<'a> Namer<'a> {
    /// `sink` is `None` when emission is switched off.
    pub fn new(
        template: &'a str,
        resource: Resource<'a>,
        rules: &'a PathRules,
        sink: Option<&'a dyn EmitSink>,
    ) -> Self {
        Self {
            template,
            resource,
            rules,
            sink,
            emitted: HashSet::new(),
        }
    }

    pub fn create(&mut self, result: &ResizeResult) -> Artifact {
        let file_name = interpolate_name(self.template, &self.resource, result);
        let location = self.rules.output_location(&file_name);
        let reference = self.rules.public_reference(&file_name, &location);

        if let Some(sink) = self.sink
            && self.emitted.insert(location.clone())
        {
            sink.emit(&location, &result.data);
        } else if self.sink.is_some() {
            debug!(%location, "already emitted");
        }

        Artifact {
            location,
            reference,
            width: result.width,
            height: result.height,
        }
    }
}
