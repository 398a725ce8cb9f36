//! The host-facing entry point.
//!
//! One [`Loader`] serves many invocations. Each invocation takes the source
//! bytes, the resource path and its optional query string, and produces
//! either the untouched source (no widths configured) or the generated
//! module text:
//!
//! ```text
//! query ─► config ─► options ─┬─ disable ─► 1 artifact ───► Module
//!                             ├─ no widths ───────────────► Unchanged(bytes)
//!                             └─ cache? ─► adapter ─► plan ─► resize ─► name ─► describe ─► Module
//! ```
//!
//! Failures are terminal for the invocation: nothing partial is emitted
//! into the module or stored in the cache.

use crate::cache::{ArtifactCache, CacheError, CacheStatus, fingerprint};
use crate::config::{self, ConfigError, LoaderConfig};
use crate::descriptor::{Descriptor, placeholder_data_uri};
use crate::emit::EmitSink;
use crate::imaging::{
    self, AdapterKind, BackendError, ImageBackend, ResizeResult, SizeRequest, get_dimensions,
    plan_sizes, run_transformations,
};
use crate::naming::{Namer, PathFn, PathRules, PathTransform, Resource};
use crate::options::{self, OptionsError, ResolvedOptions};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Nominal dimensions reported for the single artifact of disable mode.
pub const DISABLED_DIMENSION: u32 = 100;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error("adapter failure: {0}")]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("no artifacts were produced")]
    NoArtifacts,
}

/// Opens a backend for a source. Swappable so callers can plug in their own
/// adapter family.
pub type BackendOpener = Arc<
    dyn Fn(AdapterKind, &[u8]) -> Result<Box<dyn ImageBackend + Send>, BackendError> + Send + Sync,
>;

/// One invocation's input.
#[derive(Debug, Clone, Copy)]
pub struct LoaderRequest<'a> {
    pub source: &'a [u8],
    pub resource_path: &'a Path,
    /// Resource query including the leading `?`.
    pub query: Option<&'a str>,
}

/// One invocation's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderOutput {
    /// No widths were configured; the source passes through untouched.
    Unchanged(Vec<u8>),
    /// Generated module text.
    Module { source: String, cache: CacheStatus },
}

impl LoaderOutput {
    /// Bytes handed back to the host.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            LoaderOutput::Unchanged(bytes) => bytes,
            LoaderOutput::Module { source, .. } => source.as_bytes(),
        }
    }
}

pub struct Loader {
    base: toml::Value,
    sink: Option<Arc<dyn EmitSink>>,
    output_path: Option<PathFn>,
    public_path: Option<PathFn>,
    open: BackendOpener,
}

impl Loader {
    /// A loader over an already merged base layer (defaults plus config
    /// file, see [`config::load_base`]).
    pub fn new(base: toml::Value) -> Self {
        Self {
            base,
            sink: None,
            output_path: None,
            public_path: None,
            open: Arc::new(imaging::open_backend),
        }
    }

    /// A loader whose base layer is `config`.
    pub fn from_config(config: &LoaderConfig) -> Result<Self, LoaderError> {
        config.validate()?;
        let base = toml::Value::try_from(config)
            .map_err(|e| ConfigError::Validation(format!("unserializable config: {e}")))?;
        Ok(Self::new(base))
    }

    /// Where emitted artifacts go. Without a sink nothing is emitted, as if
    /// `emit_file` were off.
    pub fn with_sink(mut self, sink: Arc<dyn EmitSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Compute output locations with `f` instead of `output_path`.
    pub fn with_output_path_fn(mut self, f: PathFn) -> Self {
        self.output_path = Some(f);
        self
    }

    /// Compute public references with `f` instead of `public_path`.
    pub fn with_public_path_fn(mut self, f: PathFn) -> Self {
        self.public_path = Some(f);
        self
    }

    pub fn with_backend_opener(mut self, open: BackendOpener) -> Self {
        self.open = open;
        self
    }

    /// Run one invocation and report the outcome through `callback`, which
    /// is called exactly once.
    pub fn run<F>(&self, request: &LoaderRequest<'_>, callback: F)
    where
        F: FnOnce(Result<LoaderOutput, LoaderError>),
    {
        callback(self.load(request));
    }

    /// Run one invocation.
    pub fn load(&self, request: &LoaderRequest<'_>) -> Result<LoaderOutput, LoaderError> {
        let config = config::resolve_for_query(&self.base, request.query)?;
        let opts = options::resolve(&config, request.resource_path)?;

        let rules = self.path_rules(&opts);
        let resource = Resource {
            path: request.resource_path,
            ext: &opts.ext,
            query: request.query,
            context: opts.context.as_deref(),
        };

        if opts.disable {
            let source = self.describe_disabled(request, &opts, resource, &rules)?;
            return Ok(LoaderOutput::Module {
                source,
                cache: CacheStatus::Disabled,
            });
        }

        let Some(sizes) = opts.sizes.clone() else {
            debug!(path = %request.resource_path.display(), "no widths configured, passing through");
            return Ok(LoaderOutput::Unchanged(request.source.to_vec()));
        };

        let transform = || self.transform(request, &opts, &sizes, resource, &rules);

        let (source, cache) = match &opts.cache {
            Some(cache_opts) => {
                let key = fingerprint(
                    request.resource_path,
                    request.source,
                    &config,
                    &cache_opts.identifier,
                );
                ArtifactCache::new(cache_opts.directory.clone(), cache_opts.compression)
                    .get_or_compute(&key, transform)?
            }
            None => (transform()?, CacheStatus::Disabled),
        };

        info!(
            path = %request.resource_path.display(),
            cache = ?cache,
            "generated module"
        );
        Ok(LoaderOutput::Module { source, cache })
    }

    fn path_rules(&self, opts: &ResolvedOptions) -> PathRules {
        PathRules {
            output_path: match &self.output_path {
                Some(f) => Some(PathTransform::Custom(Arc::clone(f))),
                None => opts.output_path.clone().map(PathTransform::Prefix),
            },
            public_path: match &self.public_path {
                Some(f) => Some(PathTransform::Custom(Arc::clone(f))),
                None => opts.public_path.clone().map(PathTransform::Prefix),
            },
            runtime_public_path: opts.runtime_public_path.clone(),
        }
    }

    fn sink_for(&self, opts: &ResolvedOptions) -> Option<&dyn EmitSink> {
        if opts.emit_file {
            self.sink.as_deref()
        } else {
            None
        }
    }

    /// Describe the untouched source as one nominal 100×100 artifact. No
    /// adapter is involved.
    fn describe_disabled(
        &self,
        request: &LoaderRequest<'_>,
        opts: &ResolvedOptions,
        resource: Resource<'_>,
        rules: &PathRules,
    ) -> Result<String, LoaderError> {
        let mut namer = Namer::new(&opts.name, resource, rules, self.sink_for(opts));
        let artifact = namer.create(&ResizeResult {
            data: request.source.to_vec(),
            width: DISABLED_DIMENSION,
            height: DISABLED_DIMENSION,
        });
        let descriptor = Descriptor::new(vec![artifact], None).ok_or(LoaderError::NoArtifacts)?;
        Ok(descriptor.to_module_source(opts.export))
    }

    fn transform(
        &self,
        request: &LoaderRequest<'_>,
        opts: &ResolvedOptions,
        sizes: &SizeRequest,
        resource: Resource<'_>,
        rules: &PathRules,
    ) -> Result<String, LoaderError> {
        let backend = (self.open)(opts.adapter, request.source)?;
        let dims = get_dimensions(backend.as_ref())?;
        let plan = plan_sizes(&sizes.candidates(), dims.width, opts.placeholder);
        debug!(
            path = %request.resource_path.display(),
            natural = dims.width,
            widths = ?plan.widths,
            placeholder = ?plan.placeholder,
            adapter = opts.adapter.name(),
            "planned sizes"
        );

        let transformed = run_transformations(backend.as_ref(), &plan, opts.mime, &opts.encoding)?;

        let mut namer = Namer::new(&opts.name, resource, rules, self.sink_for(opts));
        let artifacts = transformed
            .results
            .iter()
            .map(|result| namer.create(result))
            .collect();
        let placeholder = transformed
            .placeholder
            .map(|p| placeholder_data_uri(opts.mime, &p.data));

        let descriptor = Descriptor::new(artifacts, placeholder).ok_or(LoaderError::NoArtifacts)?;
        Ok(descriptor.to_module_source(opts.export))
    }
}
