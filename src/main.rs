use clap::{Parser, Subcommand};
use rayon::prelude::*;
use responsive_loader::config;
use responsive_loader::emit::DirSink;
use responsive_loader::imaging::supported_input_extensions;
use responsive_loader::loader::{Loader, LoaderOutput, LoaderRequest};
use responsive_loader::output::{self, BuildEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "responsive-loader")]
#[command(about = "Resize images into hash-named responsive variants and a srcset module")]
#[command(long_about = "\
Resize images into hash-named responsive variants and a srcset module

Each input image is resized to the configured widths, the variants are
written under --out with content-hashed names, and a small JS module
describing them (srcSet, images, src, placeholder) is printed.

Configuration layers, later wins:

  stock defaults
  responsive.toml              # --config, or ./responsive.toml if present
  --query '?sizes[]=480&sizes[]=960&placeholder'

With no widths configured at all, inputs pass through unchanged.

Run 'responsive-loader gen-config' to generate a documented responsive.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Image files, or directories to search for images
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Config file, or a directory containing responsive.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resource query applied to every input, e.g. '?sizes[]=480&placeholder'
    #[arg(long)]
    query: Option<String>,

    /// Directory emitted variants are written to (cache entries are kept
    /// per output directory)
    #[arg(long, default_value = "dist")]
    out: PathBuf,

    /// Print a JSON summary instead of text
    #[arg(long)]
    json: bool,

    /// Don't print generated modules, only one line per input
    #[arg(long)]
    quiet: bool,

    /// Bypass the module cache even when the config enables it
    #[arg(long)]
    no_cache: bool,

    /// Worker threads (defaults to the number of CPU cores)
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Resize inputs, emit variants and print the generated modules
    Build(BuildArgs),
    /// Print a stock responsive.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Build(args) => build(args)?,
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn build(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_thread_pool(args.threads);

    let config_path = args.config.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut base = config::load_base(Some(&config_path))?;
    if args.no_cache {
        let overlay: toml::Value = toml::from_str("[cache]\nenabled = false")?;
        base = config::merge_toml(base, overlay);
    }

    let inputs = collect_inputs(&args.inputs);
    if inputs.is_empty() {
        return Err("no supported images found in the given inputs".into());
    }

    let out = std::path::absolute(&args.out).unwrap_or_else(|_| args.out.clone());
    let sink = DirSink::new(out);
    // Cached modules reference variants that only exist under the output
    // directory that was current when the entry was stored.
    let base = config::scope_cache_identifier(base, &format!("out={}", sink.root().display()));
    let loader = Loader::new(base).with_sink(Arc::new(sink));
    let query = args.query.as_deref();

    let (tx, rx) = std::sync::mpsc::channel::<BuildEvent>();
    let (json, show_module) = (args.json, !args.quiet);
    let printer = std::thread::spawn(move || {
        let mut events = Vec::new();
        for event in rx {
            if !json {
                output::print_build_event(&event, show_module);
            }
            events.push(event);
        }
        events
    });

    inputs.par_iter().for_each_with(tx, |tx, input| {
        let event = build_one(&loader, input, query);
        tx.send(event).ok();
    });

    let events = printer.join().map_err(|_| "output thread panicked")?;
    if args.json {
        output::print_json_summary(&events);
    } else {
        output::print_build_summary(&events);
    }

    let failed = events.iter().filter(|e| e.is_failure()).count();
    if failed > 0 {
        return Err(format!("{failed} of {} inputs failed", events.len()).into());
    }
    Ok(())
}

fn build_one(loader: &Loader, input: &Path, query: Option<&str>) -> BuildEvent {
    let source = match std::fs::read(input) {
        Ok(bytes) => bytes,
        Err(e) => {
            return BuildEvent::Failed {
                input: input.to_path_buf(),
                error: e.to_string(),
            };
        }
    };
    let request = LoaderRequest {
        source: &source,
        resource_path: input,
        query,
    };
    match loader.load(&request) {
        Ok(LoaderOutput::Module { source, cache }) => BuildEvent::Generated {
            input: input.to_path_buf(),
            cache,
            module: source,
        },
        Ok(LoaderOutput::Unchanged(bytes)) => BuildEvent::Unchanged {
            input: input.to_path_buf(),
            bytes: bytes.len(),
        },
        Err(e) => BuildEvent::Failed {
            input: input.to_path_buf(),
            error: e.to_string(),
        },
    }
}

/// Expand directories into the supported images beneath them. Files named
/// explicitly are kept whatever their extension, so unsupported ones get a
/// proper error.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_supported_image(path))
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            supported_input_extensions().contains(&ext.as_str())
        })
}

/// Log to stderr so stdout stays clean for modules and JSON. `RUST_LOG`
/// overrides the default `info` level.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Initialize the rayon thread pool.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(requested: Option<usize>) {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let threads = requested.map_or(cores, |n| n.clamp(1, cores));
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
