//! # Responsive Loader
//!
//! A build-time image transform: one source image in, a set of hash-named
//! resized variants plus a small generated module describing them out.
//!
//! ```js
//! import hero from "./hero.jpg?sizes[]=480&sizes[]=960&placeholder";
//! // hero.srcSet      "…/3f9a…-480.jpg 480w,…/c01d…-960.jpg 960w"
//! // hero.src         "…/3f9a…-480.jpg"
//! // hero.placeholder "data:image/jpeg;base64,…"
//! ```
//!
//! A host build system calls the [`loader::Loader`] once per resource. The
//! crate also ships a CLI (`responsive-loader build`) that plays the host for
//! files on disk.
//!
//! # Architecture: One Invocation
//!
//! ```text
//! query + responsive.toml ─► LoaderConfig ─► ResolvedOptions
//!                                                 │
//!             ┌───────────── cache hit? ◄─────────┤
//!             │                                   ▼
//!             │        adapter.metadata() ─► SizePlan ─► rayon fan-out of adapter.resize()
//!             │                                                  │
//!             │                    Namer (hash, paths, emit once) ◄┘
//!             │                                   │
//!             └────────────► module text ◄── Descriptor
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`loader`] | Entry point: one invocation from source bytes to module text |
//! | [`config`] | Layered `responsive.toml` loading, merging and validation |
//! | [`query`] | Resource query string parsing (`?sizes[]=480&placeholder`) |
//! | [`options`] | Normalizes merged config into per-invocation parameters |
//! | [`imaging`] | Adapter trait, `image`-crate backends, size planning, the resize fan-out |
//! | [`naming`] | Name templates, output locations, public references, emit-once |
//! | [`descriptor`] | Generated module text (`srcSet`, `images`, `src`, `placeholder`) |
//! | [`cache`] | Content-addressed on-disk cache of generated modules |
//! | [`emit`] | Emission sinks: filesystem and in-memory |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Plan Order Is Output Order
//!
//! Widths are clamped to the source's natural width and deduplicated in the
//! order they were requested. Resizes run concurrently, but results are
//! reassembled by width, so the `srcSet` order, the `images` order and the
//! choice of default (`src` is the first planned width) never depend on
//! which resize finished first. Same bytes and same config always produce
//! byte-identical module text.
//!
//! ## Content-Hashed Names
//!
//! `[hash]` is the SHA-256 of the encoded variant, not of the source. Two
//! requests that clamp to the same width are one variant, one file, one
//! emission.
//!
//! ## Pure-Rust Imaging
//!
//! Both adapters decode and encode with the `image` crate. No system
//! libraries, no external processes.
//!
//! ## Whole-Transform Cache
//!
//! The cache stores the finished module text keyed by a fingerprint of the
//! source and every resolved option. A hit skips decoding entirely. Variants
//! are not re-emitted on a hit; they were emitted by the run that filled the
//! cache.

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod emit;
pub mod imaging;
pub mod loader;
pub mod naming;
pub mod options;
pub mod output;
pub mod query;
