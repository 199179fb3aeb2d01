//! sdkgen-lib: generation of Swift cross-compilation SDK bundles.
//!
//! This crate provides the pipeline that assembles a bundle:
//! - `Pipeline`: ordered stages turning a `GenerationConfig` into a bundle
//! - `ArtifactFetcher`: cache-aware HTTP and Docker retrieval
//! - `Engine`: content-addressed cache shared between runs
//! - `manifest`: the toolset, destination and bundle JSON documents

pub mod cache;
pub mod config;
pub mod consts;
pub mod distribution;
pub mod error;
pub mod fetch;
pub mod fixups;
pub mod fs;
pub mod linker;
pub mod manifest;
pub mod packages;
pub mod paths;
pub mod pipeline;
pub mod platform;
pub mod unpack;
pub mod util;
pub mod versions;

pub use config::GenerationConfig;
pub use error::{ConfigError, GeneratorError};
pub use pipeline::{LogReporter, Pipeline, Reporter, Stage};
