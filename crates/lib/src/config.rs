//! Settings for a single generation run.

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::fetch::FetchOptions;
use crate::paths::PathsConfiguration;
use crate::platform::paths::engine_cache_dir;
use crate::platform::{HostPlatform, TargetTriple};
use crate::versions::VersionsConfiguration;

/// Everything that drives the pipeline's branches. Read-only once a run starts.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
  /// Keep the SDK and toolchain directories from an earlier run.
  pub is_incremental: bool,
  /// Copy the target sysroot out of the distribution's Swift Docker image.
  pub should_use_docker: bool,
  pub artifact_id: String,
  /// Directory receiving `<artifact-id>.artifactbundle`.
  pub bundles_root: PathBuf,
  pub engine_cache_path: PathBuf,
  pub target: TargetTriple,
  pub host: HostPlatform,
  pub versions: VersionsConfiguration,
  pub fetch: FetchOptions,
}

impl GenerationConfig {
  /// A clean, package-based run with the default artifact id.
  pub fn new(
    target: TargetTriple,
    host: HostPlatform,
    versions: VersionsConfiguration,
    bundles_root: PathBuf,
    engine_cache_path: PathBuf,
  ) -> Self {
    Self {
      is_incremental: false,
      should_use_docker: false,
      artifact_id: versions.default_artifact_id(target.cpu),
      bundles_root,
      engine_cache_path,
      target,
      host,
      versions,
      fetch: FetchOptions::default(),
    }
  }

  /// Like [`GenerationConfig::new`], with the engine cache at its default location.
  pub fn with_default_engine(
    target: TargetTriple,
    host: HostPlatform,
    versions: VersionsConfiguration,
    bundles_root: PathBuf,
  ) -> Result<Self, ConfigError> {
    Ok(Self::new(target, host, versions, bundles_root, engine_cache_dir()?))
  }

  pub fn paths(&self) -> PathsConfiguration {
    PathsConfiguration::new(
      &self.bundles_root,
      &self.artifact_id,
      &self.target,
      &self.versions.distribution,
    )
  }
}
