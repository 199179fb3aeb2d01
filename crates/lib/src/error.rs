//! Error types surfaced by the generation pipeline.
//!
//! Each component owns its error enum; [`GeneratorError`] wraps them without
//! altering the underlying error so the caller sees the first failure as-is.

use thiserror::Error;

use crate::cache::CacheError;
use crate::distribution::LinuxDistribution;
use crate::fetch::FetchError;
use crate::fs::FsError;
use crate::unpack::UnpackError;

/// Invalid or unsupported generation settings.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The distribution has no package-based path and must be built from a Docker image.
  #[error("distribution {0} is only supported by the Docker-based generator, pass --with-docker")]
  DistributionSupportsOnlyDockerGenerator(LinuxDistribution),

  #[error("unknown CPU architecture: {0}")]
  UnknownCpu(String),

  #[error("unknown distribution: {0}")]
  UnknownDistribution(String),

  #[error("unsupported host platform: {0}")]
  UnsupportedHost(String),

  #[error("environment variable {0} is not set")]
  MissingEnv(&'static str),
}

/// The first fatal error of a generation run.
#[derive(Debug, Error)]
pub enum GeneratorError {
  #[error(transparent)]
  Configuration(#[from] ConfigError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Filesystem(#[from] FsError),

  #[error(transparent)]
  Unpack(#[from] UnpackError),

  #[error(transparent)]
  Cache(#[from] CacheError),

  /// A blocking worker task panicked or was cancelled.
  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl GeneratorError {
  /// Returns true for the "only Docker can build this distribution" failure.
  pub fn is_docker_only_distribution(&self) -> bool {
    matches!(
      self,
      GeneratorError::Configuration(ConfigError::DistributionSupportsOnlyDockerGenerator(_))
    )
  }
}
