//! Container runtime access through the `docker` command line.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::FetchError;
use crate::consts::DOCKER_PROGRAM_ENV;

/// Fragments of `docker cp` errors meaning the source path is absent in the image.
const MISSING_PATH_MARKERS: &[&str] = &["Could not find the file", "No such container:path"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerCli {
  program: String,
}

impl Default for DockerCli {
  fn default() -> Self {
    Self::new("docker")
  }
}

impl DockerCli {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  /// Use `SDKGEN_DOCKER` when set, else `docker` from `PATH`.
  pub fn from_env() -> Self {
    std::env::var(DOCKER_PROGRAM_ENV).map(Self::new).unwrap_or_default()
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  /// Copy `paths` out of `image` into `dest`, keeping their absolute layout.
  ///
  /// Paths that do not exist in the image are skipped. The container is removed
  /// whether or not the copies succeed.
  pub async fn copy_paths(&self, image: &str, platform: &str, paths: &[String], dest: &Path) -> Result<(), FetchError> {
    let container = self.run(image, &["create", "--platform", platform, image]).await?;
    let container = container.trim().to_string();
    info!(image = %image, container = %container, "created container");

    let copied = self.copy_all(image, &container, paths, dest).await;

    if let Err(e) = self.run(image, &["rm", "-f", &container]).await {
      warn!(container = %container, error = %e, "failed to remove container");
    }
    copied
  }

  async fn copy_all(&self, image: &str, container: &str, paths: &[String], dest: &Path) -> Result<(), FetchError> {
    for path in paths {
      let target = dest.join(path.trim_start_matches('/'));
      if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
          .await
          .map_err(|e| FetchError::io(parent, e))?;
      }

      let source = format!("{container}:{path}");
      let target_arg = target.to_string_lossy();
      match self.run(image, &["cp", &source, &target_arg]).await {
        Ok(_) => debug!(path = %path, "copied from container"),
        Err(FetchError::Container { message, .. }) if MISSING_PATH_MARKERS.iter().any(|m| message.contains(m)) => {
          debug!(path = %path, "path not present in image, skipping");
        }
        Err(e) => return Err(e),
      }
    }
    Ok(())
  }

  async fn run(&self, image: &str, args: &[&str]) -> Result<String, FetchError> {
    debug!(program = %self.program, ?args, "running container command");
    let output = Command::new(&self.program)
      .args(args)
      .output()
      .await
      .map_err(|e| FetchError::Container {
        image: image.to_string(),
        message: format!("failed to run {}: {e}", self.program),
      })?;

    if !output.status.success() {
      return Err(FetchError::Container {
        image: image.to_string(),
        message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}
