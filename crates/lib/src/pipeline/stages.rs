//! Individual pipeline stages.
//!
//! Each stage takes exactly what it needs and returns what later stages
//! consume, so it can be exercised on its own.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::plan::{DOCKER_SYSROOT_PATHS, GenerationPlan, TARGET_SWIFT_SUBTREES, TargetAcquisition};
use crate::cache::Engine;
use crate::error::GeneratorError;
use crate::fetch::{ArtifactFetcher, ArtifactSource};
use crate::fs::{self, FsError};
use crate::packages::PackageIndex;
use crate::paths::PathsConfiguration;
use crate::unpack::{UnpackOptions, unpack};

/// Archives retrieved by [`fetch_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifacts {
  pub host_toolchain: PathBuf,
  /// Present only for the package-download path.
  pub target_swift: Option<PathBuf>,
}

/// Remove the SDK and toolchain directories left by an earlier run.
pub async fn reset_directories(paths: &PathsConfiguration) -> Result<(), FsError> {
  fs::remove_recursively(&paths.sdk_dir).await?;
  fs::remove_recursively(&paths.toolchain_dir).await
}

pub async fn scaffold_directories(paths: &PathsConfiguration) -> Result<(), FsError> {
  for dir in [&paths.artifacts_cache, &paths.sdk_dir, &paths.toolchain_dir] {
    fs::create_directory_if_needed(dir).await?;
  }
  Ok(())
}

/// Fetch the toolchain archives and place each in `artifacts_cache` under its file name.
///
/// The returned paths point into `artifacts_cache`.
pub async fn fetch_artifacts(
  fetcher: &ArtifactFetcher,
  engine: &Engine,
  plan: &GenerationPlan,
  artifacts_cache: &Path,
) -> Result<FetchedArtifacts, GeneratorError> {
  let cached = fetcher.fetch(&plan.host_toolchain, engine).await?;
  let host_toolchain = place_artifact(&cached, artifacts_cache).await?;
  let target_swift = match plan.target_swift() {
    Some(source) => {
      let cached = fetcher.fetch(&source, engine).await?;
      Some(place_artifact(&cached, artifacts_cache).await?)
    }
    None => None,
  };

  Ok(FetchedArtifacts {
    host_toolchain,
    target_swift,
  })
}

async fn place_artifact(cached: &Path, artifacts_cache: &Path) -> Result<PathBuf, FsError> {
  let Some(name) = cached.file_name() else {
    return Ok(cached.to_path_buf());
  };
  let placed = artifacts_cache.join(name);
  fs::link_or_copy(cached, &placed).await?;
  debug!(artifact = ?placed, "placed artifact");
  Ok(placed)
}

/// Download the distribution's required packages and extract them into `sdk_dir`.
///
/// Returns the number of installed packages.
pub async fn install_distribution_packages(
  fetcher: &ArtifactFetcher,
  engine: &Engine,
  plan: &GenerationPlan,
  sdk_dir: &Path,
) -> Result<usize, GeneratorError> {
  let TargetAcquisition::PackageDownload {
    release,
    mirror,
    packages_index,
    ..
  } = &plan.acquisition
  else {
    return Ok(0);
  };

  let index_file = fetcher.fetch(&ArtifactSource::http(packages_index.clone()), engine).await?;
  let index_url = packages_index.clone();
  let index = tokio::task::spawn_blocking(move || PackageIndex::read_gz(&index_file, &index_url)).await??;
  debug!(packages = index.len(), index = %packages_index, "loaded package index");

  let records = index.resolve(release.required_packages(), packages_index)?;
  for record in &records {
    let source = ArtifactSource::http_verified(record.url(mirror), record.sha256.clone());
    let deb = fetcher.fetch(&source, engine).await?;
    unpack(&deb, sdk_dir, &UnpackOptions::default()).await?;
    debug!(package = %record.name, "installed package");
  }

  info!(count = records.len(), release = %release.codename(), "installed distribution packages");
  Ok(records.len())
}

pub async fn unpack_host_toolchain(archive: &Path, toolchain_dir: &Path) -> Result<usize, GeneratorError> {
  Ok(unpack(archive, toolchain_dir, &UnpackOptions::strip(1)).await?)
}

/// Populate the SDK dir with the target's Swift runtime and, for Docker, its system files.
pub async fn acquire_target_swift(
  fetcher: &ArtifactFetcher,
  engine: &Engine,
  plan: &GenerationPlan,
  artifacts: &FetchedArtifacts,
  sdk_dir: &Path,
) -> Result<(), GeneratorError> {
  match &plan.acquisition {
    TargetAcquisition::Docker { image, platform } => {
      let source = ArtifactSource::DockerImage {
        image: image.clone(),
        platform: platform.clone(),
        paths: DOCKER_SYSROOT_PATHS.iter().map(|p| p.to_string()).collect(),
      };
      let rootfs = fetcher.fetch(&source, engine).await?;
      let dest = sdk_dir.to_path_buf();
      tokio::task::spawn_blocking(move || fs::copy_tree(&rootfs, &dest)).await??;
      info!(image = %image, "copied sysroot from image");
    }
    TargetAcquisition::PackageDownload { url, .. } => {
      let archive = match &artifacts.target_swift {
        Some(archive) => archive.clone(),
        None => fetcher.fetch(&ArtifactSource::http(url.clone()), engine).await?,
      };
      let options = UnpackOptions::strip(1).only(TARGET_SWIFT_SUBTREES.iter().copied());
      let count = unpack(&archive, sdk_dir, &options).await?;
      info!(entries = count, "unpacked target swift runtime");
    }
  }
  Ok(())
}

/// Make absolute symlinks in the SDK and toolchain relative to their own roots.
pub async fn fix_absolute_symlinks(paths: &PathsConfiguration) -> Result<usize, GeneratorError> {
  let sdk_dir = paths.sdk_dir.clone();
  let toolchain_dir = paths.toolchain_dir.clone();
  let rewritten = tokio::task::spawn_blocking(move || -> Result<usize, FsError> {
    Ok(fs::fix_absolute_symlinks(&sdk_dir)? + fs::fix_absolute_symlinks(&toolchain_dir)?)
  })
  .await??;

  debug!(rewritten, "fixed absolute symlinks");
  Ok(rewritten)
}

/// The message shown once a bundle is ready.
pub fn success_message(paths: &PathsConfiguration, artifact_id: &str) -> String {
  format!(
    "Generated Swift SDK bundle at {bundle}.\n\
     Install it with:\n\n    swift experimental-sdk install {bundle}\n\n\
     After installation, build with:\n\n    swift build --experimental-swift-sdk {artifact_id}",
    bundle = paths.artifact_bundle.display(),
  )
}
