//! Resolution of a [`GenerationConfig`] into the concrete work of a run.

use crate::config::GenerationConfig;
use crate::distribution::{LinuxDistribution, UbuntuRelease};
use crate::error::ConfigError;
use crate::fetch::ArtifactSource;
use crate::platform::{HostPlatform, TargetTriple};

/// How the target sysroot is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAcquisition {
  /// Copy system headers and libraries out of an official Swift image.
  Docker { image: String, platform: String },
  /// Download the target Swift toolchain and the distribution's packages.
  PackageDownload {
    url: String,
    release: UbuntuRelease,
    mirror: String,
    packages_index: String,
  },
}

/// Paths copied out of the Docker image into the SDK dir.
pub const DOCKER_SYSROOT_PATHS: &[&str] = &["/usr/include", "/usr/lib", "/lib", "/lib64", "/usr/lib64"];

/// Target Swift subtrees needed in the sysroot.
pub const TARGET_SWIFT_SUBTREES: &[&str] = &[
  "usr/lib/swift/linux",
  "usr/lib/swift_static/linux",
  "usr/lib/swift/shims",
  "usr/lib/swift_static/shims",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPlan {
  pub host: HostPlatform,
  pub target: TargetTriple,
  pub host_toolchain: ArtifactSource,
  pub acquisition: TargetAcquisition,
  pub lld_version: String,
  pub lld_archive_url: String,
}

impl GenerationPlan {
  /// The target Swift package, when the package-download path is taken.
  pub fn target_swift(&self) -> Option<ArtifactSource> {
    match &self.acquisition {
      TargetAcquisition::PackageDownload { url, .. } => Some(ArtifactSource::http(url.clone())),
      TargetAcquisition::Docker { .. } => None,
    }
  }

  pub fn uses_docker(&self) -> bool {
    matches!(self.acquisition, TargetAcquisition::Docker { .. })
  }

  /// Every URL the run may download, for reachability checks.
  pub fn remote_urls(&self) -> Vec<String> {
    let mut urls = Vec::new();
    if let ArtifactSource::Http { url, .. } = &self.host_toolchain {
      urls.push(url.clone());
    }
    if let TargetAcquisition::PackageDownload {
      url, packages_index, ..
    } = &self.acquisition
    {
      urls.push(url.clone());
      urls.push(packages_index.clone());
    }
    urls.push(self.lld_archive_url.clone());
    urls
  }
}

/// Decide what a run will do. Performs no I/O.
///
/// Only Ubuntu has a package-based sysroot path; every other distribution
/// requires the Docker path.
pub fn resolve_plan(config: &GenerationConfig) -> Result<GenerationPlan, ConfigError> {
  let versions = &config.versions;
  let cpu = config.target.cpu;

  let acquisition = if config.should_use_docker {
    TargetAcquisition::Docker {
      image: versions.docker_image(),
      platform: format!("linux/{}", cpu.debian_name()),
    }
  } else {
    match versions.distribution {
      LinuxDistribution::Ubuntu(release) => TargetAcquisition::PackageDownload {
        url: versions.target_swift_url(cpu),
        release,
        mirror: versions.ubuntu_mirror(cpu),
        packages_index: versions.ubuntu_packages_index_url(release, cpu),
      },
      other => return Err(ConfigError::DistributionSupportsOnlyDockerGenerator(other)),
    }
  };

  Ok(GenerationPlan {
    host: config.host,
    target: config.target.clone(),
    host_toolchain: ArtifactSource::http(versions.host_toolchain_url(&config.host)),
    acquisition,
    lld_version: versions.lld_version.clone(),
    lld_archive_url: versions.lld_archive_url(&config.host),
  })
}
