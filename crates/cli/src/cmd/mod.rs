mod check;
mod generate;
mod paths;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use sdkgen_lib::GenerationConfig;
use sdkgen_lib::consts::{DEFAULT_LLD_VERSION, DEFAULT_LLVM_DOWNLOAD_BASE, DEFAULT_SWIFT_DOWNLOAD_BASE, DEFAULT_SWIFT_VERSION};
use sdkgen_lib::distribution::LinuxDistribution;
use sdkgen_lib::fetch::DockerCli;
use sdkgen_lib::platform::{Cpu, HostPlatform, TargetTriple};
use sdkgen_lib::versions::VersionsConfiguration;

pub use check::cmd_check;
pub use generate::cmd_generate;
pub use paths::cmd_paths;

/// Options shared by every command that describes a bundle.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
  /// Target CPU (arm64/aarch64 or x86_64/amd64). Defaults to the host CPU
  #[arg(long)]
  pub target_cpu: Option<Cpu>,

  /// Target distribution: ubuntu-focal, ubuntu-jammy or rhel-ubi9
  #[arg(long, default_value = "ubuntu-jammy")]
  pub distribution: LinuxDistribution,

  #[arg(long, default_value = DEFAULT_SWIFT_VERSION)]
  pub swift_version: String,

  #[arg(long, default_value = DEFAULT_LLD_VERSION)]
  pub lld_version: String,

  /// Copy the target sysroot from the distribution's Swift Docker image
  #[arg(long)]
  pub with_docker: bool,

  /// Bundle identifier. Defaults to `<swift>-RELEASE_<distribution>_<cpu>`
  #[arg(long)]
  pub artifact_id: Option<String>,

  /// Directory receiving the `.artifactbundle`
  #[arg(long, default_value = "Bundles")]
  pub bundles_root: PathBuf,

  #[arg(long, default_value = DEFAULT_SWIFT_DOWNLOAD_BASE)]
  pub swift_download_base: String,

  #[arg(long, default_value = DEFAULT_LLVM_DOWNLOAD_BASE)]
  pub llvm_download_base: String,

  /// Ubuntu archive mirror. Defaults to the official archive for the target CPU
  #[arg(long)]
  pub ubuntu_mirror: Option<String>,

  /// Connection timeout for downloads, e.g. `30s` or `2m`
  #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
  pub connect_timeout: Duration,
}

impl TargetArgs {
  pub fn to_config(&self) -> Result<GenerationConfig> {
    let host = HostPlatform::current().context("Cannot generate SDKs on this host")?;
    let target = TargetTriple::linux(self.target_cpu.unwrap_or(host.cpu));

    let versions = VersionsConfiguration {
      swift_version: self.swift_version.clone(),
      lld_version: self.lld_version.clone(),
      distribution: self.distribution,
      swift_download_base: self.swift_download_base.clone(),
      llvm_download_base: self.llvm_download_base.clone(),
      ubuntu_mirror: self.ubuntu_mirror.clone(),
    };

    let mut config = GenerationConfig::with_default_engine(target, host, versions, self.absolute_bundles_root()?)
      .context("Failed to locate the cache engine directory")?;
    config.should_use_docker = self.with_docker;
    if let Some(id) = &self.artifact_id {
      config.artifact_id = id.clone();
    }
    config.fetch.connect_timeout = self.connect_timeout;
    config.fetch.docker = DockerCli::from_env();
    Ok(config)
  }

  fn absolute_bundles_root(&self) -> Result<PathBuf> {
    if self.bundles_root.is_absolute() {
      return Ok(self.bundles_root.clone());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(dunce::simplified(&cwd).join(&self.bundles_root))
  }
}
