//! Upstream versions and the download locations derived from them.

use serde::{Deserialize, Serialize};

use crate::consts::{
  DEFAULT_LLD_VERSION, DEFAULT_LLVM_DOWNLOAD_BASE, DEFAULT_SWIFT_DOWNLOAD_BASE, DEFAULT_SWIFT_VERSION,
  UBUNTU_AMD64_MIRROR, UBUNTU_PORTS_MIRROR,
};
use crate::distribution::{LinuxDistribution, UbuntuRelease};
use crate::platform::{Cpu, HostPlatform, Os};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsConfiguration {
  /// Swift release, e.g. `5.9`.
  pub swift_version: String,
  /// LLVM release providing `lld`, e.g. `16.0.5`.
  pub lld_version: String,
  pub distribution: LinuxDistribution,
  pub swift_download_base: String,
  pub llvm_download_base: String,
  /// Overrides the per-architecture Ubuntu mirror.
  pub ubuntu_mirror: Option<String>,
}

impl Default for VersionsConfiguration {
  fn default() -> Self {
    Self {
      swift_version: DEFAULT_SWIFT_VERSION.to_string(),
      lld_version: DEFAULT_LLD_VERSION.to_string(),
      distribution: LinuxDistribution::Ubuntu(UbuntuRelease::Jammy),
      swift_download_base: DEFAULT_SWIFT_DOWNLOAD_BASE.to_string(),
      llvm_download_base: DEFAULT_LLVM_DOWNLOAD_BASE.to_string(),
      ubuntu_mirror: None,
    }
  }
}

impl VersionsConfiguration {
  /// `swift-5.9-RELEASE`
  pub fn swift_release_tag(&self) -> String {
    format!("swift-{}-RELEASE", self.swift_version)
  }

  /// `swift-5.9-release`
  fn swift_branch(&self) -> String {
    format!("swift-{}-release", self.swift_version)
  }

  /// Download URL of the toolchain that runs on `host`.
  ///
  /// Linux hosts use the Ubuntu 22.04 build regardless of the target distribution.
  pub fn host_toolchain_url(&self, host: &HostPlatform) -> String {
    let base = self.swift_download_base.trim_end_matches('/');
    let tag = self.swift_release_tag();
    match host.os {
      Os::MacOs => format!("{base}/{}/xcode/{tag}/{tag}-osx.pkg", self.swift_branch()),
      Os::Linux => self.linux_toolchain_url(&LinuxDistribution::Ubuntu(UbuntuRelease::Jammy), host.cpu),
    }
  }

  /// Download URL of the Swift toolchain built for the target distribution and CPU.
  pub fn target_swift_url(&self, cpu: Cpu) -> String {
    self.linux_toolchain_url(&self.distribution, cpu)
  }

  fn linux_toolchain_url(&self, distribution: &LinuxDistribution, cpu: Cpu) -> String {
    let base = self.swift_download_base.trim_end_matches('/');
    let tag = self.swift_release_tag();
    let platform = distribution.swift_platform_name();
    let arch_suffix = match cpu {
      Cpu::Arm64 => "-aarch64",
      Cpu::X86_64 => "",
    };
    let platform_dir = format!("{}{arch_suffix}", platform.replace('.', ""));
    format!("{base}/{}/{platform_dir}/{tag}/{tag}-{platform}{arch_suffix}.tar.gz", self.swift_branch())
  }

  /// Official Swift image the Docker path copies the sysroot from.
  pub fn docker_image(&self) -> String {
    format!("swift:{}-{}", self.swift_version, self.distribution.docker_tag())
  }

  /// LLVM release archive containing an `lld` binary for `host`.
  pub fn lld_archive_url(&self, host: &HostPlatform) -> String {
    let base = self.llvm_download_base.trim_end_matches('/');
    let version = &self.lld_version;
    let suffix = match (host.os, host.cpu) {
      (Os::MacOs, Cpu::Arm64) => "arm64-apple-darwin22.0",
      (Os::MacOs, Cpu::X86_64) => "x86_64-apple-darwin21.0",
      (Os::Linux, Cpu::Arm64) => "aarch64-linux-gnu",
      (Os::Linux, Cpu::X86_64) => "x86_64-linux-gnu-ubuntu-22.04",
    };
    format!("{base}/llvmorg-{version}/clang+llvm-{version}-{suffix}.tar.xz")
  }

  /// Ubuntu archive root serving packages for `cpu`.
  pub fn ubuntu_mirror(&self, cpu: Cpu) -> String {
    match &self.ubuntu_mirror {
      Some(mirror) => mirror.trim_end_matches('/').to_string(),
      None => match cpu {
        Cpu::X86_64 => UBUNTU_AMD64_MIRROR.to_string(),
        Cpu::Arm64 => UBUNTU_PORTS_MIRROR.to_string(),
      },
    }
  }

  /// `Packages.gz` index for the `main` component of `release`.
  pub fn ubuntu_packages_index_url(&self, release: UbuntuRelease, cpu: Cpu) -> String {
    format!(
      "{}/dists/{}/main/binary-{}/Packages.gz",
      self.ubuntu_mirror(cpu),
      release.codename(),
      cpu.debian_name()
    )
  }

  /// Default artifact id, e.g. `5.9-RELEASE_ubuntu_jammy_x86_64`.
  pub fn default_artifact_id(&self, cpu: Cpu) -> String {
    format!(
      "{}-RELEASE_{}_{}",
      self.swift_version,
      self.distribution.slug().replace('-', "_"),
      cpu.linux_name()
    )
  }
}
