//! Linux distributions an SDK can target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Ubuntu releases with a package-based sysroot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UbuntuRelease {
  Focal,
  Jammy,
}

impl UbuntuRelease {
  pub fn version(&self) -> &'static str {
    match self {
      Self::Focal => "20.04",
      Self::Jammy => "22.04",
    }
  }

  pub fn codename(&self) -> &'static str {
    match self {
      Self::Focal => "focal",
      Self::Jammy => "jammy",
    }
  }

  /// Packages whose contents make up the target sysroot.
  pub fn required_packages(&self) -> &'static [&'static str] {
    match self {
      Self::Focal => &[
        "libc6",
        "libc6-dev",
        "libgcc-s1",
        "libgcc-10-dev",
        "libicu66",
        "libicu-dev",
        "libstdc++-10-dev",
        "libstdc++6",
        "linux-libc-dev",
        "zlib1g",
        "zlib1g-dev",
      ],
      Self::Jammy => &[
        "libc6",
        "libc6-dev",
        "libgcc-s1",
        "libgcc-12-dev",
        "libicu70",
        "libicu-dev",
        "libstdc++-12-dev",
        "libstdc++6",
        "linux-libc-dev",
        "zlib1g",
        "zlib1g-dev",
      ],
    }
  }
}

/// RHEL releases, only buildable from the official Swift images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhelRelease {
  Ubi9,
}

impl RhelRelease {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Ubi9 => "ubi9",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinuxDistribution {
  Ubuntu(UbuntuRelease),
  Rhel(RhelRelease),
}

impl LinuxDistribution {
  /// Stable identifier used in directory names and artifact ids.
  pub fn slug(&self) -> String {
    match self {
      Self::Ubuntu(release) => format!("ubuntu-{}", release.codename()),
      Self::Rhel(release) => format!("rhel-{}", release.name()),
    }
  }

  /// Tag suffix of the official `swift` Docker image for this distribution.
  pub fn docker_tag(&self) -> String {
    match self {
      Self::Ubuntu(release) => release.codename().to_string(),
      Self::Rhel(release) => format!("rhel-{}", release.name()),
    }
  }

  /// Platform component of download.swift.org paths, e.g. `ubuntu22.04`.
  pub fn swift_platform_name(&self) -> String {
    match self {
      Self::Ubuntu(release) => format!("ubuntu{}", release.version()),
      Self::Rhel(release) => release.name().to_string(),
    }
  }
}

impl fmt::Display for LinuxDistribution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Ubuntu(release) => write!(f, "Ubuntu {}", release.version()),
      Self::Rhel(release) => write!(f, "RHEL {}", release.name().to_uppercase()),
    }
  }
}

impl FromStr for LinuxDistribution {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "ubuntu-focal" | "ubuntu-20.04" => Ok(Self::Ubuntu(UbuntuRelease::Focal)),
      "ubuntu-jammy" | "ubuntu-22.04" => Ok(Self::Ubuntu(UbuntuRelease::Jammy)),
      "rhel-ubi9" => Ok(Self::Rhel(RhelRelease::Ubi9)),
      other => Err(ConfigError::UnknownDistribution(other.to_string())),
    }
  }
}
