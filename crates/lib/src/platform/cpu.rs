use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// CPU architectures an SDK can be generated for or on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cpu {
  Arm64,
  X86_64,
}

impl Cpu {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Arm64),
      _ => None,
    }
  }

  /// Name used by Debian-style package managers (`dpkg --print-architecture`).
  pub fn debian_name(&self) -> &'static str {
    match self {
      Self::Arm64 => "arm64",
      Self::X86_64 => "amd64",
    }
  }

  /// Name used in Linux triples and Swift resource directories.
  pub fn linux_name(&self) -> &'static str {
    match self {
      Self::Arm64 => "aarch64",
      Self::X86_64 => "x86_64",
    }
  }

  /// Name used in Apple triples.
  pub fn darwin_name(&self) -> &'static str {
    match self {
      Self::Arm64 => "arm64",
      Self::X86_64 => "x86_64",
    }
  }
}

impl fmt::Display for Cpu {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.linux_name())
  }
}

impl FromStr for Cpu {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "arm64" | "aarch64" => Ok(Self::Arm64),
      "x86_64" | "amd64" => Ok(Self::X86_64),
      other => Err(ConfigError::UnknownCpu(other.to_string())),
    }
  }
}
