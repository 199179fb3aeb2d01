pub mod cpu;
pub mod paths;

pub use cpu::Cpu;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Operating systems a host toolchain can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Os {
  Linux,
  MacOs,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// The machine the generated toolchain will run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostPlatform {
  pub cpu: Cpu,
  pub os: Os,
}

impl HostPlatform {
  pub fn new(cpu: Cpu, os: Os) -> Self {
    Self { cpu, os }
  }

  /// Detect the current platform at runtime.
  pub fn current() -> Result<Self, ConfigError> {
    let cpu = Cpu::current().ok_or_else(|| ConfigError::UnsupportedHost(std::env::consts::ARCH.to_string()))?;
    let os = Os::current().ok_or_else(|| ConfigError::UnsupportedHost(std::env::consts::OS.to_string()))?;
    Ok(Self { cpu, os })
  }

  /// Triple listed as `supportedTriples` in the bundle manifest.
  pub fn triple(&self) -> String {
    match self.os {
      Os::Linux => format!("{}-unknown-linux-gnu", self.cpu.linux_name()),
      Os::MacOs => format!("{}-apple-macos", self.cpu.darwin_name()),
    }
  }
}

impl fmt::Display for HostPlatform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Compilation target of the generated SDK.
///
/// Only Linux/GNU targets are generated, so `os` and `abi` are fixed by
/// [`TargetTriple::linux`] but kept explicit for the triple string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetTriple {
  pub cpu: Cpu,
  pub os: Os,
  pub abi: String,
}

impl TargetTriple {
  pub fn linux(cpu: Cpu) -> Self {
    Self {
      cpu,
      os: Os::Linux,
      abi: "gnu".to_string(),
    }
  }

  /// Returns the triple string (e.g., "x86_64-unknown-linux-gnu")
  pub fn triple(&self) -> String {
    format!("{}-unknown-{}-{}", self.cpu.linux_name(), self.os.as_str(), self.abi)
  }
}

impl fmt::Display for TargetTriple {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn target_triple_format() {
    assert_eq!(TargetTriple::linux(Cpu::X86_64).triple(), "x86_64-unknown-linux-gnu");
    assert_eq!(TargetTriple::linux(Cpu::Arm64).triple(), "aarch64-unknown-linux-gnu");
  }

  #[test]
  fn host_triple_uses_os_convention() {
    assert_eq!(HostPlatform::new(Cpu::Arm64, Os::MacOs).triple(), "arm64-apple-macos");
    assert_eq!(HostPlatform::new(Cpu::X86_64, Os::Linux).triple(), "x86_64-unknown-linux-gnu");
  }
}
