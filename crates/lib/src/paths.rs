//! On-disk layout of a generated bundle.
//!
//! ```text
//! <root>/
//!   Artifacts/                                  fetched archives, linked from the cache engine
//!   <artifact-id>.artifactbundle/
//!     info.json                                 bundle manifest
//!     <artifact-id>/<triple>/                   swift SDK root
//!       toolset.json
//!       swift-sdk.json
//!       <distribution>.sdk/                     target sysroot (SDK dir)
//!       swift.xctoolchain/usr/bin/              host toolchain
//! ```
//!
//! The cache engine (see [`crate::cache`]) owns the archive contents and is
//! shared between bundles; `Artifacts/` holds a named entry per archive the
//! last run unpacked.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::distribution::LinuxDistribution;
use crate::platform::TargetTriple;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathsConfiguration {
  pub root: PathBuf,
  pub artifacts_cache: PathBuf,
  pub artifact_bundle: PathBuf,
  pub swift_sdk_root: PathBuf,
  pub sdk_dir: PathBuf,
  pub toolchain_dir: PathBuf,
  pub toolchain_bin_dir: PathBuf,
}

impl PathsConfiguration {
  pub fn new(root: &Path, artifact_id: &str, target: &TargetTriple, distribution: &LinuxDistribution) -> Self {
    let artifact_bundle = root.join(format!("{artifact_id}.artifactbundle"));
    let swift_sdk_root = artifact_bundle.join(artifact_id).join(target.triple());
    let toolchain_dir = swift_sdk_root.join("swift.xctoolchain");

    Self {
      root: root.to_path_buf(),
      artifacts_cache: root.join("Artifacts"),
      sdk_dir: swift_sdk_root.join(format!("{}.sdk", distribution.slug())),
      toolchain_bin_dir: toolchain_dir.join("usr").join("bin"),
      toolchain_dir,
      swift_sdk_root,
      artifact_bundle,
    }
  }

  pub fn bundle_manifest(&self) -> PathBuf {
    self.artifact_bundle.join("info.json")
  }

  pub fn toolset_json(&self) -> PathBuf {
    self.swift_sdk_root.join("toolset.json")
  }

  pub fn destination_json(&self) -> PathBuf {
    self.swift_sdk_root.join("swift-sdk.json")
  }

  /// Strip the swift SDK root from `path`, as manifests reference paths relative to it.
  pub fn relative_to_sdk_root<'a>(&self, path: &'a Path) -> Option<&'a Path> {
    path.strip_prefix(&self.swift_sdk_root).ok()
  }
}
