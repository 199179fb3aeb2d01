//! Bundle manifest generation.
//!
//! Documents are written in a fixed order (toolset, destination, bundle) and
//! always overwritten. Output is pretty-printed JSON with sorted keys and a
//! trailing newline.

mod types;

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::fs::FsError;
use crate::paths::PathsConfiguration;
use crate::platform::{HostPlatform, TargetTriple};

pub use types::*;

const ARTIFACT_KIND: &str = "swiftSDK";
const ARTIFACT_VERSION: &str = "0.0.1";

/// Render `path` relative to `base` with `/` separators.
fn relative_string(base: &Path, path: &Path) -> String {
  let relative = path.strip_prefix(base).unwrap_or(path);
  relative
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("/")
}

pub fn toolset(paths: &PathsConfiguration) -> Toolset {
  Toolset {
    schema_version: TOOLSET_SCHEMA_VERSION.to_string(),
    root_path: relative_string(&paths.swift_sdk_root, &paths.toolchain_bin_dir),
    swift_compiler: ToolProperties::at("swiftc").options(&["-use-ld=lld", "-Xlinker", "-R/usr/lib/swift/linux/"]),
    cxx_compiler: ToolProperties::with_options(&["-lstdc++"]),
    linker: ToolProperties::at("ld.lld"),
    librarian: ToolProperties::at("llvm-ar"),
  }
}

pub fn destination(paths: &PathsConfiguration, target: &TargetTriple) -> SwiftSdkMetadata {
  let root = &paths.swift_sdk_root;
  let resources = paths.sdk_dir.join("usr/lib");
  let properties = TripleProperties {
    sdk_root_path: relative_string(root, &paths.sdk_dir),
    swift_resources_path: relative_string(root, &resources.join("swift")),
    swift_static_resources_path: relative_string(root, &resources.join("swift_static")),
    toolset_paths: vec![relative_string(root, &paths.toolset_json())],
  };

  SwiftSdkMetadata {
    schema_version: SWIFT_SDK_SCHEMA_VERSION.to_string(),
    target_triples: BTreeMap::from([(target.triple(), properties)]),
  }
}

pub fn bundle(artifact_id: &str, target: &TargetTriple, host: &HostPlatform) -> ArtifactBundleMetadata {
  let artifact = Artifact {
    kind: ARTIFACT_KIND.to_string(),
    version: ARTIFACT_VERSION.to_string(),
    variants: vec![ArtifactVariant {
      path: format!("{artifact_id}/{}", target.triple()),
      supported_triples: vec![host.triple()],
    }],
  };

  ArtifactBundleMetadata {
    schema_version: BUNDLE_SCHEMA_VERSION.to_string(),
    artifacts: BTreeMap::from([(artifact_id.to_string(), artifact)]),
  }
}

/// Serialize `document` with sorted keys.
pub fn render<T: Serialize>(document: &T) -> Result<String, serde_json::Error> {
  // Going through `Value` sorts object keys
  let value = serde_json::to_value(document)?;
  let mut rendered = serde_json::to_string_pretty(&value)?;
  rendered.push('\n');
  Ok(rendered)
}

async fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<(), FsError> {
  let rendered = render(document).map_err(|e| FsError::io(path, std::io::Error::other(e)))?;
  if let Some(parent) = path.parent() {
    crate::fs::create_directory_if_needed(parent).await?;
  }
  tokio::fs::write(path, rendered).await.map_err(|e| FsError::io(path, e))
}

/// Write toolset, destination and bundle manifests. Returns their paths in write order.
pub async fn generate_manifests(
  paths: &PathsConfiguration,
  artifact_id: &str,
  target: &TargetTriple,
  host: &HostPlatform,
) -> Result<Vec<PathBuf>, FsError> {
  let toolset_path = paths.toolset_json();
  write_document(&toolset_path, &toolset(paths)).await?;

  let destination_path = paths.destination_json();
  write_document(&destination_path, &destination(paths, target)).await?;

  let bundle_path = paths.bundle_manifest();
  write_document(&bundle_path, &bundle(artifact_id, target, host)).await?;

  info!(bundle = ?paths.artifact_bundle, "wrote bundle manifests");
  Ok(vec![toolset_path, destination_path, bundle_path])
}
