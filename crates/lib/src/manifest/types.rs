//! JSON documents describing a generated Swift SDK bundle.
//!
//! # Structure
//!
//! A bundle carries three documents:
//! - [`Toolset`] (`toolset.json`): which tools the host toolchain provides and
//!   the extra options passed to them
//! - [`SwiftSdkMetadata`] (`swift-sdk.json`): where the sysroot and Swift
//!   resources live for each target triple
//! - [`ArtifactBundleMetadata`] (`info.json`): the bundle's artifacts and the
//!   host triples each variant supports
//!
//! Every path inside a document is relative to the document's own directory.
//!
//! # Example
//!
//! ```json
//! {
//!   "schemaVersion": "4.0",
//!   "targetTriples": {
//!     "x86_64-unknown-linux-gnu": {
//!       "sdkRootPath": "ubuntu-jammy.sdk",
//!       "swiftResourcesPath": "ubuntu-jammy.sdk/usr/lib/swift",
//!       "swiftStaticResourcesPath": "ubuntu-jammy.sdk/usr/lib/swift_static",
//!       "toolsetPaths": ["toolset.json"]
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const TOOLSET_SCHEMA_VERSION: &str = "1.0";
pub const SWIFT_SDK_SCHEMA_VERSION: &str = "4.0";
pub const BUNDLE_SCHEMA_VERSION: &str = "1.0";

/// Options for one tool in a toolset.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolProperties {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(rename = "extraCLIOptions", default, skip_serializing_if = "Option::is_none")]
  pub extra_cli_options: Option<Vec<String>>,
}

impl ToolProperties {
  pub fn at(path: &str) -> Self {
    Self {
      path: Some(path.to_string()),
      extra_cli_options: None,
    }
  }

  pub fn with_options(options: &[&str]) -> Self {
    Self::default().options(options)
  }

  pub fn options(mut self, options: &[&str]) -> Self {
    self.extra_cli_options = Some(options.iter().map(|o| o.to_string()).collect());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toolset {
  pub schema_version: String,
  /// Directory that relative tool paths resolve against.
  pub root_path: String,
  pub swift_compiler: ToolProperties,
  pub cxx_compiler: ToolProperties,
  pub linker: ToolProperties,
  pub librarian: ToolProperties,
}

/// Resource locations for one target triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripleProperties {
  pub sdk_root_path: String,
  pub swift_resources_path: String,
  pub swift_static_resources_path: String,
  pub toolset_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwiftSdkMetadata {
  pub schema_version: String,
  pub target_triples: BTreeMap<String, TripleProperties>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVariant {
  pub path: String,
  pub supported_triples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
  #[serde(rename = "type")]
  pub kind: String,
  pub version: String,
  pub variants: Vec<ArtifactVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBundleMetadata {
  pub schema_version: String,
  pub artifacts: BTreeMap<String, Artifact>,
}
