//! Ubuntu `Packages` index lookup.
//!
//! The index is a sequence of RFC 822 style stanzas separated by blank lines.
//! Only the fields needed to download and verify a package are kept.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::fetch::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
  pub name: String,
  /// Pool path relative to the mirror root.
  pub filename: String,
  pub sha256: String,
}

impl PackageRecord {
  pub fn url(&self, mirror: &str) -> String {
    format!("{}/{}", mirror.trim_end_matches('/'), self.filename)
  }
}

#[derive(Debug, Default)]
pub struct PackageIndex {
  records: HashMap<String, PackageRecord>,
}

impl PackageIndex {
  /// Parse an uncompressed index. Stanzas missing a required field are ignored;
  /// when a package is listed twice the first entry wins.
  pub fn parse(text: &str) -> Self {
    let mut records = HashMap::new();

    for stanza in text.split("\n\n") {
      let mut name = None;
      let mut filename = None;
      let mut sha256 = None;

      for line in stanza.lines() {
        if line.starts_with([' ', '\t']) {
          continue;
        }
        let Some((field, value)) = line.split_once(':') else {
          continue;
        };
        let value = value.trim();
        match field {
          "Package" => name = Some(value.to_string()),
          "Filename" => filename = Some(value.to_string()),
          "SHA256" => sha256 = Some(value.to_lowercase()),
          _ => {}
        }
      }

      if let (Some(name), Some(filename), Some(sha256)) = (name, filename, sha256) {
        records.entry(name.clone()).or_insert(PackageRecord { name, filename, sha256 });
      }
    }

    debug!(packages = records.len(), "parsed package index");
    Self { records }
  }

  /// Read a gzip-compressed `Packages.gz` file.
  pub fn read_gz(path: &Path, url: &str) -> Result<Self, FetchError> {
    let file = std::fs::File::open(path).map_err(|e| FetchError::io(path, e))?;
    let mut text = String::new();
    GzDecoder::new(file)
      .read_to_string(&mut text)
      .map_err(|e| FetchError::InvalidIndex {
        url: url.to_string(),
        reason: e.to_string(),
      })?;
    Ok(Self::parse(&text))
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn get(&self, name: &str) -> Option<&PackageRecord> {
    self.records.get(name)
  }

  /// Look up every package in `names`, failing on the first one that is absent.
  pub fn resolve(&self, names: &[&str], index_url: &str) -> Result<Vec<&PackageRecord>, FetchError> {
    names
      .iter()
      .map(|name| {
        self.get(name).ok_or_else(|| FetchError::MissingPackage {
          package: name.to_string(),
          index: index_url.to_string(),
        })
      })
      .collect()
  }
}
