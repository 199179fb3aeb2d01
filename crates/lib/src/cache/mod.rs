//! Content-addressed artifact cache.
//!
//! Entries live at `<engine>/objects/<key>/`, where the key is a fingerprint of
//! the operation and its inputs. An entry only counts once its completion marker
//! is present and the entry's contents still hash to the value recorded in it.
//! Producers write into a staging directory that is renamed into place on
//! success, so an interrupted producer never leaves a half-written entry behind.

pub mod lock;

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::consts::CACHE_COMPLETE_MARKER;
use crate::util::hash::{DirHashError, Hashable, ObjectHash, hash_directory};

pub use lock::{EngineLock, EngineLockError};

const ENTRY_HASH_EXCLUSIONS: &[&str] = &[CACHE_COMPLETE_MARKER];

#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Lock(#[from] EngineLockError),

  #[error("failed to compute cache key: {0}")]
  Key(#[source] serde_json::Error),

  #[error("cache io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to hash cache entry: {0}")]
  Hash(#[from] DirHashError),

  #[error("invalid completion marker at {path}: {source}")]
  Marker {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("cache worker failed: {0}")]
  Worker(#[from] tokio::task::JoinError),
}

impl CacheError {
  fn io(path: &Path, source: std::io::Error) -> Self {
    CacheError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Completion marker stored inside every finished entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntryMarker {
  pub version: u32,
  pub status: String,
  /// Full SHA-256 of the entry contents, excluding the marker itself.
  pub output_hash: String,
}

/// A materialized cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
  pub key: ObjectHash,
  pub path: PathBuf,
}

/// An open cache engine. Holds the engine lock until dropped.
#[derive(Debug)]
pub struct Engine {
  root: PathBuf,
  _lock: EngineLock,
}

impl Engine {
  /// Open the engine rooted at `root`, creating its layout and taking the lock.
  pub fn open(root: &Path) -> Result<Self, CacheError> {
    let lock = EngineLock::acquire(root, "generate")?;
    for dir in [root.join("objects"), root.join("tmp")] {
      std::fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
    }
    debug!(root = ?root, "opened cache engine");
    Ok(Self {
      root: root.to_path_buf(),
      _lock: lock,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Fingerprint an operation description.
  pub fn key<T: Hashable>(description: &T) -> Result<ObjectHash, CacheError> {
    description.compute_hash().map_err(CacheError::Key)
  }

  fn entry_path(&self, key: &ObjectHash) -> PathBuf {
    self.root.join("objects").join(&key.0)
  }

  /// Look up a finished, intact entry.
  pub async fn get(&self, key: &ObjectHash) -> Result<Option<CachedArtifact>, CacheError> {
    let path = self.entry_path(key);
    if !path.exists() {
      return Ok(None);
    }

    let check_path = path.clone();
    let intact = tokio::task::spawn_blocking(move || verify_entry(&check_path)).await??;
    if !intact {
      return Ok(None);
    }

    debug!(key = %key, "cache hit");
    Ok(Some(CachedArtifact { key: key.clone(), path }))
  }

  /// Return the entry for `key`, running `producer` to create it on a miss.
  ///
  /// The producer receives an empty staging directory to fill. It is never
  /// invoked when an intact entry already exists.
  pub async fn put<F, Fut, E>(&self, key: &ObjectHash, producer: F) -> Result<CachedArtifact, E>
  where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: From<CacheError>,
  {
    if let Some(hit) = self.get(key).await? {
      return Ok(hit);
    }

    let path = self.entry_path(key);
    if path.exists() {
      debug!(key = %key, "removing incomplete cache entry");
      fs::remove_dir_all(&path).await.map_err(|e| CacheError::io(&path, e))?;
    }

    let tmp_root = self.root.join("tmp");
    let staging = tempfile::Builder::new()
      .prefix(&format!("{}-", key.0))
      .tempdir_in(&tmp_root)
      .map_err(|e| CacheError::io(&tmp_root, e))?;
    let staging_path = staging.path().to_path_buf();

    producer(staging_path.clone()).await?;

    let marker_dir = staging_path.clone();
    tokio::task::spawn_blocking(move || write_marker(&marker_dir))
      .await
      .map_err(CacheError::from)??;

    fs::rename(&staging_path, &path)
      .await
      .map_err(|e| CacheError::io(&path, e))?;

    info!(key = %key, path = ?path, "stored cache entry");
    Ok(CachedArtifact { key: key.clone(), path })
  }
}

fn write_marker(dir: &Path) -> Result<(), CacheError> {
  let output_hash = hash_directory(dir, ENTRY_HASH_EXCLUSIONS)?;
  let marker = EntryMarker {
    version: 1,
    status: "complete".to_string(),
    output_hash: output_hash.0,
  };
  let marker_path = dir.join(CACHE_COMPLETE_MARKER);
  let content = serde_json::to_string(&marker).map_err(|source| CacheError::Marker {
    path: marker_path.clone(),
    source,
  })?;
  std::fs::write(&marker_path, format!("{content}\n")).map_err(|e| CacheError::io(&marker_path, e))
}

/// Returns `true` when the entry has a marker and its contents match it.
fn verify_entry(dir: &Path) -> Result<bool, CacheError> {
  let marker_path = dir.join(CACHE_COMPLETE_MARKER);
  if !marker_path.exists() {
    debug!(path = ?dir, "cache entry has no completion marker");
    return Ok(false);
  }

  let content = std::fs::read_to_string(&marker_path).map_err(|e| CacheError::io(&marker_path, e))?;
  let marker: EntryMarker = match serde_json::from_str(&content) {
    Ok(marker) => marker,
    Err(e) => {
      warn!(path = ?marker_path, error = %e, "unreadable completion marker, treating as miss");
      return Ok(false);
    }
  };

  let current = hash_directory(dir, ENTRY_HASH_EXCLUSIONS)?;
  if current.0 != marker.output_hash {
    warn!(
      path = ?dir,
      expected = %marker.output_hash,
      actual = %current.0,
      "cache entry corrupted, will reproduce"
    );
    return Ok(false);
  }

  Ok(true)
}
