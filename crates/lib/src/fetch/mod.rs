//! Cache-aware retrieval of remote artifacts.
//!
//! Every retrieval is keyed by its [`ArtifactSource`]. The cache engine is
//! consulted first and the network or container runtime is only touched on a
//! miss, inside the engine's producer so that a failed retrieval never leaves
//! a usable entry behind.

pub mod docker;
mod http;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheError, Engine};
use crate::consts::DEFAULT_QUIRK_HOSTS;
use crate::util::hash::Hashable;

pub use docker::DockerCli;
pub(crate) use http::url_to_filename;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("invalid URL {url}: {reason}")]
  InvalidUrl { url: String, reason: String },

  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("artifact not found: {url}")]
  NotFound { url: String },

  #[error("redirect cycle while fetching {url}")]
  RedirectCycle { url: String },

  #[error("too many redirects while fetching {url}")]
  TooManyRedirects { url: String },

  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  #[error("container runtime failed for {image}: {message}")]
  Container { image: String, message: String },

  #[error("package {package} not found in {index}")]
  MissingPackage { package: String, index: String },

  #[error("invalid package index {url}: {reason}")]
  InvalidIndex { url: String, reason: String },

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl FetchError {
  pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
    FetchError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Where an artifact comes from. Serialized to form its cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSource {
  Http {
    url: String,
    sha256: Option<String>,
  },
  DockerImage {
    image: String,
    platform: String,
    paths: Vec<String>,
  },
}

impl Hashable for ArtifactSource {}

impl ArtifactSource {
  pub fn http(url: impl Into<String>) -> Self {
    ArtifactSource::Http {
      url: url.into(),
      sha256: None,
    }
  }

  pub fn http_verified(url: impl Into<String>, sha256: impl Into<String>) -> Self {
    ArtifactSource::Http {
      url: url.into(),
      sha256: Some(sha256.into()),
    }
  }

  /// Path of the retrieved artifact inside its cache entry.
  fn locate(&self, entry: &Path) -> PathBuf {
    match self {
      ArtifactSource::Http { url, .. } => entry.join(url_to_filename(url)),
      ArtifactSource::DockerImage { .. } => entry.to_path_buf(),
    }
  }
}

impl fmt::Display for ArtifactSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ArtifactSource::Http { url, .. } => write!(f, "{url}"),
      ArtifactSource::DockerImage { image, platform, .. } => write!(f, "docker://{image} ({platform})"),
    }
  }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
  /// Hosts whose 400 responses mean "not found".
  pub quirk_hosts: Vec<String>,
  pub connect_timeout: Duration,
  pub docker: DockerCli,
}

impl Default for FetchOptions {
  fn default() -> Self {
    Self {
      quirk_hosts: DEFAULT_QUIRK_HOSTS.iter().map(|h| h.to_string()).collect(),
      connect_timeout: Duration::from_secs(30),
      docker: DockerCli::default(),
    }
  }
}

pub struct ArtifactFetcher {
  client: Client,
  options: FetchOptions,
  retrievals: AtomicUsize,
}

impl ArtifactFetcher {
  pub fn new(options: FetchOptions) -> Result<Self, FetchError> {
    Ok(Self {
      client: http::build_client(&options)?,
      options,
      retrievals: AtomicUsize::new(0),
    })
  }

  /// Return the local path of `source`, retrieving it only on a cache miss.
  ///
  /// HTTP sources resolve to the downloaded file; Docker sources resolve to a
  /// directory mirroring the copied absolute paths.
  pub async fn fetch(&self, source: &ArtifactSource, engine: &Engine) -> Result<PathBuf, FetchError> {
    let key = Engine::key(source)?;
    if let Some(hit) = engine.get(&key).await? {
      debug!(source = %source, key = %key, "using cached artifact");
      return Ok(source.locate(&hit.path));
    }

    let entry = engine.put(&key, |dir| self.retrieve(source, dir)).await?;
    Ok(source.locate(&entry.path))
  }

  async fn retrieve(&self, source: &ArtifactSource, dir: PathBuf) -> Result<(), FetchError> {
    self.retrievals.fetch_add(1, Ordering::SeqCst);
    info!(source = %source, "fetching");

    match source {
      ArtifactSource::Http { url, sha256 } => {
        let dest = source.locate(&dir);
        let size = http::download(&self.client, &self.options, url, sha256.as_deref(), &dest).await?;
        info!(url = %url, size, "download complete");
      }
      ArtifactSource::DockerImage { image, platform, paths } => {
        self.options.docker.copy_paths(image, platform, paths, &dir).await?;
      }
    }
    Ok(())
  }

  /// Whether `url` currently resolves to an artifact.
  pub async fn exists(&self, url: &str) -> Result<bool, FetchError> {
    http::exists(&self.client, &self.options, url).await
  }

  /// Number of retrievals that actually hit the network or container runtime.
  pub fn retrievals(&self) -> usize {
    self.retrievals.load(Ordering::SeqCst)
  }
}
