//! HTTP transport: a single-attempt downloader with a bounded, cycle-aware
//! redirect policy.

use std::path::Path;

use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, StatusCode, Url};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{FetchError, FetchOptions};
use crate::consts::{APP_NAME, MAX_REDIRECTS};

#[derive(Debug, Error)]
#[error("redirect cycle at {0}")]
struct RedirectCycle(Url);

#[derive(Debug, Error)]
#[error("more than {MAX_REDIRECTS} redirects")]
struct TooManyRedirects;

pub(super) fn build_client(options: &FetchOptions) -> Result<Client, FetchError> {
  Client::builder()
    .http1_only()
    .redirect(Policy::custom(follow_redirect))
    .connect_timeout(options.connect_timeout)
    .user_agent(format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")))
    .build()
    .map_err(FetchError::Client)
}

fn follow_redirect(attempt: Attempt) -> reqwest::redirect::Action {
  if attempt.previous().len() > MAX_REDIRECTS {
    return attempt.error(TooManyRedirects);
  }
  if attempt.previous().contains(attempt.url()) {
    let url = attempt.url().clone();
    return attempt.error(RedirectCycle(url));
  }
  attempt.follow()
}

/// Map a transport error, recognising failures raised by the redirect policy.
fn classify(url: &str, err: reqwest::Error) -> FetchError {
  let mut source = std::error::Error::source(&err);
  while let Some(inner) = source {
    if inner.downcast_ref::<RedirectCycle>().is_some() {
      return FetchError::RedirectCycle { url: url.to_string() };
    }
    if inner.downcast_ref::<TooManyRedirects>().is_some() {
      return FetchError::TooManyRedirects { url: url.to_string() };
    }
    source = inner.source();
  }
  FetchError::Request {
    url: url.to_string(),
    source: err,
  }
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
  Url::parse(url).map_err(|e| FetchError::InvalidUrl {
    url: url.to_string(),
    reason: e.to_string(),
  })
}

/// Some hosts answer 400 rather than 404 for artifacts that do not exist.
fn is_not_found(status: StatusCode, final_url: &Url, options: &FetchOptions) -> bool {
  status == StatusCode::NOT_FOUND
    || (status == StatusCode::BAD_REQUEST
      && final_url
        .host_str()
        .is_some_and(|host| options.quirk_hosts.iter().any(|quirk| quirk == host)))
}

fn check_status(url: &str, status: StatusCode, final_url: &Url, options: &FetchOptions) -> Result<(), FetchError> {
  if status.is_success() {
    return Ok(());
  }
  if is_not_found(status, final_url, options) {
    return Err(FetchError::NotFound { url: url.to_string() });
  }
  Err(FetchError::Status {
    url: url.to_string(),
    status: status.as_u16(),
  })
}

/// Stream `url` into `dest`, verifying the SHA-256 digest when one is given.
/// Returns the number of bytes written.
pub(super) async fn download(
  client: &Client,
  options: &FetchOptions,
  url: &str,
  expected_sha256: Option<&str>,
  dest: &Path,
) -> Result<u64, FetchError> {
  let mut response = client
    .get(parse_url(url)?)
    .send()
    .await
    .map_err(|e| classify(url, e))?;
  check_status(url, response.status(), response.url(), options)?;

  let mut file = tokio::fs::File::create(dest).await.map_err(|e| FetchError::io(dest, e))?;
  let mut hasher = Sha256::new();
  let mut size = 0u64;

  while let Some(chunk) = response.chunk().await.map_err(|e| classify(url, e))? {
    hasher.update(&chunk);
    file.write_all(&chunk).await.map_err(|e| FetchError::io(dest, e))?;
    size += chunk.len() as u64;
  }
  file.flush().await.map_err(|e| FetchError::io(dest, e))?;

  let actual = hex::encode(hasher.finalize());
  if let Some(expected) = expected_sha256
    && !expected.eq_ignore_ascii_case(&actual)
  {
    return Err(FetchError::HashMismatch {
      url: url.to_string(),
      expected: expected.to_string(),
      actual,
    });
  }

  debug!(url = %url, size, sha256 = %actual, "downloaded");
  Ok(size)
}

/// Check `url` with a HEAD request.
pub(super) async fn exists(client: &Client, options: &FetchOptions, url: &str) -> Result<bool, FetchError> {
  let response = client
    .head(parse_url(url)?)
    .send()
    .await
    .map_err(|e| classify(url, e))?;

  match check_status(url, response.status(), response.url(), options) {
    Ok(()) => Ok(true),
    Err(FetchError::NotFound { .. }) => Ok(false),
    Err(e) => Err(e),
  }
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to a hash of the
/// URL if no suitable filename can be extracted.
pub(crate) fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split('?').next().unwrap_or(filename);

    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '+' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("download_{}", &hex::encode(hasher.finalize())[..16])
}
