use std::path::PathBuf;

use crate::consts::{APP_NAME, ENGINE_CACHE_ENV};
use crate::error::ConfigError;

/// Returns the user's home directory
pub fn home_dir() -> Result<PathBuf, ConfigError> {
  std::env::var("HOME")
    .map(PathBuf::from)
    .map_err(|_| ConfigError::MissingEnv("HOME"))
}

/// Returns the directory for cache files for the application
pub fn cache_dir() -> Result<PathBuf, ConfigError> {
  let cache_home = match std::env::var("XDG_CACHE_HOME") {
    Ok(path) => PathBuf::from(path),
    Err(_) => home_dir()?.join(".cache"),
  };
  Ok(cache_home.join(APP_NAME))
}

/// Returns the directory backing the artifact cache engine.
///
/// `SDKGEN_ENGINE_CACHE` overrides the XDG-derived default.
pub fn engine_cache_dir() -> Result<PathBuf, ConfigError> {
  if let Ok(path) = std::env::var(ENGINE_CACHE_ENV) {
    return Ok(PathBuf::from(path));
  }
  Ok(cache_dir()?.join("engine"))
}
