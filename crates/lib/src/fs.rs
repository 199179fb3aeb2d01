//! Idempotent filesystem primitives used by every pipeline stage.
//!
//! Each operation can be repeated against a partially populated tree from an
//! earlier run and converges on the same result.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum FsError {
  #[error("expected a directory at {0}, found another kind of file")]
  NotADirectory(PathBuf),

  #[error("cannot create symlink at {path}: {reason}")]
  SymlinkConflict { path: PathBuf, reason: String },

  #[error("file does not exist: {0}")]
  FileDoesNotExist(PathBuf),

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk directory tree: {0}")]
  Walk(#[from] walkdir::Error),
}

impl FsError {
  pub(crate) fn io(path: &Path, source: io::Error) -> Self {
    FsError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Remove `path` and everything below it. Absence is not an error.
pub async fn remove_recursively(path: &Path) -> Result<(), FsError> {
  let metadata = match fs::symlink_metadata(path).await {
    Ok(metadata) => metadata,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(FsError::io(path, e)),
  };

  debug!(path = ?path, "removing");
  let removed = if metadata.is_dir() {
    fs::remove_dir_all(path).await
  } else {
    fs::remove_file(path).await
  };
  removed.map_err(|e| FsError::io(path, e))
}

/// Create `path` (and parents) unless a directory is already there.
pub async fn create_directory_if_needed(path: &Path) -> Result<(), FsError> {
  match fs::metadata(path).await {
    Ok(metadata) if metadata.is_dir() => Ok(()),
    Ok(_) => Err(FsError::NotADirectory(path.to_path_buf())),
    Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(path).await.map_err(|e| FsError::io(path, e)),
    Err(e) => Err(FsError::io(path, e)),
  }
}

/// Whether anything, including a dangling symlink, occupies `path`.
pub async fn does_file_exist(path: &Path) -> bool {
  fs::symlink_metadata(path).await.is_ok()
}

/// Make `at` a symlink to `pointing_to`.
///
/// Returns `Ok(true)` when the link was created and `Ok(false)` when the same
/// link was already present. Anything else at `at` is a conflict.
pub async fn create_symlink(at: &Path, pointing_to: &Path) -> Result<bool, FsError> {
  match fs::symlink_metadata(at).await {
    Ok(metadata) if metadata.file_type().is_symlink() => {
      let existing = fs::read_link(at).await.map_err(|e| FsError::io(at, e))?;
      if existing == pointing_to {
        return Ok(false);
      }
      Err(FsError::SymlinkConflict {
        path: at.to_path_buf(),
        reason: format!("already points to {}", existing.display()),
      })
    }
    Ok(_) => Err(FsError::SymlinkConflict {
      path: at.to_path_buf(),
      reason: "a non-symlink file is in the way".to_string(),
    }),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      if let Some(parent) = at.parent() {
        create_directory_if_needed(parent).await?;
      }
      symlink(pointing_to, at).map_err(|e| FsError::io(at, e))?;
      Ok(true)
    }
    Err(e) => Err(FsError::io(at, e)),
  }
}

/// Rewrite every absolute symlink under `root` into a relative one.
///
/// `root` stands in for `/`: a link at `<root>/usr/lib/libm.so` pointing to
/// `/lib/x86_64-linux-gnu/libm.so.6` becomes `../../lib/x86_64-linux-gnu/libm.so.6`.
/// Targets are not checked for existence. Returns the number of rewritten links.
pub fn fix_absolute_symlinks(root: &Path) -> Result<usize, FsError> {
  let mut rewritten = 0;

  for entry in WalkDir::new(root).follow_links(false) {
    let entry = entry?;
    if !entry.file_type().is_symlink() {
      continue;
    }

    let link = entry.path();
    let target = std::fs::read_link(link).map_err(|e| FsError::io(link, e))?;
    if !target.is_absolute() {
      continue;
    }

    let relative = relative_link_target(root, link, &target);
    std::fs::remove_file(link).map_err(|e| FsError::io(link, e))?;
    symlink(&relative, link).map_err(|e| FsError::io(link, e))?;
    debug!(link = ?link, from = ?target, to = ?relative, "made symlink relative");
    rewritten += 1;
  }

  Ok(rewritten)
}

/// Relative path from `link`'s directory to `absolute_target` re-rooted at `root`.
fn relative_link_target(root: &Path, link: &Path, absolute_target: &Path) -> PathBuf {
  // `..` at `/` stays at `/`, so it never climbs above `root`
  let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
  for component in absolute_target.components() {
    match component {
      Component::Normal(part) => parts.push(part),
      Component::ParentDir => {
        parts.pop();
      }
      _ => {}
    }
  }
  let rooted = parts.iter().fold(root.to_path_buf(), |acc, part| acc.join(part));
  let link_dir = link.parent().unwrap_or(root);

  match pathdiff::diff_paths(&rooted, link_dir) {
    Some(relative) if relative.as_os_str().is_empty() => PathBuf::from("."),
    Some(relative) => relative,
    None => rooted,
  }
}

/// Recursively copy `from` into `to`, recreating symlinks and replacing existing files.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), FsError> {
  for entry in WalkDir::new(from).follow_links(false) {
    let entry = entry?;
    let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
    let dest = to.join(relative);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      match std::fs::symlink_metadata(&dest) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => return Err(FsError::NotADirectory(dest)),
        Err(_) => std::fs::create_dir_all(&dest).map_err(|e| FsError::io(&dest, e))?,
      }
      continue;
    }

    if std::fs::symlink_metadata(&dest).is_ok() {
      std::fs::remove_file(&dest).map_err(|e| FsError::io(&dest, e))?;
    }

    if file_type.is_symlink() {
      let target = std::fs::read_link(entry.path()).map_err(|e| FsError::io(entry.path(), e))?;
      symlink(&target, &dest).map_err(|e| FsError::io(&dest, e))?;
    } else {
      std::fs::copy(entry.path(), &dest).map_err(|e| FsError::io(&dest, e))?;
    }
  }

  Ok(())
}

/// Place `from` at `to`, replacing any existing file. Hard-links when possible.
pub async fn link_or_copy(from: &Path, to: &Path) -> Result<(), FsError> {
  match fs::symlink_metadata(to).await {
    Ok(metadata) if metadata.is_dir() => {
      let in_the_way = io::Error::new(io::ErrorKind::AlreadyExists, "a directory is in the way");
      return Err(FsError::io(to, in_the_way));
    }
    Ok(_) => fs::remove_file(to).await.map_err(|e| FsError::io(to, e))?,
    Err(_) => {}
  }
  if fs::hard_link(from, to).await.is_err() {
    fs::copy(from, to).await.map_err(|e| FsError::io(to, e))?;
  }
  Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  let resolved = link.parent().map(|p| p.join(target)).unwrap_or_else(|| target.to_path_buf());
  if resolved.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}
