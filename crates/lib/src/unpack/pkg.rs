//! macOS installer packages.
//!
//! `pkgutil --expand-full` turns the flat package into a directory tree where
//! each component package has an expanded `Payload/` directory. The toolchain
//! payload is copied into the destination.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use super::UnpackError;
use crate::fs::copy_tree;

const PKGUTIL: &str = "pkgutil";

pub(super) async fn unpack_pkg(archive: &Path, dest: &Path) -> Result<usize, UnpackError> {
  let scratch = tempfile::tempdir().map_err(|e| UnpackError::io(dest, e))?;
  // pkgutil refuses to expand into an existing directory
  let expanded = scratch.path().join("expanded");

  let output = Command::new(PKGUTIL)
    .arg("--expand-full")
    .arg(archive)
    .arg(&expanded)
    .output()
    .await
    .map_err(|e| UnpackError::Command {
      program: PKGUTIL.to_string(),
      code: None,
      stderr: e.to_string(),
    })?;

  if !output.status.success() {
    return Err(UnpackError::Command {
      program: PKGUTIL.to_string(),
      code: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    });
  }

  let dest = dest.to_path_buf();
  let archive = archive.to_path_buf();
  tokio::task::spawn_blocking(move || -> Result<usize, UnpackError> {
    let payload = find_toolchain_payload(&expanded).ok_or_else(|| UnpackError::MissingMember {
      archive: archive.clone(),
      member: "Payload".to_string(),
    })?;
    debug!(payload = ?payload, "copying package payload");
    copy_tree(&payload, &dest)?;
    Ok(WalkDir::new(&dest).into_iter().filter_map(Result::ok).count())
  })
  .await?
}

/// The first `Payload` directory, descending into a lone `*.xctoolchain` if present.
fn find_toolchain_payload(expanded: &Path) -> Option<PathBuf> {
  let payload = WalkDir::new(expanded)
    .sort_by_file_name()
    .into_iter()
    .filter_map(Result::ok)
    .find(|e| e.file_type().is_dir() && e.file_name() == "Payload")?
    .into_path();

  let mut children = std::fs::read_dir(&payload).ok()?.filter_map(Result::ok);
  if let (Some(only), None) = (children.next(), children.next())
    && only.path().extension().is_some_and(|ext| ext == "xctoolchain")
  {
    return Some(only.path());
  }
  Some(payload)
}
