//! Adjustments that make an unpacked sysroot and toolchain usable from inside
//! the bundle rather than from `/`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::fs::{FsError, create_symlink, does_file_exist};
use crate::platform::TargetTriple;

const ABSOLUTE_HEADER: &str = "header \"/usr/include/";
const RELATIVE_HEADER: &str = "header \"../../../../include/";

/// `<sdk>/usr/lib/swift/linux/<linux-cpu>/glibc.modulemap`
pub fn module_map_path(sdk_dir: &Path, target: &TargetTriple) -> PathBuf {
  sdk_dir
    .join("usr/lib/swift/linux")
    .join(target.cpu.linux_name())
    .join("glibc.modulemap")
}

/// Point the glibc module map's headers at the SDK's own `usr/include`.
///
/// Returns whether the file changed.
pub async fn fix_module_map(sdk_dir: &Path, target: &TargetTriple) -> Result<bool, FsError> {
  let path = module_map_path(sdk_dir, target);
  if !does_file_exist(&path).await {
    return Err(FsError::FileDoesNotExist(path));
  }

  let original = tokio::fs::read_to_string(&path).await.map_err(|e| FsError::io(&path, e))?;
  let rewritten = original.replace(ABSOLUTE_HEADER, RELATIVE_HEADER);
  if rewritten == original {
    debug!(path = ?path, "module map already relative");
    return Ok(false);
  }

  tokio::fs::write(&path, rewritten).await.map_err(|e| FsError::io(&path, e))?;
  info!(path = ?path, "rewrote module map header paths");
  Ok(true)
}

/// Share the dynamic resource directory's clang headers with static linking.
pub async fn symlink_clang_headers(toolchain_dir: &Path) -> Result<bool, FsError> {
  let at = toolchain_dir.join("usr/lib/swift_static/clang");
  if let Ok(metadata) = tokio::fs::symlink_metadata(&at).await
    && metadata.is_dir()
  {
    debug!(path = ?at, "toolchain ships static clang headers, leaving them");
    return Ok(false);
  }
  create_symlink(&at, Path::new("../swift/clang")).await
}

/// Older toolchains lack `swift-autolink-extract`; the driver accepts `swift` under that name.
pub async fn fix_autolink_extract(toolchain_bin_dir: &Path) -> Result<bool, FsError> {
  let at = toolchain_bin_dir.join("swift-autolink-extract");
  if does_file_exist(&at).await {
    return Ok(false);
  }
  create_symlink(&at, Path::new("swift")).await?;
  info!(path = ?at, "created swift-autolink-extract symlink");
  Ok(true)
}
