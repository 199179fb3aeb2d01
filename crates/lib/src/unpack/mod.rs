//! Archive extraction.
//!
//! Supports:
//! - `.tar`, `.tar.gz` / `.tgz`, `.tar.xz`, `.tar.zst`
//! - `.deb` (the `data.tar.*` member is extracted)
//! - `.pkg` (macOS installer packages, expanded with `pkgutil`)

mod deb;
mod pkg;

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use thiserror::Error;
use tracing::{debug, info};

use crate::fs::FsError;

#[derive(Debug, Error)]
pub enum UnpackError {
  #[error("unsupported archive format: {0}")]
  UnsupportedFormat(PathBuf),

  #[error("corrupt archive {path}: {source}")]
  Corrupt {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("archive {archive} has no member {member}")]
  MissingMember { archive: PathBuf, member: String },

  #[error("failed to write {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{program} failed with exit code {code:?}: {stderr}")]
  Command {
    program: String,
    code: Option<i32>,
    stderr: String,
  },

  /// An entry would be written through a symlink that leaves the destination.
  #[error("archive {archive} entry {entry} escapes the destination directory")]
  OutsideDestination { archive: PathBuf, entry: PathBuf },

  #[error(transparent)]
  Filesystem(#[from] FsError),

  #[error("extraction worker failed: {0}")]
  Worker(#[from] tokio::task::JoinError),
}

impl UnpackError {
  fn corrupt(path: &Path, source: io::Error) -> Self {
    UnpackError::Corrupt {
      path: path.to_path_buf(),
      source,
    }
  }

  fn io(path: &Path, source: io::Error) -> Self {
    UnpackError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  Tar,
  TarGz,
  TarXz,
  TarZst,
  Deb,
  Pkg,
}

impl ArchiveFormat {
  /// Detect the format from the archive's file name.
  pub fn detect(path: &Path) -> Result<Self, UnpackError> {
    let name = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| UnpackError::UnsupportedFormat(path.to_path_buf()))?;

    let format = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      Self::TarGz
    } else if name.ends_with(".tar.xz") {
      Self::TarXz
    } else if name.ends_with(".tar.zst") {
      Self::TarZst
    } else if name.ends_with(".tar") {
      Self::Tar
    } else if name.ends_with(".deb") {
      Self::Deb
    } else if name.ends_with(".pkg") {
      Self::Pkg
    } else {
      return Err(UnpackError::UnsupportedFormat(path.to_path_buf()));
    };
    Ok(format)
  }
}

/// Which entries to extract and how to re-root them.
#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
  /// Leading path components dropped from every entry.
  pub strip_components: usize,
  /// Path prefixes (after stripping) to keep. Empty keeps everything.
  pub include: Vec<PathBuf>,
}

impl UnpackOptions {
  pub fn strip(strip_components: usize) -> Self {
    Self {
      strip_components,
      include: Vec::new(),
    }
  }

  pub fn only<I, P>(mut self, prefixes: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    self.include = prefixes.into_iter().map(Into::into).collect();
    self
  }

  /// Map an archive entry path to its destination-relative path, or `None` to skip it.
  fn map_entry(&self, path: &Path) -> Option<PathBuf> {
    let mut components = Vec::new();
    for component in path.components() {
      match component {
        Component::Normal(part) => components.push(part),
        Component::CurDir => {}
        // Never write outside the destination
        Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
      }
    }

    let stripped: PathBuf = components.into_iter().skip(self.strip_components).collect();
    if stripped.as_os_str().is_empty() {
      return None;
    }
    if !self.include.is_empty() && !self.include.iter().any(|prefix| stripped.starts_with(prefix)) {
      return None;
    }
    Some(stripped)
  }
}

/// Extract `archive` into `dest`. Returns the number of extracted entries.
pub async fn unpack(archive: &Path, dest: &Path, options: &UnpackOptions) -> Result<usize, UnpackError> {
  let format = ArchiveFormat::detect(archive)?;
  info!(archive = ?archive, dest = ?dest, ?format, "unpacking");

  std::fs::create_dir_all(dest).map_err(|e| UnpackError::io(dest, e))?;

  let count = if format == ArchiveFormat::Pkg {
    pkg::unpack_pkg(archive, dest).await?
  } else {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let options = options.clone();
    tokio::task::spawn_blocking(move || unpack_sync(format, &archive, &dest, &options)).await??
  };

  debug!(entries = count, "unpack complete");
  Ok(count)
}

fn unpack_sync(format: ArchiveFormat, archive: &Path, dest: &Path, options: &UnpackOptions) -> Result<usize, UnpackError> {
  let file = File::open(archive).map_err(|e| UnpackError::io(archive, e))?;
  let reader = BufReader::new(file);

  match format {
    ArchiveFormat::Tar => unpack_tar(reader, archive, dest, options),
    ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(reader), archive, dest, options),
    ArchiveFormat::TarXz => unpack_tar(xz2::read::XzDecoder::new(reader), archive, dest, options),
    ArchiveFormat::TarZst => {
      let decoder = zstd::stream::read::Decoder::new(reader).map_err(|e| UnpackError::corrupt(archive, e))?;
      unpack_tar(decoder, archive, dest, options)
    }
    ArchiveFormat::Deb => deb::unpack_deb(reader, archive, dest, options),
    ArchiveFormat::Pkg => Err(UnpackError::UnsupportedFormat(archive.to_path_buf())),
  }
}

/// Extract a tar stream, re-rooting entries according to `options`.
pub(crate) fn unpack_tar<R: Read>(
  reader: R,
  archive_path: &Path,
  dest: &Path,
  options: &UnpackOptions,
) -> Result<usize, UnpackError> {
  let mut archive = Archive::new(reader);
  let mut count = 0;
  let canonical_dest = std::fs::canonicalize(dest).map_err(|e| UnpackError::io(dest, e))?;

  for entry in archive.entries().map_err(|e| UnpackError::corrupt(archive_path, e))? {
    let mut entry = entry.map_err(|e| UnpackError::corrupt(archive_path, e))?;
    let entry_path = entry.path().map_err(|e| UnpackError::corrupt(archive_path, e))?.into_owned();

    let Some(relative) = options.map_entry(&entry_path) else {
      continue;
    };
    let dest_path = dest.join(&relative);
    ensure_inside(dest, &canonical_dest, &relative, archive_path)?;

    if let Some(parent) = dest_path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| UnpackError::io(parent, e))?;
    }

    // Replace files left by a previous run; directories are merged
    if let Ok(existing) = std::fs::symlink_metadata(&dest_path)
      && !existing.is_dir()
    {
      std::fs::remove_file(&dest_path).map_err(|e| UnpackError::io(&dest_path, e))?;
    }

    if entry.header().entry_type() == EntryType::Link {
      let link_name = entry
        .link_name()
        .map_err(|e| UnpackError::corrupt(archive_path, e))?
        .ok_or_else(|| UnpackError::corrupt(archive_path, io::Error::other("hard link without target")))?;
      let Some(target) = options.map_entry(&link_name) else {
        debug!(link = ?entry_path, "skipping hard link to excluded entry");
        continue;
      };
      ensure_inside(dest, &canonical_dest, &target, archive_path)?;
      let target = dest.join(target);
      if std::fs::hard_link(&target, &dest_path).is_err() {
        std::fs::copy(&target, &dest_path).map_err(|e| UnpackError::io(&dest_path, e))?;
      }
    } else {
      entry.unpack(&dest_path).map_err(|e| UnpackError::io(&dest_path, e))?;
    }

    count += 1;
  }

  Ok(count)
}

/// Reject `relative` when a directory already on its way resolves outside `dest`.
///
/// Only existing components are checked; whatever is missing gets created as
/// a plain directory under the last verified one.
fn ensure_inside(dest: &Path, canonical_dest: &Path, relative: &Path, archive_path: &Path) -> Result<(), UnpackError> {
  let mut current = dest.to_path_buf();
  for component in relative.parent().into_iter().flat_map(Path::components) {
    current.push(component);
    match std::fs::symlink_metadata(&current) {
      Ok(metadata) if metadata.file_type().is_symlink() => {
        let resolved = std::fs::canonicalize(&current).map_err(|e| UnpackError::io(&current, e))?;
        if !resolved.starts_with(canonical_dest) {
          return Err(UnpackError::OutsideDestination {
            archive: archive_path.to_path_buf(),
            entry: relative.to_path_buf(),
          });
        }
      }
      Ok(_) => {}
      Err(_) => break,
    }
  }
  Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use flate2::Compression;
  use flate2::write::GzEncoder;
  use tempfile::TempDir;

  /// Build a tar archive from `(path, contents)` file entries and `(path, target)` symlinks.
  pub(crate) fn tar_bytes(files: &[(&str, &str)], symlinks: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, contents) in files {
      let mut header = tar::Header::new_gnu();
      header.set_size(contents.len() as u64);
      header.set_mode(0o755);
      header.set_cksum();
      builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
    }
    for (path, target) in symlinks {
      let mut header = tar::Header::new_gnu();
      header.set_entry_type(EntryType::Symlink);
      header.set_size(0);
      builder.append_link(&mut header, path, target).unwrap();
    }
    builder.into_inner().unwrap()
  }

  pub(crate) fn gzip(bytes: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
  }

  #[test]
  fn detect_formats_by_extension() {
    assert_eq!(ArchiveFormat::detect(Path::new("a.tar.gz")).unwrap(), ArchiveFormat::TarGz);
    assert_eq!(ArchiveFormat::detect(Path::new("a.tgz")).unwrap(), ArchiveFormat::TarGz);
    assert_eq!(ArchiveFormat::detect(Path::new("a.tar.xz")).unwrap(), ArchiveFormat::TarXz);
    assert_eq!(ArchiveFormat::detect(Path::new("a.tar.zst")).unwrap(), ArchiveFormat::TarZst);
    assert_eq!(ArchiveFormat::detect(Path::new("libc6_2.35_amd64.deb")).unwrap(), ArchiveFormat::Deb);
    assert_eq!(ArchiveFormat::detect(Path::new("swift-osx.pkg")).unwrap(), ArchiveFormat::Pkg);
    assert!(matches!(
      ArchiveFormat::detect(Path::new("a.zip")),
      Err(UnpackError::UnsupportedFormat(_))
    ));
  }

  #[test]
  fn map_entry_strips_and_filters() {
    let options = UnpackOptions::strip(1).only(["usr/lib/swift/linux"]);
    assert_eq!(
      options.map_entry(Path::new("swift-5.9/usr/lib/swift/linux/libFoundation.so")),
      Some(PathBuf::from("usr/lib/swift/linux/libFoundation.so"))
    );
    assert_eq!(options.map_entry(Path::new("swift-5.9/usr/bin/swift")), None);
    assert_eq!(options.map_entry(Path::new("swift-5.9/")), None);
    assert_eq!(options.map_entry(Path::new("swift-5.9/../etc/passwd")), None);
  }

  #[test]
  fn map_entry_ignores_leading_dot() {
    let options = UnpackOptions::default();
    assert_eq!(
      options.map_entry(Path::new("./usr/include/stdio.h")),
      Some(PathBuf::from("usr/include/stdio.h"))
    );
  }

  #[tokio::test]
  async fn unpack_tar_gz_strips_top_level_directory() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("swift-5.9-RELEASE-ubuntu22.04.tar.gz");
    let tar = tar_bytes(
      &[("swift-5.9-RELEASE-ubuntu22.04/usr/bin/swift-frontend", "#!frontend")],
      &[("swift-5.9-RELEASE-ubuntu22.04/usr/bin/swift", "swift-frontend")],
    );
    std::fs::write(&archive, gzip(&tar)).unwrap();

    let dest = temp.path().join("out");
    let count = unpack(&archive, &dest, &UnpackOptions::strip(1)).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(
      std::fs::read_to_string(dest.join("usr/bin/swift-frontend")).unwrap(),
      "#!frontend"
    );
    #[cfg(unix)]
    assert_eq!(
      std::fs::read_link(dest.join("usr/bin/swift")).unwrap(),
      PathBuf::from("swift-frontend")
    );
  }

  #[tokio::test]
  async fn unpack_twice_overwrites_previous_contents() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("payload.tar");
    let dest = temp.path().join("out");

    std::fs::write(&archive, tar_bytes(&[("top/file.txt", "first")], &[("top/link", "file.txt")])).unwrap();
    unpack(&archive, &dest, &UnpackOptions::strip(1)).await.unwrap();

    std::fs::write(&archive, tar_bytes(&[("top/file.txt", "second")], &[("top/link", "file.txt")])).unwrap();
    unpack(&archive, &dest, &UnpackOptions::strip(1)).await.unwrap();

    assert_eq!(std::fs::read_to_string(dest.join("file.txt")).unwrap(), "second");
  }

  #[tokio::test]
  async fn unpack_tar_xz() {
    use std::io::Write;
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04.tar.xz");
    let tar = tar_bytes(
      &[
        ("clang+llvm-16.0.5/bin/lld", "lld-binary"),
        ("clang+llvm-16.0.5/bin/clang", "clang-binary"),
      ],
      &[],
    );
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 1);
    encoder.write_all(&tar).unwrap();
    std::fs::write(&archive, encoder.finish().unwrap()).unwrap();

    let dest = temp.path().join("out");
    let count = unpack(&archive, &dest, &UnpackOptions::strip(1).only(["bin/lld"]))
      .await
      .unwrap();

    assert_eq!(count, 1);
    assert!(dest.join("bin/lld").exists());
    assert!(!dest.join("bin/clang").exists());
  }

  /// Build a tar whose entries appear in exactly the given order.
  fn ordered_tar(entries: &[(&str, Option<&Path>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, link) in entries {
      let mut header = tar::Header::new_gnu();
      match link {
        Some(target) => {
          header.set_entry_type(EntryType::Symlink);
          header.set_size(0);
          builder.append_link(&mut header, path, target).unwrap();
        }
        None => {
          header.set_size(5);
          header.set_mode(0o644);
          header.set_cksum();
          builder.append_data(&mut header, path, "owned".as_bytes()).unwrap();
        }
      }
    }
    builder.into_inner().unwrap()
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn entries_under_escaping_symlink_are_rejected() {
    let temp = TempDir::new().unwrap();
    let outside = temp.path().join("outside");
    std::fs::create_dir_all(&outside).unwrap();
    let archive = temp.path().join("data.tar");
    std::fs::write(
      &archive,
      ordered_tar(&[("./escape", Some(outside.as_path())), ("./escape/sub/owned", None)]),
    )
    .unwrap();

    let dest = temp.path().join("out");
    let err = unpack(&archive, &dest, &UnpackOptions::default()).await.unwrap_err();

    assert!(matches!(err, UnpackError::OutsideDestination { .. }));
    assert!(!outside.join("sub").exists());
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn entries_under_internal_symlink_are_extracted() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("data.tar");
    std::fs::write(
      &archive,
      ordered_tar(&[
        ("./usr/lib/x86_64-linux-gnu/.keep", None),
        ("./lib64", Some(Path::new("usr/lib/x86_64-linux-gnu"))),
        ("./lib64/libz.so.1", None),
      ]),
    )
    .unwrap();

    let dest = temp.path().join("out");
    unpack(&archive, &dest, &UnpackOptions::default()).await.unwrap();

    assert_eq!(
      std::fs::read_to_string(dest.join("usr/lib/x86_64-linux-gnu/libz.so.1")).unwrap(),
      "owned"
    );
  }

  #[tokio::test]
  async fn corrupt_archive_is_reported() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("broken.tar.gz");
    std::fs::write(&archive, b"definitely not gzip").unwrap();

    let err = unpack(&archive, &temp.path().join("out"), &UnpackOptions::default())
      .await
      .unwrap_err();
    assert!(matches!(err, UnpackError::Corrupt { .. }));
  }
}
