//! Debian package extraction.
//!
//! A `.deb` is an `ar` archive holding `debian-binary`, `control.tar.*` and
//! `data.tar.*`. Only the data member is extracted.

use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use super::{UnpackError, UnpackOptions, unpack_tar};

pub(super) fn unpack_deb<R: Read>(
  reader: R,
  archive_path: &Path,
  dest: &Path,
  options: &UnpackOptions,
) -> Result<usize, UnpackError> {
  let mut archive = ar::Archive::new(reader);

  while let Some(entry) = archive.next_entry() {
    let entry = entry.map_err(|e| UnpackError::corrupt(archive_path, e))?;
    let identifier = String::from_utf8_lossy(entry.header().identifier()).into_owned();
    let identifier = identifier.trim_end_matches('/');

    if !identifier.starts_with("data.tar") {
      continue;
    }
    debug!(archive = ?archive_path, member = identifier, "extracting deb data member");

    return match identifier {
      "data.tar" => unpack_tar(entry, archive_path, dest, options),
      "data.tar.gz" => unpack_tar(GzDecoder::new(entry), archive_path, dest, options),
      "data.tar.xz" => unpack_tar(xz2::read::XzDecoder::new(entry), archive_path, dest, options),
      "data.tar.zst" => {
        let decoder = zstd::stream::read::Decoder::new(entry).map_err(|e| UnpackError::corrupt(archive_path, e))?;
        unpack_tar(decoder, archive_path, dest, options)
      }
      other => Err(UnpackError::UnsupportedFormat(archive_path.join(other))),
    };
  }

  Err(UnpackError::MissingMember {
    archive: archive_path.to_path_buf(),
    member: "data.tar.*".to_string(),
  })
}
