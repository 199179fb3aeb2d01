//! LLD provisioning.
//!
//! The `lld` binary is extracted from the LLVM release archive for the host
//! once per (LLD version, host) pair and kept in the cache engine. Each run
//! copies it into the toolchain as `ld.lld`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::Engine;
use crate::error::GeneratorError;
use crate::fetch::{ArtifactFetcher, ArtifactSource};
use crate::fs::FsError;
use crate::platform::HostPlatform;
use crate::unpack::{UnpackError, UnpackOptions, unpack};
use crate::util::hash::Hashable;

const LLD_MEMBER: &str = "bin/lld";
const LINKER_NAME: &str = "ld.lld";

/// Cache description of an extracted linker.
#[derive(Debug, Serialize)]
struct LinkerRecipe<'a> {
  tool: &'static str,
  version: &'a str,
  host: String,
  url: &'a str,
}

impl Hashable for LinkerRecipe<'_> {}

/// Place `ld.lld` into `toolchain_bin_dir`. Returns its path.
pub async fn provision_linker(
  fetcher: &ArtifactFetcher,
  engine: &Engine,
  lld_version: &str,
  archive_url: &str,
  host: &HostPlatform,
  toolchain_bin_dir: &Path,
) -> Result<PathBuf, GeneratorError> {
  let recipe = LinkerRecipe {
    tool: "lld",
    version: lld_version,
    host: host.triple(),
    url: archive_url,
  };
  let key = Engine::key(&recipe)?;

  let entry = engine
    .put(&key, |dir| async move {
      let archive = fetcher.fetch(&ArtifactSource::http(archive_url), engine).await?;
      unpack(&archive, &dir, &UnpackOptions::strip(1).only([LLD_MEMBER])).await?;
      if !dir.join(LLD_MEMBER).is_file() {
        return Err(GeneratorError::from(UnpackError::MissingMember {
          archive,
          member: LLD_MEMBER.to_string(),
        }));
      }
      info!(version = %lld_version, "extracted lld");
      Ok::<(), GeneratorError>(())
    })
    .await?;

  let source = entry.path.join(LLD_MEMBER);
  let dest = toolchain_bin_dir.join(LINKER_NAME);
  install_executable(&source, &dest).await?;
  debug!(path = ?dest, "linker in place");
  Ok(dest)
}

async fn install_executable(source: &Path, dest: &Path) -> Result<(), FsError> {
  if let Some(parent) = dest.parent() {
    crate::fs::create_directory_if_needed(parent).await?;
  }
  if crate::fs::does_file_exist(dest).await {
    tokio::fs::remove_file(dest).await.map_err(|e| FsError::io(dest, e))?;
  }
  tokio::fs::copy(source, dest).await.map_err(|e| FsError::io(dest, e))?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o755))
      .await
      .map_err(|e| FsError::io(dest, e))?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fetch::FetchOptions;
  use crate::platform::{Cpu, Os};
  use crate::unpack::tests::tar_bytes;
  use std::io::Write;
  use tempfile::TempDir;

  fn llvm_archive() -> Vec<u8> {
    let tar = tar_bytes(
      &[
        ("clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04/bin/lld", "lld-binary"),
        ("clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04/bin/clang", "clang-binary"),
      ],
      &[],
    );
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 1);
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
  }

  #[tokio::test]
  async fn linker_is_extracted_once_and_copied_every_time() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04.tar.xz")
      .with_status(200)
      .with_body(llvm_archive())
      .expect(1)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let engine = Engine::open(&temp.path().join("engine")).unwrap();
    let fetcher = ArtifactFetcher::new(FetchOptions::default()).unwrap();
    let host = HostPlatform::new(Cpu::X86_64, Os::Linux);
    let url = format!("{}/clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04.tar.xz", server.url());

    let first_bin = temp.path().join("first/usr/bin");
    let second_bin = temp.path().join("second/usr/bin");
    let first = provision_linker(&fetcher, &engine, "16.0.5", &url, &host, &first_bin)
      .await
      .unwrap();
    let second = provision_linker(&fetcher, &engine, "16.0.5", &url, &host, &second_bin)
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(fetcher.retrievals(), 1);
    assert_eq!(first, first_bin.join("ld.lld"));
    assert_eq!(std::fs::read_to_string(&second).unwrap(), "lld-binary");

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      let mode = std::fs::metadata(&first).unwrap().permissions().mode();
      assert_eq!(mode & 0o111, 0o111);
    }
  }

  #[tokio::test]
  async fn archive_without_lld_fails() {
    let mut server = mockito::Server::new_async().await;
    let tar = tar_bytes(&[("clang+llvm/bin/clang", "clang")], &[]);
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 1);
    encoder.write_all(&tar).unwrap();
    server
      .mock("GET", "/llvm.tar.xz")
      .with_status(200)
      .with_body(encoder.finish().unwrap())
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let engine = Engine::open(&temp.path().join("engine")).unwrap();
    let fetcher = ArtifactFetcher::new(FetchOptions::default()).unwrap();
    let host = HostPlatform::new(Cpu::X86_64, Os::Linux);
    let url = format!("{}/llvm.tar.xz", server.url());

    let err = provision_linker(&fetcher, &engine, "16.0.5", &url, &host, temp.path())
      .await
      .unwrap_err();
    assert!(matches!(err, GeneratorError::Unpack(UnpackError::MissingMember { .. })));
  }
}
