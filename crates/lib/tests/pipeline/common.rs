//! Shared fixtures for pipeline integration tests.
//!
//! A mock server stands in for download.swift.org, the LLVM releases and an
//! Ubuntu mirror, serving small archives with the same layout as the real ones.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Mock, Server, ServerGuard};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use sdkgen_lib::distribution::{LinuxDistribution, UbuntuRelease};
use sdkgen_lib::platform::{Cpu, HostPlatform, Os, TargetTriple};
use sdkgen_lib::versions::VersionsConfiguration;
use sdkgen_lib::{GenerationConfig, Reporter, Stage};

pub const SWIFT_ARCHIVE_PATH: &str = "/swift-5.9-release/ubuntu2204/swift-5.9-RELEASE/swift-5.9-RELEASE-ubuntu22.04.tar.gz";
pub const LLVM_ARCHIVE_PATH: &str = "/llvmorg-16.0.5/clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04.tar.xz";
pub const PACKAGES_INDEX_PATH: &str = "/ubuntu/dists/jammy/main/binary-amd64/Packages.gz";

pub enum Entry<'a> {
  File(&'a str, &'a str),
  Symlink(&'a str, &'a str),
}

pub fn tar(entries: &[Entry<'_>]) -> Vec<u8> {
  let mut builder = tar::Builder::new(Vec::new());
  for entry in entries {
    let mut header = tar::Header::new_gnu();
    match entry {
      Entry::File(path, contents) => {
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
      }
      Entry::Symlink(path, target) => {
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        builder.append_link(&mut header, path, target).unwrap();
      }
    }
  }
  builder.into_inner().unwrap()
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
  let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
  encoder.write_all(bytes).unwrap();
  encoder.finish().unwrap()
}

pub fn xz(bytes: &[u8]) -> Vec<u8> {
  let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 1);
  encoder.write_all(bytes).unwrap();
  encoder.finish().unwrap()
}

pub fn deb(data_tar_gz: &[u8]) -> Vec<u8> {
  let mut builder = ar::Builder::new(Vec::new());
  let control = gzip(&tar(&[Entry::File("./control", "Package: fixture\n")]));
  for (name, contents) in [
    ("debian-binary", b"2.0\n".as_slice()),
    ("control.tar.gz", control.as_slice()),
    ("data.tar.gz", data_tar_gz),
  ] {
    let header = ar::Header::new(name.as_bytes().to_vec(), contents.len() as u64);
    builder.append(&header, contents).unwrap();
  }
  builder.into_inner().unwrap()
}

pub fn sha256(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

/// Ubuntu 22.04 x86_64 toolchain. Serves as both host toolchain and target runtime.
pub fn swift_toolchain() -> Vec<u8> {
  let top = "swift-5.9-RELEASE-ubuntu22.04";
  let files = [
    ("usr/bin/swift-frontend", "#!frontend"),
    ("usr/lib/swift/clang/include/stddef.h", "/* stddef */"),
    ("usr/lib/swift/linux/libswiftCore.so", "core"),
    (
      "usr/lib/swift/linux/x86_64/glibc.modulemap",
      "module SwiftGlibc [system] {\n    header \"/usr/include/stdio.h\"\n    export *\n}\n",
    ),
    ("usr/lib/swift/shims/module.modulemap", "module SwiftShims {}\n"),
    ("usr/lib/swift_static/linux/libswiftCore.a", "static core"),
    ("usr/lib/swift_static/shims/module.modulemap", "module SwiftShims {}\n"),
  ];
  let paths: Vec<(String, &str)> = files.iter().map(|(p, c)| (format!("{top}/{p}"), *c)).collect();
  let swift_link = format!("{top}/usr/bin/swift");
  let swiftc_link = format!("{top}/usr/bin/swiftc");
  let abs_link = format!("{top}/usr/lib/swift/linux/libswiftCore.so.5");

  let mut entries: Vec<Entry<'_>> = paths.iter().map(|(p, c)| Entry::File(p, c)).collect();
  entries.push(Entry::Symlink(&swift_link, "swift-frontend"));
  entries.push(Entry::Symlink(&swiftc_link, "swift-frontend"));
  entries.push(Entry::Symlink(&abs_link, "/usr/lib/swift/linux/libswiftCore.so"));
  gzip(&tar(&entries))
}

pub fn llvm_release() -> Vec<u8> {
  xz(&tar(&[
    Entry::File("clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04/bin/lld", "lld-binary"),
    Entry::File("clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04/bin/clang", "clang-binary"),
    Entry::Symlink("clang+llvm-16.0.5-x86_64-linux-gnu-ubuntu-22.04/bin/ld.lld", "lld"),
  ]))
}

/// `.deb` contents for a required package. libc6 carries an absolute symlink.
pub fn package_deb(name: &str) -> Vec<u8> {
  let header = format!("./usr/include/{name}.h");
  let data = if name == "libc6" {
    tar(&[
      Entry::File("./lib/x86_64-linux-gnu/libm.so.6", "libm"),
      Entry::Symlink("./usr/lib/x86_64-linux-gnu/libm.so", "/lib/x86_64-linux-gnu/libm.so.6"),
      Entry::File(&header, "/* header */"),
    ])
  } else {
    tar(&[Entry::File(&header, "/* header */")])
  };
  deb(&gzip(&data))
}

/// Records stage notifications and the final message.
#[derive(Default)]
pub struct Recorder {
  pub stages: Mutex<Vec<Stage>>,
  pub messages: Mutex<Vec<String>>,
}

impl Reporter for Recorder {
  fn stage(&self, stage: Stage) {
    self.stages.lock().unwrap().push(stage);
  }

  fn finished(&self, message: &str) {
    self.messages.lock().unwrap().push(message.to_string());
  }
}

/// Mock upstream plus scratch space for bundles and the cache engine.
pub struct Upstream {
  pub server: ServerGuard,
  pub temp: TempDir,
  pub mocks: Vec<Mock>,
}

impl Upstream {
  /// Serve everything an Ubuntu 22.04 x86_64 run needs, each expected exactly once.
  pub async fn jammy() -> Self {
    Self::jammy_with_packages(UbuntuRelease::Jammy.required_packages()).await
  }

  /// Like [`Upstream::jammy`], listing only `packages` in the index.
  pub async fn jammy_with_packages(packages: &[&str]) -> Self {
    let mut upstream = Self::toolchains().await;
    let server = &mut upstream.server;

    let mut index = String::new();
    for name in packages {
      let body = package_deb(name);
      let filename = format!("pool/main/{name}_1.0_amd64.deb");
      index.push_str(&format!(
        "Package: {name}\nArchitecture: amd64\nFilename: {filename}\nSHA256: {}\n\n",
        sha256(&body)
      ));
      upstream.mocks.push(
        server
          .mock("GET", format!("/ubuntu/{filename}").as_str())
          .with_status(200)
          .with_body(body)
          .expect(1)
          .create_async()
          .await,
      );
    }
    upstream.mocks.push(
      server
        .mock("GET", PACKAGES_INDEX_PATH)
        .with_status(200)
        .with_body(gzip(index.as_bytes()))
        .expect(1)
        .create_async()
        .await,
    );
    upstream
  }

  /// Only the Swift toolchain and LLVM release, as a Docker-based run needs.
  pub async fn toolchains() -> Self {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();

    mocks.push(
      server
        .mock("GET", SWIFT_ARCHIVE_PATH)
        .with_status(200)
        .with_body(swift_toolchain())
        .expect(1)
        .create_async()
        .await,
    );
    mocks.push(
      server
        .mock("GET", LLVM_ARCHIVE_PATH)
        .with_status(200)
        .with_body(llvm_release())
        .expect(1)
        .create_async()
        .await,
    );

    Self {
      server,
      temp: TempDir::new().unwrap(),
      mocks,
    }
  }

  pub fn bundles_root(&self) -> PathBuf {
    self.temp.path().join("bundles")
  }

  pub fn engine(&self) -> PathBuf {
    self.temp.path().join("engine")
  }

  pub fn versions(&self, distribution: LinuxDistribution) -> VersionsConfiguration {
    VersionsConfiguration {
      distribution,
      swift_download_base: self.server.url(),
      llvm_download_base: self.server.url(),
      ubuntu_mirror: Some(format!("{}/ubuntu", self.server.url())),
      ..VersionsConfiguration::default()
    }
  }

  /// Clean, package-based x86_64 run on a Linux x86_64 host.
  pub fn config(&self) -> GenerationConfig {
    GenerationConfig::new(
      TargetTriple::linux(Cpu::X86_64),
      HostPlatform::new(Cpu::X86_64, Os::Linux),
      self.versions(LinuxDistribution::Ubuntu(UbuntuRelease::Jammy)),
      self.bundles_root(),
      self.engine(),
    )
  }

  pub async fn assert_each_fetched_once(&self) {
    for mock in &self.mocks {
      mock.assert_async().await;
    }
  }
}

pub fn read_json(path: &Path) -> serde_json::Value {
  let content = std::fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
  assert!(content.ends_with('\n'), "{} lacks a trailing newline", path.display());
  serde_json::from_str(&content).unwrap()
}

pub fn recorder() -> Arc<Recorder> {
  Arc::new(Recorder::default())
}
