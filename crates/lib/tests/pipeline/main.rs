//! End-to-end generation runs against a mock upstream.

mod common;

use std::path::{Path, PathBuf};

use common::{Upstream, read_json, recorder};
use sdkgen_lib::distribution::{LinuxDistribution, RhelRelease, UbuntuRelease};
use sdkgen_lib::error::GeneratorError;
use sdkgen_lib::fetch::FetchError;
use sdkgen_lib::fixups::module_map_path;
use sdkgen_lib::{Pipeline, Stage};

const ARTIFACT_ID: &str = "5.9-RELEASE_ubuntu_jammy_x86_64";

fn read_link(path: &Path) -> PathBuf {
  std::fs::read_link(path).unwrap_or_else(|e| panic!("{} is not a symlink: {}", path.display(), e))
}

#[tokio::test]
async fn clean_run_produces_complete_bundle() {
  let upstream = Upstream::jammy().await;
  let config = upstream.config();
  assert_eq!(config.artifact_id, ARTIFACT_ID);

  let recorder = recorder();
  let pipeline = Pipeline::new(config).with_reporter(recorder.clone());
  pipeline.run().await.unwrap();
  upstream.assert_each_fetched_once().await;

  let paths = pipeline.paths();
  let stages = recorder.stages.lock().unwrap().clone();
  assert_eq!(stages.first(), Some(&Stage::ResolvePlan));
  assert_eq!(stages.last(), Some(&Stage::Report));
  assert!(stages.contains(&Stage::FetchDistributionPackages));

  // Manifests
  let bundle = read_json(&paths.bundle_manifest());
  let variants = &bundle["artifacts"][ARTIFACT_ID]["variants"];
  assert_eq!(variants[0]["path"], format!("{ARTIFACT_ID}/x86_64-unknown-linux-gnu"));
  assert_eq!(variants[0]["supportedTriples"][0], "x86_64-unknown-linux-gnu");

  let toolset = read_json(&paths.toolset_json());
  assert_eq!(toolset["rootPath"], "swift.xctoolchain/usr/bin");
  assert_eq!(toolset["linker"]["path"], "ld.lld");
  assert_eq!(toolset["swiftCompiler"]["path"], "swiftc");
  assert_eq!(toolset["swiftCompiler"]["extraCLIOptions"][0], "-use-ld=lld");

  let destination = read_json(&paths.destination_json());
  let triple = &destination["targetTriples"]["x86_64-unknown-linux-gnu"];
  assert_eq!(triple["sdkRootPath"], "ubuntu-jammy.sdk");
  assert_eq!(triple["toolsetPaths"][0], "toolset.json");

  // Fetched archives are placed by name
  let placed = paths.artifacts_cache.join("swift-5.9-RELEASE-ubuntu22.04.tar.gz");
  assert_eq!(std::fs::read(&placed).unwrap(), common::swift_toolchain());

  // Toolchain
  let bin = &paths.toolchain_bin_dir;
  let tool_root = paths.swift_sdk_root.join(toolset["rootPath"].as_str().unwrap());
  assert!(tool_root.join("swiftc").exists());
  assert!(tool_root.join("ld.lld").is_file());
  assert_eq!(std::fs::read_to_string(bin.join("ld.lld")).unwrap(), "lld-binary");
  assert_eq!(read_link(&bin.join("swift-autolink-extract")), PathBuf::from("swift"));
  assert_eq!(
    read_link(&paths.toolchain_dir.join("usr/lib/swift_static/clang")),
    PathBuf::from("../swift/clang")
  );
  assert!(paths.toolchain_dir.join("usr/lib/swift_static/clang/include/stddef.h").is_file());

  // Sysroot
  let sdk = &paths.sdk_dir;
  for package in UbuntuRelease::Jammy.required_packages() {
    assert!(sdk.join(format!("usr/include/{package}.h")).is_file(), "{package} not installed");
  }
  assert_eq!(
    read_link(&sdk.join("usr/lib/x86_64-linux-gnu/libm.so")),
    PathBuf::from("../../../lib/x86_64-linux-gnu/libm.so.6")
  );
  assert_eq!(
    read_link(&sdk.join("usr/lib/swift/linux/libswiftCore.so.5")),
    PathBuf::from("libswiftCore.so")
  );
  assert!(sdk.join("usr/lib/swift_static/linux/libswiftCore.a").is_file());
  assert!(!sdk.join("usr/bin/swift-frontend").exists());

  let module_map = std::fs::read_to_string(module_map_path(sdk, &pipeline.config().target)).unwrap();
  assert!(module_map.contains("header \"../../../../include/stdio.h\""));
  assert!(!module_map.contains("\"/usr/include/"));

  let messages = recorder.messages.lock().unwrap();
  assert_eq!(messages.len(), 1);
  assert!(messages[0].contains(&format!("swift experimental-sdk install {}", paths.artifact_bundle.display())));
  assert!(messages[0].contains(&format!("swift build --experimental-swift-sdk {ARTIFACT_ID}")));
}

#[tokio::test]
async fn incremental_rerun_downloads_nothing() {
  let upstream = Upstream::jammy().await;

  Pipeline::new(upstream.config()).run().await.unwrap();

  let mut config = upstream.config();
  config.is_incremental = true;
  let pipeline = Pipeline::new(config);
  let autolink = pipeline.paths().toolchain_bin_dir.join("swift-autolink-extract");
  let stray = pipeline.paths().sdk_dir.join("usr/include/stray.h");
  std::fs::write(&stray, "kept").unwrap();

  let recorder = recorder();
  pipeline.with_reporter(recorder.clone()).run().await.unwrap();

  // Every mock still saw exactly one request
  upstream.assert_each_fetched_once().await;
  assert!(stray.is_file());
  assert_eq!(read_link(&autolink), PathBuf::from("swift"));
  assert!(!recorder.stages.lock().unwrap().contains(&Stage::ResetDirectories));
}

#[tokio::test]
async fn clean_rerun_removes_previous_contents() {
  let upstream = Upstream::jammy().await;

  let pipeline = Pipeline::new(upstream.config());
  pipeline.run().await.unwrap();

  let stray_sdk = pipeline.paths().sdk_dir.join("usr/include/stray.h");
  let stray_toolchain = pipeline.paths().toolchain_bin_dir.join("stray-tool");
  std::fs::write(&stray_sdk, "stale").unwrap();
  std::fs::write(&stray_toolchain, "stale").unwrap();

  pipeline.run().await.unwrap();

  upstream.assert_each_fetched_once().await;
  assert!(!stray_sdk.exists());
  assert!(!stray_toolchain.exists());
  assert!(pipeline.paths().toolchain_bin_dir.join("ld.lld").is_file());
  assert!(pipeline.paths().bundle_manifest().is_file());
}

#[tokio::test]
async fn missing_package_in_index_fails_the_run() {
  let packages: Vec<&str> = UbuntuRelease::Jammy
    .required_packages()
    .iter()
    .copied()
    .filter(|name| *name != "libicu70")
    .collect();
  let upstream = Upstream::jammy_with_packages(&packages).await;

  let err = Pipeline::new(upstream.config()).run().await.unwrap_err();

  match err {
    GeneratorError::Fetch(FetchError::MissingPackage { package, .. }) => assert_eq!(package, "libicu70"),
    other => panic!("unexpected error: {other}"),
  }
  assert!(!upstream.bundles_root().join(format!("{ARTIFACT_ID}.artifactbundle/info.json")).exists());
}

#[tokio::test]
async fn docker_only_distribution_without_docker_fails_before_network() {
  let upstream = Upstream::toolchains().await;
  let mut config = upstream.config();
  config.versions = upstream.versions(LinuxDistribution::Rhel(RhelRelease::Ubi9));

  let recorder = recorder();
  let err = Pipeline::new(config)
    .with_reporter(recorder.clone())
    .run()
    .await
    .unwrap_err();

  assert!(err.is_docker_only_distribution());
  assert_eq!(*recorder.stages.lock().unwrap(), vec![Stage::ResolvePlan]);
  assert!(!upstream.bundles_root().exists());
  for mock in &upstream.mocks {
    assert!(!mock.matched_async().await);
  }
}

#[cfg(unix)]
#[tokio::test]
#[serial_test::serial]
async fn docker_run_copies_sysroot_from_image() {
  use sdkgen_lib::fetch::DockerCli;
  use std::os::unix::fs::PermissionsExt;

  let upstream = Upstream::toolchains().await;
  let script = upstream.temp.path().join("docker");
  std::fs::write(
    &script,
    r#"#!/bin/sh
case "$1" in
  create) echo fake-container ;;
  cp)
    case "$2" in
      *:/usr/lib)
        mkdir -p "$3/swift/linux/x86_64"
        printf 'module SwiftGlibc [system] {\n    header "/usr/include/stdio.h"\n}\n' > "$3/swift/linux/x86_64/glibc.modulemap" ;;
      *:/usr/include)
        mkdir -p "$3" && echo '/* stdio */' > "$3/stdio.h" ;;
      *) echo "Error response from daemon: Could not find the file $2" >&2; exit 1 ;;
    esac ;;
  rm) ;;
esac
"#,
  )
  .unwrap();
  std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

  let mut config = upstream.config();
  config.versions = upstream.versions(LinuxDistribution::Rhel(RhelRelease::Ubi9));
  config.should_use_docker = true;
  config.artifact_id = "rhel-sdk".to_string();
  config.fetch.docker = DockerCli::new(script.to_string_lossy());

  let pipeline = Pipeline::new(config);
  pipeline.run().await.unwrap();
  upstream.assert_each_fetched_once().await;

  let sdk = &pipeline.paths().sdk_dir;
  assert!(sdk.ends_with("rhel-ubi9.sdk"));
  assert!(sdk.join("usr/include/stdio.h").is_file());
  let module_map = std::fs::read_to_string(module_map_path(sdk, &pipeline.config().target)).unwrap();
  assert!(module_map.contains("header \"../../../../include/stdio.h\""));
  assert!(pipeline.paths().toolchain_bin_dir.join("ld.lld").is_file());
  assert!(pipeline.paths().bundle_manifest().is_file());
}
