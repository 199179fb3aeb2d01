//! The generation pipeline.
//!
//! A run walks the [`Stage`]s in order. The plan is resolved before anything
//! touches the filesystem or network, so configuration errors surface first.
//! The cache engine lock and HTTP client live only for the duration of
//! [`Pipeline::run`], and the first failing stage ends the run with its error
//! unchanged.

pub mod plan;
pub mod stages;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::cache::Engine;
use crate::config::GenerationConfig;
use crate::error::GeneratorError;
use crate::fetch::ArtifactFetcher;
use crate::fixups;
use crate::linker::provision_linker;
use crate::manifest::generate_manifests;
use crate::paths::PathsConfiguration;

pub use plan::{GenerationPlan, TargetAcquisition, resolve_plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
  ResolvePlan,
  ResetDirectories,
  ScaffoldDirectories,
  FetchArtifacts,
  FetchDistributionPackages,
  UnpackHostToolchain,
  AcquireTargetSwift,
  ProvisionLinker,
  FixAbsoluteSymlinks,
  FixModuleMap,
  SymlinkClangHeaders,
  FixAutolinkExtract,
  GenerateManifests,
  Report,
}

impl Stage {
  pub fn description(&self) -> &'static str {
    match self {
      Stage::ResolvePlan => "resolving generation plan",
      Stage::ResetDirectories => "removing previous SDK and toolchain",
      Stage::ScaffoldDirectories => "creating bundle directories",
      Stage::FetchArtifacts => "fetching toolchain archives",
      Stage::FetchDistributionPackages => "fetching distribution packages",
      Stage::UnpackHostToolchain => "unpacking host toolchain",
      Stage::AcquireTargetSwift => "installing target Swift runtime",
      Stage::ProvisionLinker => "provisioning lld",
      Stage::FixAbsoluteSymlinks => "fixing absolute symlinks",
      Stage::FixModuleMap => "fixing glibc module map",
      Stage::SymlinkClangHeaders => "linking clang headers",
      Stage::FixAutolinkExtract => "checking swift-autolink-extract",
      Stage::GenerateManifests => "writing bundle manifests",
      Stage::Report => "done",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.description())
  }
}

/// Receives progress and the final message of a run.
pub trait Reporter: Send + Sync {
  fn stage(&self, _stage: Stage) {}
  fn finished(&self, message: &str);
}

/// Routes everything to `tracing`.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
  fn stage(&self, stage: Stage) {
    debug!(%stage, "stage");
  }

  fn finished(&self, message: &str) {
    info!("{message}");
  }
}

pub struct Pipeline {
  config: GenerationConfig,
  paths: PathsConfiguration,
  reporter: Arc<dyn Reporter>,
}

impl Pipeline {
  pub fn new(config: GenerationConfig) -> Self {
    let paths = config.paths();
    Self {
      config,
      paths,
      reporter: Arc::new(LogReporter),
    }
  }

  pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
    self.reporter = reporter;
    self
  }

  pub fn config(&self) -> &GenerationConfig {
    &self.config
  }

  pub fn paths(&self) -> &PathsConfiguration {
    &self.paths
  }

  fn enter(&self, stage: Stage) {
    debug!(?stage, "entering stage");
    self.reporter.stage(stage);
  }

  pub async fn run(&self) -> Result<(), GeneratorError> {
    let started = Instant::now();
    let config = &self.config;
    let paths = &self.paths;

    self.enter(Stage::ResolvePlan);
    let plan = resolve_plan(config)?;
    info!(
      target = %plan.target,
      host = %plan.host,
      distribution = %config.versions.distribution,
      docker = plan.uses_docker(),
      incremental = config.is_incremental,
      "generating Swift SDK"
    );

    if !config.is_incremental {
      self.enter(Stage::ResetDirectories);
      stages::reset_directories(paths).await?;
    }

    self.enter(Stage::ScaffoldDirectories);
    stages::scaffold_directories(paths).await?;
    let engine = Engine::open(&config.engine_cache_path)?;
    let fetcher = ArtifactFetcher::new(config.fetch.clone())?;

    self.enter(Stage::FetchArtifacts);
    let artifacts = stages::fetch_artifacts(&fetcher, &engine, &plan, &paths.artifacts_cache).await?;

    if !plan.uses_docker() {
      self.enter(Stage::FetchDistributionPackages);
      stages::install_distribution_packages(&fetcher, &engine, &plan, &paths.sdk_dir).await?;
    }

    self.enter(Stage::UnpackHostToolchain);
    stages::unpack_host_toolchain(&artifacts.host_toolchain, &paths.toolchain_dir).await?;

    self.enter(Stage::AcquireTargetSwift);
    stages::acquire_target_swift(&fetcher, &engine, &plan, &artifacts, &paths.sdk_dir).await?;

    self.enter(Stage::ProvisionLinker);
    provision_linker(
      &fetcher,
      &engine,
      &plan.lld_version,
      &plan.lld_archive_url,
      &plan.host,
      &paths.toolchain_bin_dir,
    )
    .await?;

    self.enter(Stage::FixAbsoluteSymlinks);
    stages::fix_absolute_symlinks(paths).await?;

    self.enter(Stage::FixModuleMap);
    fixups::fix_module_map(&paths.sdk_dir, &plan.target).await?;

    self.enter(Stage::SymlinkClangHeaders);
    fixups::symlink_clang_headers(&paths.toolchain_dir).await?;

    self.enter(Stage::FixAutolinkExtract);
    fixups::fix_autolink_extract(&paths.toolchain_bin_dir).await?;

    self.enter(Stage::GenerateManifests);
    generate_manifests(paths, &config.artifact_id, &plan.target, &plan.host).await?;

    self.enter(Stage::Report);
    info!(
      retrievals = fetcher.retrievals(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "generation finished"
    );
    self
      .reporter
      .finished(&stages::success_message(paths, &config.artifact_id));
    Ok(())
  }
}
