//! Implementation of the `sdkgen generate` command.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use sdkgen_lib::Pipeline;

use super::TargetArgs;
use crate::output::{TerminalReporter, format_duration, print_info};

/// Generate a bundle, reporting each stage as it starts.
///
/// With `incremental`, the SDK and toolchain directories of a previous run are
/// reused; otherwise they are removed first.
pub fn cmd_generate(args: &TargetArgs, incremental: bool) -> Result<()> {
  let mut config = args.to_config()?;
  config.is_incremental = incremental;

  print_info(&format!(
    "Generating {} for {} ({})",
    config.artifact_id, config.target, config.versions.distribution
  ));
  info!(engine = ?config.engine_cache_path, "using cache engine");

  let pipeline = Pipeline::new(config).with_reporter(Arc::new(TerminalReporter));
  let started = Instant::now();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(pipeline.run())?;

  print_info(&format!("Finished in {}", format_duration(started.elapsed())));
  Ok(())
}
