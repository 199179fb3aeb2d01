//! Implementation of the `sdkgen check` command.
//!
//! Verifies that every archive a `generate` run would download is reachable,
//! without downloading or writing anything.

use anyhow::{Context, Result, bail};

use sdkgen_lib::fetch::ArtifactFetcher;
use sdkgen_lib::pipeline::resolve_plan;

use super::TargetArgs;
use crate::output::{print_error, print_success, print_warning};

pub fn cmd_check(args: &TargetArgs) -> Result<()> {
  let config = args.to_config()?;
  let plan = resolve_plan(&config)?;
  let fetcher = ArtifactFetcher::new(config.fetch.clone())?;

  if plan.uses_docker() {
    print_warning("the target sysroot comes from a Docker image and is not checked");
  }

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let mut missing = 0;
  for url in plan.remote_urls() {
    match rt.block_on(fetcher.exists(&url)) {
      Ok(true) => print_success(&url),
      Ok(false) => {
        missing += 1;
        print_error(&format!("not found: {url}"));
      }
      Err(e) => {
        missing += 1;
        print_error(&format!("{e}"));
      }
    }
  }

  if missing > 0 {
    bail!("{missing} artifact(s) unavailable");
  }
  Ok(())
}
