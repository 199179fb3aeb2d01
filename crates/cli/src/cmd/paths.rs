//! Implementation of the `sdkgen paths` command.

use anyhow::Result;

use super::TargetArgs;
use crate::output::{OutputFormat, print_json, print_stat};

/// Print where a bundle for `args` would be written.
pub fn cmd_paths(args: &TargetArgs, output: OutputFormat) -> Result<()> {
  let config = args.to_config()?;
  let paths = config.paths();

  if output.is_json() {
    return print_json(&paths);
  }

  println!("{} ({})", config.artifact_id, config.target);
  print_stat("bundle", &paths.artifact_bundle.display().to_string());
  print_stat("sdk", &paths.sdk_dir.display().to_string());
  print_stat("toolchain", &paths.toolchain_dir.display().to_string());
  print_stat("artifacts", &paths.artifacts_cache.display().to_string());
  print_stat("engine", &config.engine_cache_path.display().to_string());
  Ok(())
}
