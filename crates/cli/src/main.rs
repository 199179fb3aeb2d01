mod cmd;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{TargetArgs, cmd_check, cmd_generate, cmd_paths};
use output::{OutputFormat, print_error};

/// sdkgen - Swift cross-compilation SDK bundle generator
#[derive(Parser)]
#[command(name = "sdkgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate a Swift SDK bundle
  Generate {
    #[command(flatten)]
    target: TargetArgs,

    /// Reuse the SDK and toolchain directories from a previous run
    #[arg(long)]
    incremental: bool,
  },

  /// Check that every archive needed for a bundle is downloadable
  Check {
    #[command(flatten)]
    target: TargetArgs,
  },

  /// Show where a bundle would be written
  Paths {
    #[command(flatten)]
    target: TargetArgs,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn init_tracing(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = match &cli.command {
    Commands::Generate { target, incremental } => cmd_generate(target, *incremental),
    Commands::Check { target } => cmd_check(target),
    Commands::Paths { target, output } => cmd_paths(target, *output),
  };

  if let Err(e) = result {
    print_error(&format!("{e:#}"));
    std::process::exit(1);
  }
}
