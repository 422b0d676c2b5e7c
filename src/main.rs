//! CLI entry point for the fault-injection relay.

use clap::Parser;
use faultline::{AuditLog, ScenarioDriver, ToolConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Man-in-the-middle fault-injection relay for line-based protocols.
#[derive(Parser, Debug)]
#[command(name = "faultline", version, about)]
struct Args {
  /// Path to the game executable (JAR) under test
  game: PathBuf,
  /// Path to the JSON tool configuration
  config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  if !args.game.exists() {
    eprintln!("Cannot find game file {}", args.game.display());
    return ExitCode::FAILURE;
  }
  if !args.config.exists() {
    eprintln!("Cannot find config file {}", args.config.display());
    return ExitCode::FAILURE;
  }

  match run(args).await {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("{}", e);
      ExitCode::FAILURE
    }
  }
}

async fn run(args: Args) -> faultline::Result<()> {
  let config = ToolConfig::load(&args.config)?;
  let stem = args
    .game
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or("faultline");
  let audit = Arc::new(AuditLog::create(stem, config.print_log, config.log_mode_csv)?);
  let driver = ScenarioDriver::new(config, audit);
  driver.run(&args.game).await
}
