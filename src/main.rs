mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use llms_bootstrap::config::default_config_path;
use llms_bootstrap::{load_settings, logger, Bootstrapper, SystemRunner};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    logger::init(cli.verbose, cli.quiet)?;

    // Load configuration: defaults, file, environment, then flags
    let config_path = cli.config.clone().or_else(default_config_path);
    let mut settings = load_settings(config_path.as_deref()).context("loading settings")?;
    cli.apply(&mut settings);
    settings.validate().context("invalid settings")?;

    let report = Bootstrapper::new(settings, Arc::new(SystemRunner)).run().await;

    // Exit codes outside 0..=255 cannot be reported faithfully
    let code = u8::try_from(report.exit_code()).unwrap_or(1);
    Ok(ExitCode::from(code))
}
