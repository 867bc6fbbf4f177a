mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod ui;
mod utils;

use crate::cli::{Cli, Commands};
use crate::config::{ConfigSources, WORKDIR_ENV};
use crate::error::{CliError, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| {
        CliError::Other(anyhow::anyhow!("Failed to install error report hook: {}", e))
    })?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("dockwright CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    if let Some(num_threads) = cli.threads {
        info!("Setting Rayon global thread pool to {} threads.", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| {
                CliError::Other(anyhow::anyhow!("Failed to build global thread pool: {}", e))
            })?;
    }

    let config = config::build_config(&ConfigSources {
        config_file: cli.config.as_deref(),
        set_values: &cli.set_values,
        workdir_env: std::env::var_os(WORKDIR_ENV).map(PathBuf::from),
    })?;
    debug!(workspace = %config.workspace_root.display(), "Configuration resolved.");

    let command_result = match cli.command {
        Commands::Fetch(args) => commands::acquire::fetch(args, &config).await,
        Commands::Import(args) => commands::acquire::import(args, &config).await,
        Commands::Predict(args) => commands::acquire::predict(args, &config).await,
        Commands::Clean(args) => commands::prepare::clean(args, &config).await,
        Commands::Normalize(args) => commands::prepare::normalize(args),
        Commands::Sanitize(args) => commands::prepare::sanitize(args),
        Commands::Prepare(args) => commands::prepare::prepare(args),
        Commands::Merge(args) => commands::merge::run(args, &config),
        Commands::Dock(args) => commands::dock::run(args, &config).await,
        Commands::Results(args) => commands::results::run(args, &config),
    };

    match &command_result {
        Ok(_) => info!("Command completed successfully."),
        Err(e) => error!("Command failed: {}", e),
    }
    command_result
}
