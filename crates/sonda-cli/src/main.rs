//! Sonda CLI: check and run SPA end-to-end scenarios
//!
//! ## Usage
//!
//! ```bash
//! sonda check scenarios/*.yaml                  # Parse and validate offline
//! sonda run login.yaml --url http://localhost:8100
//! sonda run login.yaml --headed --app-config 'lang="es"'
//! sonda config --config harness.yaml            # Effective harness config
//! ```

use clap::Parser;
use sonda_cli::{handlers, logging, Cli, CliConfig, CliError, CliResult, Commands, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);

    console::set_colors_enabled(config.color.should_color());
    logging::init(&config)?;

    match cli.command {
        Commands::Check(args) => handlers::execute_check(&config, &args),
        Commands::Config(args) => handlers::execute_config(&args),
        Commands::Run(args) => {
            let rt = tokio::runtime::Runtime::new().map_err(|e| {
                CliError::config(format!("Failed to create async runtime: {e}"))
            })?;
            rt.block_on(handlers::execute_run(&config, &args))
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.verbose, cli.quiet))
        .with_color(cli.color.into())
        .with_log_format(cli.log_format.into())
}
