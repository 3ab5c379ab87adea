use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod domain;
mod services;

use cli::Cli;
use domain::error::FixError;
use services::output::print_error;
use services::storage::load_config;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PBIFIX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    let cfg = load_config()?.general;

    if commands::handle_run_command(cli, &cfg)? {
        return Ok(());
    }
    if commands::handle_report_commands(cli, &cfg)? {
        return Ok(());
    }
    if commands::handle_model_commands(cli, &cfg)? {
        return Ok(());
    }
    if commands::handle_thin_commands(cli, &cfg)? {
        return Ok(());
    }
    if commands::handle_item_commands(cli, &cfg)? {
        return Ok(());
    }
    commands::handle_fixers_command(cli)?;
    Ok(())
}

fn error_code(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<FixError>()
        .map(FixError::code)
        .unwrap_or("INTERNAL")
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = dispatch(&cli) {
        tracing::debug!(error = ?err, "command failed");
        print_error(cli.json, error_code(&err), &format!("{err:#}"));
        std::process::exit(1);
    }
}
