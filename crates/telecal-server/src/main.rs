//! telecal entry point.

use std::process::ExitCode;

use clap::Parser;

use telecal_core::init_tracing;
use telecal_server::cli::{AuthAction, Cli, Command, ConfigAction};
use telecal_server::commands;
use telecal_server::config::Config;
use telecal_server::error::ServerResult;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is the normal case in deployments.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ServerResult<()> {
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    init_tracing(config.logging.tracing_config(cli.debug, chrono::Local::now())?)?;

    match cli.command {
        None | Some(Command::Serve) => commands::serve::serve(&config).await,
        Some(Command::SetWebhook) => commands::serve::set_webhook(&config).await,
        Some(Command::Auth { action }) => match action {
            AuthAction::Status => commands::auth::status(&config),
            AuthAction::Reset => commands::auth::reset(&config),
        },
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, cli.config.as_deref()),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
