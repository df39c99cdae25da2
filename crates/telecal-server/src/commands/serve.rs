//! Server commands.

use tracing::info;

use crate::app;
use crate::config::Config;
use crate::error::ServerResult;
use crate::signals::SignalHandler;
use crate::telegram::TelegramClient;

/// Run the webhook server in the foreground until SIGTERM/SIGINT.
pub async fn serve(config: &Config) -> ServerResult<()> {
    let settings = config.resolve()?;

    let signals = SignalHandler::new();
    signals.spawn_listener();

    info!(version = env!("CARGO_PKG_VERSION"), "starting telecal");
    app::serve(settings, signals.shutdown()).await
}

/// Register the webhook at `{public_url}/{bot_token}` and exit.
pub async fn set_webhook(config: &Config) -> ServerResult<()> {
    let public_url = config.public_url()?;
    let telegram = TelegramClient::new(config.telegram_config()?)?;
    telegram.set_webhook(&public_url).await?;
    println!("Webhook set to {}/<bot token>", public_url);
    Ok(())
}
