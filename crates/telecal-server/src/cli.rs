//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// telecal - Telegram messages to Google Calendar events
#[derive(Debug, Parser)]
#[command(name = "telecal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "TELECAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the webhook server (default)
    Serve,

    /// Register the Telegram webhook and exit
    SetWebhook,

    /// Credential commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Credential actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Show the stored credential and pending authorization
    Status,

    /// Delete the stored credential and any pending authorization
    Reset,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration with secrets redacted
    Dump,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_serves() {
        let cli = Cli::try_parse_from(["telecal"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["telecal", "auth", "reset", "--debug"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Auth {
                action: AuthAction::Reset
            })
        ));
        assert!(cli.debug);

        let cli =
            Cli::try_parse_from(["telecal", "--config", "/etc/telecal.toml", "set-webhook"]).unwrap();
        assert!(matches!(cli.command, Some(Command::SetWebhook)));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/telecal.toml")));

        let cli = Cli::try_parse_from(["telecal", "config", "dump"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Dump
            })
        ));
    }

    #[test]
    fn unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["telecal", "sync"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
