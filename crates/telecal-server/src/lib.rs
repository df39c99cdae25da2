//! Webhook server: Telegram in, Gemini extraction, Google Calendar out.
//!
//! This crate provides the `telecal` binary that:
//! - Receives Telegram updates on `POST /{bot_token}`
//! - Extracts event fields from the message text with Gemini
//! - Merges them into the default event and inserts it into Google Calendar
//! - Hands off to an interactive OAuth flow (`/auth/start`,
//!   `/auth/callback`) when no usable credential is stored
//!
//! # Example
//!
//! ```rust,no_run
//! use telecal_server::{Config, SignalHandler, app};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Config::load()?.resolve()?;
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     app::serve(settings, signals.shutdown()).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod handler;
pub mod routes;
pub mod secret;
pub mod signals;
pub mod telegram;

pub use app::AppContext;
pub use config::{Config, Settings};
pub use error::{ServerError, ServerResult};
pub use extract::{EventExtractor, ExtractionError, GeminiConfig, GeminiExtractor};
pub use handler::{DropReason, HandleOutcome, RequestHandler};
pub use signals::{ShutdownSignal, SignalHandler};
pub use telegram::{TelegramClient, TelegramConfig, Update};
