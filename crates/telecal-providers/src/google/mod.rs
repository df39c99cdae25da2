//! Google Calendar implementation.
//!
//! - [`OAuthClient`]: authorization code grant with PKCE against Google's
//!   OAuth endpoints, redirecting to the bot's `/auth/callback` route
//! - [`GoogleCalendarClient`]: `events.insert` on the configured calendar
//!
//! # Example
//!
//! ```ignore
//! use telecal_providers::google::{GoogleCalendarClient, GoogleConfig, OAuthClient, OAuthCredentials};
//!
//! let config = GoogleConfig::new(
//!     OAuthCredentials::from_file("credentials.json")?,
//!     "https://bot.example.com/auth/callback",
//! );
//! config.validate()?;
//!
//! let grant = OAuthClient::new(&config)?;
//! let calendar = GoogleCalendarClient::new(&config)?;
//! ```

mod client;
mod config;
mod oauth;

pub use client::GoogleCalendarClient;
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::OAuthClient;
