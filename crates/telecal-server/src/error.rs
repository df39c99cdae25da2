//! Server error types.

use std::io;
use thiserror::Error;

use crate::extract::ExtractionError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (listener, files).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Calendar provider or authorization error.
    #[error("Provider error: {0}")]
    Provider(#[from] telecal_providers::ProviderError),

    /// Event extraction failed.
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Telegram Bot API call failed.
    #[error("Telegram error: {message}")]
    Telegram { message: String },

    /// Logging could not be initialized.
    #[error("Tracing error: {0}")]
    Tracing(#[from] telecal_core::TracingError),
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a Telegram error.
    pub fn telegram(message: impl Into<String>) -> Self {
        Self::Telegram {
            message: message.into(),
        }
    }
}
