//! Server configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/telecal/config.toml` by default. Every section is optional;
//! the defaults read secrets from the environment so a deployment can run
//! without any file.
//!
//! Secret values support references:
//! - `pass::path/in/store`: resolved via `pass show`
//! - `env::VAR_NAME`: resolved from the environment
//! - plain text: used as-is

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::Level;

use telecal_core::{DEFAULT_SUMMARY, EventClock, TracingConfig, TracingOutputFormat};
use telecal_providers::AuthorizationSettings;
use telecal_providers::google::{GoogleConfig, OAuthCredentials};

use crate::error::{ServerError, ServerResult};
use crate::extract::{self, GeminiConfig};
use crate::secret;
use crate::telegram::{self, TelegramConfig};

/// Shown instead of inline secrets in `config dump`.
const REDACTED: &str = "<redacted>";

// ---------------------------------------------------------------------------
// Config (config.toml)
// ---------------------------------------------------------------------------

/// Configuration as read from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub telegram: TelegramSettings,
    pub gemini: GeminiSettings,
    pub google: GoogleSettings,
    pub event: EventSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind.
    pub bind: IpAddr,

    /// Port to listen on. Falls back to `$PORT`, then 8000.
    pub port: Option<u16>,

    /// Public base URL of this server, used for the webhook and the OAuth
    /// redirect (supports `pass::` and `env::` prefixes).
    pub public_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: None,
            public_url: "env::CLOUD_RUN_URL".to_string(),
        }
    }
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Bot token (supports `pass::` and `env::` prefixes).
    pub bot_token: String,

    /// The chat served by the bot (supports `pass::` and `env::` prefixes).
    pub chat_id: String,

    /// Bot API root.
    pub api_base: String,

    /// Register the webhook when the server starts.
    pub register_webhook: bool,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: "env::TELEGRAM_BOT_TOKEN".to_string(),
            chat_id: "env::TELEGRAM_CHAT_ID".to_string(),
            api_base: telegram::DEFAULT_API_BASE.to_string(),
            register_webhook: true,
            timeout_secs: 30,
        }
    }
}

/// Gemini extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// API key (supports `pass::` and `env::` prefixes).
    pub api_key: String,

    pub model: String,

    pub base_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: "env::GEMINI_API_KEY".to_string(),
            model: extract::DEFAULT_MODEL.to_string(),
            base_url: extract::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Google OAuth and Calendar settings.
///
/// Credentials come either inline (`client_id`, `client_secret`, both
/// supporting secret references) or from a Cloud Console JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Cloud Console client JSON, used when the inline fields are absent.
    pub credentials_file: PathBuf,

    pub scopes: Vec<String>,

    pub calendar_id: String,

    /// Credential file. Defaults to the data directory.
    pub token_path: Option<PathBuf>,

    /// Authorization-pending marker. Defaults to the data directory.
    pub flag_path: Option<PathBuf>,

    /// How often a waiting request re-checks the pending marker.
    pub poll_interval_secs: u64,

    /// Give up waiting for authorization after this many seconds.
    pub authorization_timeout_secs: Option<u64>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            credentials_file: PathBuf::from("credentials.json"),
            scopes: vec![GoogleConfig::DEFAULT_SCOPE.to_string()],
            calendar_id: "primary".to_string(),
            token_path: None,
            flag_path: None,
            poll_interval_secs: 5,
            authorization_timeout_secs: None,
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Defaults of created events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// IANA zone of event times.
    pub timezone: String,

    /// The invited address (supports `pass::` and `env::` prefixes).
    pub attendee: String,

    /// Title used when the message names none.
    pub summary: String,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            timezone: "Asia/Shanghai".to_string(),
            attendee: "env::MY_GMAIL".to_string(),
            summary: DEFAULT_SUMMARY.to_string(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `pretty`, `compact` or `json`.
    pub format: String,

    /// Default level when `RUST_LOG` is not set.
    pub level: String,

    /// Also write a timestamped log file into this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl LoggingSettings {
    /// Builds the tracing setup. `debug` forces debug level with source
    /// locations. `started` names the log file.
    pub fn tracing_config(
        &self,
        debug: bool,
        started: DateTime<Local>,
    ) -> ServerResult<TracingConfig> {
        let format: TracingOutputFormat = self.format.parse().map_err(ServerError::config)?;
        let level: Level = self
            .level
            .parse()
            .map_err(|_| ServerError::config(format!("unknown log level: {}", self.level)))?;

        let mut config = if debug {
            TracingConfig::cli_debug()
        } else {
            TracingConfig::server().with_level(level)
        }
        .with_format(format);

        if let Some(ref dir) = self.directory {
            let name = format!("{}.log", started.format("%Y-%m-%d_%H-%M-%S"));
            config = config.with_log_file(dir.join(name));
        }
        Ok(config)
    }
}

impl Config {
    /// Loads configuration from the default path, or defaults if the file
    /// does not exist.
    pub fn load() -> ServerResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ServerError::config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("telecal")
            .join("config.toml")
    }

    /// Returns a copy with inline secrets masked. References are kept since
    /// they reveal nothing.
    pub fn redacted(&self) -> Self {
        fn mask(value: &str) -> String {
            if value.is_empty() || secret::is_reference(value) {
                value.to_string()
            } else {
                REDACTED.to_string()
            }
        }

        let mut config = self.clone();
        config.telegram.bot_token = mask(&config.telegram.bot_token);
        config.gemini.api_key = mask(&config.gemini.api_key);
        config.google.client_secret = config.google.client_secret.as_deref().map(mask);
        config
    }

    /// Resolves secrets and validates everything needed to serve.
    pub fn resolve(&self) -> ServerResult<Settings> {
        let public_url = self.public_url()?;

        Ok(Settings {
            listen: SocketAddr::new(self.server.bind, self.port()?),
            telegram: self.telegram_config()?,
            register_webhook: self.telegram.register_webhook,
            gemini: self.gemini_config()?,
            google: self.google_config(&public_url)?,
            authorization: self.authorization_settings(),
            clock: self.clock()?,
            attendee: required("event.attendee", &self.event.attendee)?,
            summary: self.event.summary.clone(),
            public_url,
        })
    }

    /// Resolves only what the Telegram client needs.
    pub fn telegram_config(&self) -> ServerResult<TelegramConfig> {
        let bot_token = required("telegram.bot_token", &self.telegram.bot_token)?;
        let raw_chat = required("telegram.chat_id", &self.telegram.chat_id)?;
        let chat_id = raw_chat.trim().parse::<i64>().map_err(|_| {
            ServerError::config(format!("telegram.chat_id {:?} is not a chat id", raw_chat))
        })?;

        Ok(TelegramConfig::new(bot_token, chat_id)
            .with_api_base(&self.telegram.api_base)
            .with_timeout(Duration::from_secs(self.telegram.timeout_secs)))
    }

    /// Public base URL without trailing slash.
    pub fn public_url(&self) -> ServerResult<String> {
        let public_url = required("server.public_url", &self.server.public_url)?;
        url::Url::parse(&public_url).map_err(|e| {
            ServerError::config(format!("server.public_url {:?}: {}", public_url, e))
        })?;
        Ok(public_url.trim_end_matches('/').to_string())
    }

    /// Credential file in effect.
    pub fn token_path(&self) -> PathBuf {
        self.google
            .token_path
            .clone()
            .unwrap_or_else(GoogleConfig::default_token_path)
    }

    /// Authorization-pending marker in effect.
    pub fn flag_path(&self) -> PathBuf {
        self.google
            .flag_path
            .clone()
            .unwrap_or_else(GoogleConfig::default_flag_path)
    }

    fn gemini_config(&self) -> ServerResult<GeminiConfig> {
        let api_key = required("gemini.api_key", &self.gemini.api_key)?;
        Ok(GeminiConfig::new(api_key)
            .with_model(&self.gemini.model)
            .with_base_url(&self.gemini.base_url)
            .with_timeout(Duration::from_secs(self.gemini.timeout_secs)))
    }

    /// Builds the provider configuration with the OAuth redirect under
    /// `public_url`.
    pub fn google_config(&self, public_url: &str) -> ServerResult<GoogleConfig> {
        let google = &self.google;
        let credentials = self.oauth_credentials()?;

        let config = GoogleConfig::new(credentials, format!("{}/auth/callback", public_url))
            .with_scopes(google.scopes.clone())
            .with_calendar_id(&google.calendar_id)
            .with_timeout(Duration::from_secs(google.timeout_secs))
            .with_token_path(self.token_path())
            .with_flag_path(self.flag_path());

        config.validate().map_err(ServerError::config)?;
        Ok(config)
    }

    fn oauth_credentials(&self) -> ServerResult<OAuthCredentials> {
        let google = &self.google;
        match (google.client_id.as_deref(), google.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok(OAuthCredentials::new(
                required("google.client_id", id)?,
                required("google.client_secret", secret)?,
            )),
            (Some(_), None) | (None, Some(_)) => Err(ServerError::config(
                "google.client_id and google.client_secret must be set together",
            )),
            (None, None) => OAuthCredentials::from_file(&google.credentials_file).map_err(|e| {
                ServerError::config(format!(
                    "Google credentials not found ({}: {}). Add to {}:\n  \
                     [google]\n  \
                     client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                     client_secret = \"YOUR_SECRET\"",
                    google.credentials_file.display(),
                    e,
                    Self::default_path().display()
                ))
            }),
        }
    }

    fn authorization_settings(&self) -> AuthorizationSettings {
        AuthorizationSettings {
            poll_interval: Duration::from_secs(self.google.poll_interval_secs.max(1)),
            timeout: self
                .google
                .authorization_timeout_secs
                .map(Duration::from_secs),
        }
    }

    fn clock(&self) -> ServerResult<EventClock> {
        EventClock::from_name(&self.event.timezone).ok_or_else(|| {
            ServerError::config(format!("event.timezone {:?} is unknown", self.event.timezone))
        })
    }

    fn port(&self) -> ServerResult<u16> {
        if let Some(port) = self.server.port {
            return Ok(port);
        }
        match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ServerError::config(format!("PORT {:?} is not a port number", raw))),
            Err(_) => Ok(8000),
        }
    }
}

fn required(name: &str, value: &str) -> ServerResult<String> {
    secret::resolve_required(name, value).map_err(ServerError::config)
}

// ---------------------------------------------------------------------------
// Settings (resolved)
// ---------------------------------------------------------------------------

/// Fully resolved settings the server runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: SocketAddr,
    pub public_url: String,
    pub telegram: TelegramConfig,
    pub register_webhook: bool,
    pub gemini: GeminiConfig,
    pub google: GoogleConfig,
    pub authorization: AuthorizationSettings,
    pub clock: EventClock,
    pub attendee: String,
    pub summary: String,
}
