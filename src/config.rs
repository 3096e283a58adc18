use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(&'static str),
    /// A variable is set but cannot be parsed.
    Invalid { var: &'static str, value: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(var) => write!(f, "missing required environment variable {}", var),
            Self::Invalid { var, value } => {
                write!(f, "invalid value for {}: '{}'", var, value)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_COOLDOWN_SECS: u64 = 3;
const DEFAULT_OWNER: &str = "evileuro";

pub struct Config {
    pub bot_token: String,
    /// Overrides the Telegram Bot API base (e.g. a local Bot API server).
    pub telegram_api_url: Option<reqwest::Url>,
    /// Phone-status lookup endpoint. `None` disables lookups.
    pub status_api_url: Option<String>,
    pub status_api_key: Option<String>,
    pub port: u16,
    pub cooldown: Duration,
    /// Owner handle without the leading `@`.
    pub owner_username: String,
    /// Directory for state files (database, logs).
    pub data_dir: PathBuf,
    /// Chat that receives forwarded log lines.
    pub log_chat_id: Option<i64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "BOT_TOKEN appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        let telegram_api_url = match get("TELEGRAM_API_URL") {
            Some(raw) => Some(
                reqwest::Url::parse(&raw)
                    .map_err(|_| ConfigError::Invalid { var: "TELEGRAM_API_URL", value: raw })?,
            ),
            None => None,
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let cooldown_secs = match get("USER_COOLDOWN_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid { var: "USER_COOLDOWN_SECONDS", value: raw })?,
            None => DEFAULT_COOLDOWN_SECS,
        };

        let owner_username = get("OWNER_USERNAME")
            .map(|s| s.trim_start_matches('@').to_string())
            .unwrap_or_else(|| DEFAULT_OWNER.to_string());
        if owner_username.is_empty() {
            return Err(ConfigError::Validation("OWNER_USERNAME must not be just '@'".into()));
        }

        let log_chat_id = match get("LOG_CHAT_ID") {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| ConfigError::Invalid { var: "LOG_CHAT_ID", value: raw })?,
            ),
            None => None,
        };

        let data_dir = get("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            bot_token,
            telegram_api_url,
            status_api_url: get("WHATSAPP_API_URL"),
            status_api_key: get("WHATSAPP_API_KEY"),
            port,
            cooldown: Duration::from_secs(cooldown_secs),
            owner_username,
            data_dir,
            log_chat_id,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("bot_data.db")
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
