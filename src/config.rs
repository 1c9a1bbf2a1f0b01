use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::types::UserId;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Deserialize)]
struct ConfigFile {
    /// Falls back to the BOT_TOKEN environment variable when empty.
    #[serde(default)]
    telegram_bot_token: String,
    /// Falls back to the GEMINI_API_KEY environment variable when empty.
    #[serde(default)]
    gemini_api_key: String,
    /// Users allowed to broadcast and read stats.
    #[serde(default)]
    admin_ids: Vec<u64>,
    /// Directory for the database and logs. Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default = "default_text_model")]
    text_model: String,
    #[serde(default = "default_vision_model")]
    vision_model: String,
    #[serde(default = "default_api_base")]
    api_base: String,
    #[serde(default = "default_typing_interval_secs")]
    typing_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    /// How many stored turns are sent along with a new prompt.
    #[serde(default = "default_history_turns")]
    history_turns: usize,
    /// Override for the MarkdownV2 reserved character set.
    reserved_chars: Option<String>,
}

fn default_text_model() -> String {
    "gemini-pro".to_string()
}

fn default_vision_model() -> String {
    "gemini-pro-vision".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_typing_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_history_turns() -> usize {
    20
}

pub struct Config {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub admin_ids: HashSet<UserId>,
    /// Directory for state files (database, logs).
    pub data_dir: PathBuf,
    pub text_model: String,
    pub vision_model: String,
    pub api_base: String,
    pub typing_interval: Duration,
    pub request_timeout: Duration,
    pub history_turns: usize,
    pub reserved_chars: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let telegram_bot_token = non_empty_or_env(file.telegram_bot_token, "BOT_TOKEN");
        let gemini_api_key = non_empty_or_env(file.gemini_api_key, "GEMINI_API_KEY");

        if telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required (or set BOT_TOKEN)".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if gemini_api_key.is_empty() {
            return Err(ConfigError::Validation("gemini_api_key is required (or set GEMINI_API_KEY)".into()));
        }
        if file.typing_interval_secs == 0 {
            return Err(ConfigError::Validation("typing_interval_secs must be greater than 0".into()));
        }
        if file.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be greater than 0".into()));
        }
        if let Some(ref reserved) = file.reserved_chars {
            validate_reserved_chars(reserved)?;
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token,
            gemini_api_key,
            admin_ids: file.admin_ids.into_iter().map(UserId).collect(),
            data_dir,
            text_model: file.text_model,
            vision_model: file.vision_model,
            api_base: file.api_base.trim_end_matches('/').to_string(),
            typing_interval: Duration::from_secs(file.typing_interval_secs),
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            history_turns: file.history_turns,
            reserved_chars: file.reserved_chars,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("mali.db")
    }
}

fn non_empty_or_env(value: String, var: &str) -> String {
    if value.is_empty() {
        std::env::var(var).unwrap_or_default()
    } else {
        value
    }
}

/// Reserved chars must be ASCII punctuation; `*` is stripped, never escaped.
fn validate_reserved_chars(reserved: &str) -> Result<(), ConfigError> {
    let punct = Regex::new(r"^[[:punct:]]+$").map_err(|e| ConfigError::Validation(e.to_string()))?;
    if !punct.is_match(reserved) {
        return Err(ConfigError::Validation(
            "reserved_chars must be a non-empty string of ASCII punctuation".into(),
        ));
    }
    if reserved.contains('*') {
        return Err(ConfigError::Validation(
            "reserved_chars must not contain '*' (asterisks are always stripped)".into(),
        ));
    }
    Ok(())
}
