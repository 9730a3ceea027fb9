//! Configuration module for Harley bot.
//!
//! Loads configuration from environment variables.

use std::env;

use serde::Deserialize;
use thiserror::Error;

/// Bot running mode
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Where chat data is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb { uri: String, database: String },
    Memory,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Bot username (without @).
    /// Optional - will be fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Owner user IDs (comma-separated)
    /// These users pass every admin check in every chat.
    pub owner_ids: Vec<u64>,

    /// The only chat the bot serves, if set.
    pub allowed_group_id: Option<i64>,

    /// Reply language.
    pub language: String,

    pub storage: StorageBackend,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let bot_mode = match get("BOT_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("polling") => BotMode::Polling,
            Some("webhook") => BotMode::Webhook,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "BOT_MODE",
                    value: other.to_string(),
                });
            }
        };

        let webhook_url = get("WEBHOOK_URL");
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(ConfigError::Missing("WEBHOOK_URL"));
        }

        let webhook_port = match get("WEBHOOK_PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::Invalid {
                name: "WEBHOOK_PORT",
                value: port,
            })?,
            None => 8443,
        };

        // Parse owner IDs
        let owner_ids = get("OWNER_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse::<u64>().ok())
            .collect();

        let allowed_group_id = match get("ALLOWED_GROUP_ID") {
            Some(id) => Some(id.parse().map_err(|_| ConfigError::Invalid {
                name: "ALLOWED_GROUP_ID",
                value: id,
            })?),
            None => None,
        };

        // Parse bot username (strip @ if present)
        let bot_username = get("BOT_USERNAME")
            .map(|s| s.trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty());

        let storage = match get("STORAGE_BACKEND").map(|b| b.to_lowercase()).as_deref() {
            None | Some("mongodb") | Some("mongo") => StorageBackend::MongoDb {
                uri: get("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?,
                database: get("MONGODB_DATABASE").unwrap_or_else(|| "harley".to_string()),
            },
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            bot_token,
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret: get("WEBHOOK_SECRET"),
            bot_username,
            owner_ids,
            allowed_group_id,
            language: get("BOT_LANGUAGE")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| "tr".to_string()),
            storage,
        })
    }
}
