//! Configuration management for Relaycast
//!
//! Settings are resolved once at startup into a [`Config`] that is passed to
//! the engine explicitly. Sources, later ones winning:
//!
//! 1. an optional TOML file (`--config`, `RELAYCAST_CONFIG`, or
//!    `~/.config/relaycast/config.toml` when present)
//! 2. process environment variables (the binary loads `.env` into them first)
//!
//! ```toml
//! [mastodon]
//! user_id = "109000000000000001"
//! instance_url = "https://mastodon.social"
//! access_token = "..."
//!
//! [telegram]
//! bot_token = "123456:ABC..."
//! channel_ids = ["@my_channel", "-1001234567890"]
//!
//! [sync]
//! poll_interval = 300
//! database_path = "~/.local/share/relaycast/synced_posts.db"
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::platforms::mastodon::normalize_instance_url;
use crate::platforms::telegram::DEFAULT_API_BASE;

pub const ENV_CONFIG_PATH: &str = "RELAYCAST_CONFIG";
pub const ENV_MASTODON_USER_ID: &str = "MASTODON_USER_ID";
pub const ENV_MASTODON_INSTANCE_URL: &str = "MASTODON_INSTANCE_URL";
pub const ENV_MASTODON_ACCESS_TOKEN: &str = "MASTODON_ACCESS_TOKEN";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHANNEL_IDS: &str = "TELEGRAM_CHANNEL_IDS";
pub const ENV_TELEGRAM_API_BASE: &str = "TELEGRAM_API_BASE";
pub const ENV_POLLING_INTERVAL: &str = "POLLING_INTERVAL";
pub const ENV_DATABASE_NAME: &str = "DATABASE_NAME";

pub const DEFAULT_INSTANCE_URL: &str = "https://mastodon.social";
pub const DEFAULT_POLL_INTERVAL: u64 = 300;
pub const DEFAULT_DATABASE_FILE: &str = "synced_posts.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub mastodon: MastodonConfig,
    pub telegram: TelegramConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone)]
pub struct MastodonConfig {
    /// Numeric id of the tracked account
    pub user_id: String,
    pub instance_url: String,
    pub access_token: SecretString,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Destination channels, trimmed and non-empty
    pub channel_ids: Vec<String>,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Seconds between ticks in continuous mode
    pub poll_interval: u64,
    pub database_path: String,
}

/// Unresolved settings, as read from the file and the environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    pub mastodon: PartialMastodon,
    pub telegram: PartialTelegram,
    pub sync: PartialSync,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialMastodon {
    pub user_id: Option<String>,
    pub instance_url: Option<String>,
    pub access_token: Option<SecretString>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialTelegram {
    pub bot_token: Option<SecretString>,
    pub channel_ids: Option<Vec<String>>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialSync {
    pub poll_interval: Option<u64>,
    pub database_path: Option<String>,
}

impl Config {
    /// Load configuration from the optional file plus the process environment
    ///
    /// # Errors
    ///
    /// - `ConfigError::ReadError`/`ParseError` for an unreadable or invalid file
    /// - `ConfigError::Missing` naming every required setting that is absent
    /// - `ConfigError::Invalid` for malformed values
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut partial = match resolve_config_path(config_path)? {
            Some(path) => PartialConfig::load_from_path(&path)?,
            None => PartialConfig::default(),
        };
        partial.apply_env(|key| std::env::var(key).ok())?;
        partial.resolve()
    }
}

impl PartialConfig {
    /// Load settings from a TOML file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let partial: PartialConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(partial)
    }

    /// Overlay values from environment-style lookups; set values win
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MASTODON_USER_ID) {
            self.mastodon.user_id = Some(value);
        }
        if let Some(value) = lookup(ENV_MASTODON_INSTANCE_URL) {
            self.mastodon.instance_url = Some(value);
        }
        if let Some(value) = lookup(ENV_MASTODON_ACCESS_TOKEN) {
            self.mastodon.access_token = Some(SecretString::from(value));
        }
        if let Some(value) = lookup(ENV_TELEGRAM_BOT_TOKEN) {
            self.telegram.bot_token = Some(SecretString::from(value));
        }
        if let Some(value) = lookup(ENV_TELEGRAM_CHANNEL_IDS) {
            self.telegram.channel_ids = Some(value.split(',').map(str::to_string).collect());
        }
        if let Some(value) = lookup(ENV_TELEGRAM_API_BASE) {
            self.telegram.api_base = Some(value);
        }
        if let Some(value) = lookup(ENV_POLLING_INTERVAL) {
            let seconds = value.trim().parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_POLLING_INTERVAL, value
                ))
            })?;
            self.sync.poll_interval = Some(seconds);
        }
        if let Some(value) = lookup(ENV_DATABASE_NAME) {
            self.sync.database_path = Some(value);
        }
        Ok(())
    }

    /// Validate and fill defaults
    ///
    /// All missing required settings are collected before failing, so one run
    /// reports everything that needs fixing.
    pub fn resolve(self) -> Result<Config> {
        let mut missing = Vec::new();

        let user_id = non_empty(self.mastodon.user_id);
        if user_id.is_none() {
            missing.push(ENV_MASTODON_USER_ID.to_string());
        }

        let access_token = non_empty_secret(self.mastodon.access_token);
        if access_token.is_none() {
            missing.push(ENV_MASTODON_ACCESS_TOKEN.to_string());
        }

        let bot_token = non_empty_secret(self.telegram.bot_token);
        if bot_token.is_none() {
            missing.push(ENV_TELEGRAM_BOT_TOKEN.to_string());
        }

        let channel_ids: Vec<String> = self
            .telegram
            .channel_ids
            .unwrap_or_default()
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if channel_ids.is_empty() {
            missing.push(ENV_TELEGRAM_CHANNEL_IDS.to_string());
        }

        let (Some(user_id), Some(access_token), Some(bot_token), false) =
            (user_id, access_token, bot_token, channel_ids.is_empty())
        else {
            return Err(ConfigError::Missing(missing).into());
        };

        let poll_interval = self.sync.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be greater than zero",
                ENV_POLLING_INTERVAL
            ))
            .into());
        }

        let instance_url = non_empty(self.mastodon.instance_url)
            .unwrap_or_else(|| DEFAULT_INSTANCE_URL.to_string());

        Ok(Config {
            mastodon: MastodonConfig {
                user_id,
                instance_url: normalize_instance_url(&instance_url),
                access_token,
            },
            telegram: TelegramConfig {
                bot_token,
                channel_ids,
                api_base: non_empty(self.telegram.api_base)
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            },
            sync: SyncConfig {
                poll_interval,
                database_path: non_empty(self.sync.database_path)
                    .unwrap_or_else(default_database_path),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty_secret(value: Option<SecretString>) -> Option<SecretString> {
    value.filter(|v| !v.expose_secret().trim().is_empty())
}

/// Resolve the configuration file to read, if any
///
/// An explicit path must exist. Otherwise `RELAYCAST_CONFIG` is used, then the
/// XDG default location if a file is there.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(Some(expand(path.to_string_lossy().as_ref())));
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Ok(Some(expand(&path)));
        }
    }

    let default = dirs::config_dir().map(|dir| dir.join("relaycast").join("config.toml"));
    Ok(default.filter(|path| path.exists()))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// `synced_posts.db` next to the running executable
pub fn default_database_path() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_DATABASE_FILE)))
        .map(|path| path.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_DATABASE_FILE.to_string())
}
