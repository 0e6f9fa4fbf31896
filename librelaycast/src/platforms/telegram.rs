//! Telegram destination implementation
//!
//! Minimal Bot API client covering the three calls the relay needs:
//! `sendMessage`, `sendPhoto` and `sendVideo`. Media is passed by URL, so
//! Telegram fetches it from the Mastodon instance directly.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::Destination;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const PARSE_MODE: &str = "HTML";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest caption the Bot API accepts for photos and videos
pub const CAPTION_LIMIT: usize = 1024;

#[derive(Debug, Serialize)]
struct LinkPreviewOptions {
    is_disabled: bool,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    link_preview_options: LinkPreviewOptions,
}

#[derive(Debug, Serialize)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct SendVideo<'a> {
    chat_id: &'a str,
    video: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

/// Telegram bot client
pub struct TelegramBot {
    http: reqwest::Client,
    token: SecretString,
    api_base: String,
}

impl TelegramBot {
    /// Create a client talking to the public Bot API
    pub fn new(token: SecretString) -> Result<Self> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Create a client against a custom Bot API server (self-hosted or test)
    pub fn with_api_base(token: SecretString, api_base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                PlatformError::Network(format!("Failed to create Telegram HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            token,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        Self::with_api_base(config.bot_token.clone(), &config.api_base)
    }

    async fn call<T: Serialize + Sync>(&self, method: &str, body: &T) -> Result<()> {
        let url = format!(
            "{}/bot{}/{}",
            self.api_base,
            self.token.expose_secret(),
            method
        );

        // Strip the URL from transport errors: it contains the bot token
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                PlatformError::Network(format!("Telegram {} request failed: {}", method, e.without_url()))
            })?;

        let status = response.status();
        let parsed = response.json::<ApiResponse>().await.ok();

        match parsed {
            Some(api) if api.ok && status.is_success() => {
                debug!("Telegram {} accepted", method);
                Ok(())
            }
            Some(api) => {
                let code = api.error_code.unwrap_or(status.as_u16());
                let description = api
                    .description
                    .unwrap_or_else(|| "no description".to_string());
                let retry_after = api.parameters.and_then(|p| p.retry_after);
                Err(map_api_error(method, code, &description, retry_after).into())
            }
            None => Err(map_api_error(
                method,
                status.as_u16(),
                "unparseable response body",
                None,
            )
            .into()),
        }
    }
}

#[async_trait]
impl Destination for TelegramBot {
    async fn send_text(&self, channel: &str, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: channel,
            text,
            parse_mode: PARSE_MODE,
            link_preview_options: LinkPreviewOptions { is_disabled: false },
        };
        self.call("sendMessage", &body).await
    }

    async fn send_photo(&self, channel: &str, photo_url: &str, caption: &str) -> Result<()> {
        check_caption_length("sendPhoto", channel, caption);
        let body = SendPhoto {
            chat_id: channel,
            photo: photo_url,
            caption,
            parse_mode: PARSE_MODE,
        };
        self.call("sendPhoto", &body).await
    }

    async fn send_video(&self, channel: &str, video_url: &str, caption: &str) -> Result<()> {
        check_caption_length("sendVideo", channel, caption);
        let body = SendVideo {
            chat_id: channel,
            video: video_url,
            caption,
            parse_mode: PARSE_MODE,
        };
        self.call("sendVideo", &body).await
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

/// Warn when a caption is longer than Telegram allows
///
/// The request is still made; Telegram answers with a 400 that the caller
/// sees as a validation error. Markup counts toward the length here, so a
/// caption slightly over the limit may still be accepted.
fn check_caption_length(method: &str, channel: &str, caption: &str) -> bool {
    let length = caption.chars().count();
    if length > CAPTION_LIMIT {
        warn!(
            "Telegram {} caption for {} is {} characters, over the {} limit; expect a rejection",
            method, channel, length, CAPTION_LIMIT
        );
        return false;
    }
    true
}

/// Map a Bot API failure to PlatformError
///
/// - 401/404 → `Authentication` (bad token; the API answers 404 for unknown bots)
/// - 403 → `Authentication` (bot not an admin of the channel, or kicked)
/// - 400 → `Validation` (bad chat id, malformed HTML, caption too long)
/// - 429 → `RateLimit`
/// - 5xx → `Network`
fn map_api_error(method: &str, code: u16, description: &str, retry_after: Option<u64>) -> PlatformError {
    match code {
        401 | 404 => PlatformError::Authentication(format!(
            "Telegram {} rejected the bot token ({}): {}. \
                Suggestion: Check TELEGRAM_BOT_TOKEN.",
            method, code, description
        )),
        403 => PlatformError::Authentication(format!(
            "Telegram {} forbidden ({}): {}. \
                Suggestion: Make sure the bot is an administrator of the channel.",
            method, code, description
        )),
        400 => PlatformError::Validation(format!(
            "Telegram {} bad request: {}",
            method, description
        )),
        429 => PlatformError::RateLimit(match retry_after {
            Some(secs) => format!("Telegram {} throttled, retry after {}s: {}", method, secs, description),
            None => format!("Telegram {} throttled: {}", method, description),
        }),
        500..=599 => PlatformError::Network(format!(
            "Telegram {} server error ({}): {}",
            method, code, description
        )),
        _ => PlatformError::Posting(format!(
            "Telegram {} failed ({}): {}",
            method, code, description
        )),
    }
}
