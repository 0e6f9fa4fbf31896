//! Mastodon source implementation
//!
//! Reads an account's timeline through the megalodon library, which also
//! covers Pleroma, Akkoma and GoToSocial instances exposing the Mastodon API.

use async_trait::async_trait;
use megalodon::entities::attachment::AttachmentType;
use megalodon::entities::Status;
use megalodon::megalodon::GetAccountStatusesInputOptions;
use megalodon::{Megalodon, SNS};
use secrecy::{ExposeSecret, SecretString};

use crate::config::MastodonConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::Source;
use crate::types::{MediaAttachment, MediaKind, SourcePost};

/// Mastodon account timeline reader
pub struct MastodonSource {
    /// The megalodon client for API interactions
    client: Box<dyn Megalodon + Send + Sync>,

    /// Numeric id of the tracked account
    account_id: String,

    /// The instance URL (e.g., "https://mastodon.social")
    instance_url: String,
}

impl MastodonSource {
    /// Create a new Mastodon source
    ///
    /// # Arguments
    ///
    /// * `instance_url` - Base URL of the instance; `https://` is added when missing
    /// * `access_token` - OAuth access token
    /// * `account_id` - Numeric id of the account whose posts are relayed
    ///
    /// No request is made until [`Source::fetch_recent`] is called.
    pub fn new(instance_url: &str, access_token: &SecretString, account_id: &str) -> Result<Self> {
        let instance_url = normalize_instance_url(instance_url);

        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token.expose_secret().to_string()),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            account_id: account_id.to_string(),
            instance_url,
        })
    }

    pub fn from_config(config: &MastodonConfig) -> Result<Self> {
        Self::new(&config.instance_url, &config.access_token, &config.user_id)
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }
}

#[async_trait]
impl Source for MastodonSource {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<SourcePost>> {
        let options = GetAccountStatusesInputOptions {
            limit: Some(limit),
            ..Default::default()
        };

        let response = self
            .client
            .get_account_statuses(self.account_id.clone(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "fetch account statuses"))?;

        Ok(response.json.into_iter().map(post_from_status).collect())
    }

    fn name(&self) -> &str {
        "mastodon"
    }
}

/// Ensure the instance URL carries a scheme
pub fn normalize_instance_url(instance: &str) -> String {
    let instance = instance.trim().trim_end_matches('/');
    if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.to_string()
    } else {
        format!("https://{}", instance)
    }
}

/// Convert a megalodon status into the relay's post type
fn post_from_status(status: Status) -> SourcePost {
    let author_display_name = if status.account.display_name.trim().is_empty() {
        status.account.acct.clone()
    } else {
        status.account.display_name.clone()
    };

    SourcePost {
        url: status.url.clone().unwrap_or_else(|| status.uri.clone()),
        id: status.id,
        created_at: status.created_at,
        content: status.content,
        author_display_name,
        media: status
            .media_attachments
            .into_iter()
            .map(|attachment| MediaAttachment::new(media_kind(&attachment.r#type), attachment.url))
            .collect(),
    }
}

/// Animated GIFs and audio are not sent as media; they fall back to text
fn media_kind(attachment_type: &AttachmentType) -> MediaKind {
    match attachment_type {
        AttachmentType::Image => MediaKind::Image,
        AttachmentType::Video => MediaKind::Video,
        _ => MediaKind::Other,
    }
}

/// Map megalodon errors to PlatformError
///
/// # Error Mapping
///
/// - HTTP 401/403 → `PlatformError::Authentication` (token issues)
/// - HTTP 404 → `PlatformError::Validation` (unknown account id)
/// - HTTP 429 → `PlatformError::RateLimit`
/// - HTTP 5xx and transport failures → `PlatformError::Network`
/// - Parse errors → `PlatformError::Posting` (unexpected response shape)
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    map_error_message(&error.to_string(), context)
}

fn map_error_message(error_str: &str, context: &str) -> PlatformError {
    let error_lower = error_str.to_lowercase();

    match extract_http_status(error_str) {
        Some(401) | Some(403) => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
                    Suggestion: Verify MASTODON_ACCESS_TOKEN is valid and has the read scope.",
            context, error_str
        )),
        Some(404) => PlatformError::Validation(format!(
            "Mastodon account not found ({}): {}. \
                    Suggestion: MASTODON_USER_ID must be the numeric account id, not the handle.",
            context, error_str
        )),
        Some(429) => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}",
            context, error_str
        )),
        Some(500..=599) => PlatformError::Network(format!(
            "Mastodon server error ({}): {}",
            context, error_str
        )),
        Some(_) => {
            PlatformError::Network(format!("Mastodon HTTP error ({}): {}", context, error_str))
        }
        None => {
            if error_lower.contains("unauthorized")
                || error_lower.contains("forbidden")
                || error_lower.contains("token")
            {
                PlatformError::Authentication(format!(
                    "Mastodon authentication failed ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("parse")
                || error_lower.contains("json")
                || error_lower.contains("deserialize")
            {
                PlatformError::Posting(format!(
                    "Mastodon response parse error ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("rate limit")
                || error_lower.contains("too many requests")
            {
                PlatformError::RateLimit(format!(
                    "Mastodon rate limit exceeded ({}): {}",
                    context, error_str
                ))
            } else {
                PlatformError::Network(format!(
                    "Mastodon error ({}): {}. \
                        Suggestion: Check your network connection and MASTODON_INSTANCE_URL.",
                    context, error_str
                ))
            }
        }
    }
}

/// Extract an HTTP status code from an error message
///
/// Looks for "HTTP 401", "status 403", "code: 429" or a standalone three-digit
/// code followed by `:` or a space.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code) = after_prefix
                .get(0..3)
                .and_then(|s| s.parse::<u16>().ok())
                .filter(|code| (100..=599).contains(code))
            {
                return Some(code);
            }
        }
    }

    let bytes = error_str.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        let is_code = window[..3].iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ')
            && (i == 0 || !bytes[i - 1].is_ascii_digit());
        if !is_code {
            continue;
        }
        if let Some(code) = std::str::from_utf8(&window[..3])
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|code| (100..=599).contains(code))
        {
            return Some(code);
        }
    }

    None
}
