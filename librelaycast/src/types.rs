//! Core types for Relaycast

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post fetched from the source account
///
/// Only `id` and `created_at` outlive the tick that fetched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePost {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Body as an HTML fragment
    pub content: String,
    pub author_display_name: String,
    pub url: String,
    pub media: Vec<MediaAttachment>,
}

/// Kind of a media attachment, as far as delivery cares
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub url: String,
}

impl MediaAttachment {
    pub fn new(kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

/// Outcome of delivering one message to one channel
#[derive(Debug, Clone)]
pub struct ChannelResult {
    /// Destination channel identifier (e.g. "@news" or "-1001234567890")
    pub channel: String,
    /// Whether every send for this channel succeeded
    pub success: bool,
    /// Number of messages accepted by the destination before finishing or failing
    pub messages_sent: usize,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl ChannelResult {
    pub fn succeeded(channel: &str, messages_sent: usize) -> Self {
        Self {
            channel: channel.to_string(),
            success: true,
            messages_sent,
            error: None,
        }
    }

    pub fn failed(channel: &str, messages_sent: usize, error: String) -> Self {
        Self {
            channel: channel.to_string(),
            success: false,
            messages_sent,
            error: Some(error),
        }
    }
}
