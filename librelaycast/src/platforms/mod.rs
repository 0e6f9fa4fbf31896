//! Platform abstraction and implementations
//!
//! The sync engine talks to the outside world through two traits:
//!
//! - [`Source`]: reads the most recent posts of the tracked account
//! - [`Destination`]: sends text, photos and videos to a channel
//!
//! Production implementations are [`mastodon::MastodonSource`] and
//! [`telegram::TelegramBot`]. The [`mock`] module provides scripted
//! in-memory versions of both for tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::SourcePost;

pub mod mastodon;
pub mod telegram;

// Mock platforms are available for all builds (not just tests) to support integration tests
pub mod mock;

/// Read side of the relay
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch up to `limit` of the account's most recent posts, newest first
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` when the instance cannot be reached or
    /// rejects the request.
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<SourcePost>>;

    /// Lowercase platform name used in log lines (e.g. "mastodon")
    fn name(&self) -> &str;
}

/// Write side of the relay
///
/// Every message is sent in the destination's HTML formatting mode with link
/// previews enabled. `caption` and `text` are already-sanitized HTML.
#[async_trait]
pub trait Destination: Send + Sync {
    async fn send_text(&self, channel: &str, text: &str) -> Result<()>;

    async fn send_photo(&self, channel: &str, photo_url: &str, caption: &str) -> Result<()>;

    async fn send_video(&self, channel: &str, video_url: &str, caption: &str) -> Result<()>;

    /// Lowercase platform name used in log lines (e.g. "telegram")
    fn name(&self) -> &str;
}
