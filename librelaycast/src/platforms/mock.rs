//! Mock platform implementations for testing
//!
//! [`MockSource`] serves a scripted page of posts and [`MockDestination`]
//! records every send, optionally failing for selected channels. Both keep
//! their state behind `Arc<Mutex<..>>` so tests can hold a clone and inspect
//! it after handing the mock to the engine.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::{Destination, Source};
use crate::types::SourcePost;

/// Scripted source of posts
#[derive(Clone, Default)]
pub struct MockSource {
    /// Page returned by `fetch_recent`, newest first like the real API
    posts: Arc<Mutex<Vec<SourcePost>>>,

    /// Error returned instead of the page
    fetch_error: Arc<Mutex<Option<String>>>,

    /// Number of times `fetch_recent` has been called
    fetch_call_count: Arc<Mutex<usize>>,
}

impl MockSource {
    /// Source returning `posts` as given (callers pass them newest first)
    pub fn with_posts(posts: Vec<SourcePost>) -> Self {
        let source = Self::default();
        source.set_posts(posts);
        source
    }

    /// Source whose fetch always fails with a network error
    pub fn failing(error: &str) -> Self {
        let source = Self::default();
        *source.fetch_error.lock().unwrap() = Some(error.to_string());
        source
    }

    pub fn set_posts(&self, posts: Vec<SourcePost>) {
        *self.posts.lock().unwrap() = posts;
    }

    pub fn fetch_call_count(&self) -> usize {
        *self.fetch_call_count.lock().unwrap()
    }
}

#[async_trait]
impl Source for MockSource {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<SourcePost>> {
        *self.fetch_call_count.lock().unwrap() += 1;

        if let Some(error) = self.fetch_error.lock().unwrap().clone() {
            return Err(PlatformError::Network(error).into());
        }

        let posts = self.posts.lock().unwrap();
        Ok(posts.iter().take(limit as usize).cloned().collect())
    }

    fn name(&self) -> &str {
        "mock-source"
    }
}

/// Kind of send recorded by [`MockDestination`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentKind {
    Text,
    Photo(String),
    Video(String),
}

/// One accepted send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: String,
    pub kind: SentKind,
    /// Message text, or the caption for media
    pub text: String,
}

/// Recording destination
#[derive(Clone, Default)]
pub struct MockDestination {
    /// Channels whose sends fail
    failing_channels: Arc<Mutex<HashSet<String>>>,

    /// Every send attempt, successful or not, in call order
    attempts: Arc<Mutex<Vec<String>>>,

    /// Accepted sends
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl MockDestination {
    /// Destination that accepts everything
    pub fn success() -> Self {
        Self::default()
    }

    /// Destination that rejects every send to the given channels
    pub fn failing_for(channels: &[&str]) -> Self {
        let destination = Self::default();
        destination
            .failing_channels
            .lock()
            .unwrap()
            .extend(channels.iter().map(|c| c.to_string()));
        destination
    }

    /// Channels in the order sends were attempted
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, channel: &str) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.channel == channel)
            .collect()
    }

    fn record(&self, channel: &str, kind: SentKind, text: &str) -> Result<()> {
        self.attempts.lock().unwrap().push(channel.to_string());

        if self.failing_channels.lock().unwrap().contains(channel) {
            return Err(PlatformError::Posting(format!("Mock send to {} failed", channel)).into());
        }

        self.sent.lock().unwrap().push(SentMessage {
            channel: channel.to_string(),
            kind,
            text: text.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl Destination for MockDestination {
    async fn send_text(&self, channel: &str, text: &str) -> Result<()> {
        self.record(channel, SentKind::Text, text)
    }

    async fn send_photo(&self, channel: &str, photo_url: &str, caption: &str) -> Result<()> {
        self.record(channel, SentKind::Photo(photo_url.to_string()), caption)
    }

    async fn send_video(&self, channel: &str, video_url: &str, caption: &str) -> Result<()> {
        self.record(channel, SentKind::Video(video_url.to_string()), caption)
    }

    fn name(&self) -> &str {
        "mock-destination"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(id: &str) -> SourcePost {
        SourcePost {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            content: String::new(),
            author_display_name: "mock".to_string(),
            url: format!("https://example.social/@mock/{}", id),
            media: vec![],
        }
    }

    #[tokio::test]
    async fn test_mock_source_respects_limit() {
        let source = MockSource::with_posts(vec![post("3"), post("2"), post("1")]);

        let page = source.fetch_recent(2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["3", "2"]);
        assert_eq!(source.fetch_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_source_failure() {
        let source = MockSource::failing("instance unreachable");

        let err = source.fetch_recent(20).await.unwrap_err();
        assert!(err.to_string().contains("instance unreachable"));
    }

    #[tokio::test]
    async fn test_mock_destination_records_and_fails() {
        let destination = MockDestination::failing_for(&["@bad"]);

        destination.send_text("@good", "hello").await.unwrap();
        assert!(destination.send_text("@bad", "hello").await.is_err());

        assert_eq!(destination.attempts(), ["@good", "@bad"]);
        assert_eq!(destination.sent().len(), 1);
        assert_eq!(destination.sent_to("@good")[0].kind, SentKind::Text);
    }
}
