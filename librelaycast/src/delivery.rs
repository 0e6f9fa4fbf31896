//! Multi-channel delivery
//!
//! Sends one formatted message to every configured channel. Channels are
//! attempted concurrently and independently: a failure on one channel is
//! recorded in its [`ChannelResult`] and never stops the others. Nothing is
//! retried here; the caller decides what a partial failure means.

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::Result;
use crate::platforms::Destination;
use crate::types::{ChannelResult, MediaAttachment, MediaKind};

/// Deliver `text` (and `media`, if any) to every channel
///
/// With media, one send per attachment: images go out as photos and videos
/// as videos, both captioned with `text`; any other kind is sent as a plain
/// text message carrying `text`. Without media a single text message is sent.
///
/// Returns one result per channel, in channel order. Never fails.
pub async fn deliver(
    destination: &dyn Destination,
    channels: &[String],
    text: &str,
    media: &[MediaAttachment],
) -> Vec<ChannelResult> {
    let futures: Vec<_> = channels
        .iter()
        .map(|channel| async move {
            let mut sent = 0;
            match deliver_to_channel(destination, channel, text, media, &mut sent).await {
                Ok(()) => {
                    info!("Sent message to channel {}", channel);
                    ChannelResult::succeeded(channel, sent)
                }
                Err(e) => {
                    warn!("Failed to send message to channel {}: {}", channel, e);
                    ChannelResult::failed(channel, sent, e.to_string())
                }
            }
        })
        .collect();

    join_all(futures).await
}

/// Sends stop at the first failure; `sent` counts the ones accepted before it
async fn deliver_to_channel(
    destination: &dyn Destination,
    channel: &str,
    text: &str,
    media: &[MediaAttachment],
    sent: &mut usize,
) -> Result<()> {
    if media.is_empty() {
        destination.send_text(channel, text).await?;
        *sent += 1;
        return Ok(());
    }

    for attachment in media {
        match attachment.kind {
            MediaKind::Image => destination.send_photo(channel, &attachment.url, text).await?,
            MediaKind::Video => destination.send_video(channel, &attachment.url, text).await?,
            MediaKind::Other => destination.send_text(channel, text).await?,
        }
        *sent += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::{MockDestination, SentKind};

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_text_only_to_every_channel() {
        let destination = MockDestination::success();

        let results = deliver(&destination, &channels(&["@a", "@b"]), "hello", &[]).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success && r.messages_sent == 1));
        assert_eq!(destination.sent_to("@a")[0].kind, SentKind::Text);
        assert_eq!(destination.sent_to("@b")[0].text, "hello");
    }

    #[tokio::test]
    async fn test_one_failing_channel_does_not_block_others() {
        let destination = MockDestination::failing_for(&["@a"]);

        let results = deliver(&destination, &channels(&["@a", "@b"]), "hello", &[]).await;

        let mut attempted = destination.attempts();
        attempted.sort();
        assert_eq!(attempted, ["@a", "@b"]);

        assert_eq!(results.iter().filter(|r| r.success).count(), 1);
        assert_eq!(results.iter().filter(|r| !r.success).count(), 1);

        let failed = results.iter().find(|r| r.channel == "@a").unwrap();
        assert!(!failed.success);
        assert!(failed.error.as_deref().unwrap().contains("Mock send to @a failed"));

        let ok = results.iter().find(|r| r.channel == "@b").unwrap();
        assert!(ok.success);
        assert!(ok.error.is_none());
    }

    #[tokio::test]
    async fn test_media_kinds_select_send_operation() {
        let destination = MockDestination::success();
        let media = vec![
            MediaAttachment::new(MediaKind::Image, "https://files.example/1.png"),
            MediaAttachment::new(MediaKind::Video, "https://files.example/2.mp4"),
            MediaAttachment::new(MediaKind::Other, "https://files.example/3.gif"),
        ];

        let results = deliver(&destination, &channels(&["@a"]), "caption", &media).await;

        assert_eq!(results[0].messages_sent, 3);
        let sent = destination.sent_to("@a");
        assert_eq!(
            sent.iter().map(|m| m.kind.clone()).collect::<Vec<_>>(),
            vec![
                SentKind::Photo("https://files.example/1.png".to_string()),
                SentKind::Video("https://files.example/2.mp4".to_string()),
                SentKind::Text,
            ]
        );
        assert!(sent.iter().all(|m| m.text == "caption"));
    }

    #[tokio::test]
    async fn test_no_channels_no_sends() {
        let destination = MockDestination::success();

        let results = deliver(&destination, &[], "hello", &[]).await;

        assert!(results.is_empty());
        assert!(destination.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_channel_order() {
        let destination = MockDestination::failing_for(&["@b"]);

        let results = deliver(&destination, &channels(&["@c", "@b", "@a"]), "x", &[]).await;

        let order: Vec<_> = results.iter().map(|r| r.channel.as_str()).collect();
        assert_eq!(order, ["@c", "@b", "@a"]);
    }
}
