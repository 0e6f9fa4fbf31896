//! Poll loop
//!
//! One tick fetches the latest page of posts, puts it in chronological order
//! and relays every post that is neither covered by the time cursor nor
//! already in the ledger:
//!
//! ```text
//! fetch → oldest first → cursor filter → ledger filter → sanitize
//!       → fan-out → ledger write → cursor advance
//! ```
//!
//! Ticks never overlap and posts are handled one at a time. An error ends the
//! tick early; whatever was not recorded is picked up again by the next tick
//! because it is still missing from the ledger.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::cursor::TimeCursor;
use crate::delivery::deliver;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::platforms::{Destination, Source};
use crate::sanitize::compose_message;

/// Number of recent posts requested per tick
pub const FETCH_LIMIT: u32 = 20;

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub skipped_by_cursor: usize,
    pub skipped_as_synced: usize,
    /// Ids of relayed posts, in the order they were sent
    pub delivered: Vec<String>,
}

pub struct SyncEngine {
    source: Box<dyn Source>,
    destination: Box<dyn Destination>,
    ledger: Ledger,
    channels: Vec<String>,
    poll_interval: Duration,
    cursor: TimeCursor,
}

impl SyncEngine {
    pub fn new(
        source: Box<dyn Source>,
        destination: Box<dyn Destination>,
        ledger: Ledger,
        channels: Vec<String>,
        poll_interval: Duration,
        cursor: TimeCursor,
    ) -> Self {
        Self {
            source,
            destination,
            ledger,
            channels,
            poll_interval,
            cursor,
        }
    }

    pub fn cursor(&self) -> &TimeCursor {
        &self.cursor
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run one fetch-filter-deliver cycle
    ///
    /// # Errors
    ///
    /// Returns the first fetch or ledger error; posts after the failing one
    /// are left for the next tick. Delivery failures are not errors.
    pub async fn tick(&mut self) -> Result<TickReport> {
        info!("Checking for new posts from {}...", self.source.name());

        let mut posts = self.source.fetch_recent(FETCH_LIMIT).await?;
        let mut report = TickReport {
            fetched: posts.len(),
            ..Default::default()
        };

        if posts.is_empty() {
            info!("No new posts found.");
            return Ok(report);
        }

        // The API pages newest first; the stable sort keeps that reversed
        // order for posts sharing a timestamp.
        posts.reverse();
        posts.sort_by_key(|post| post.created_at);

        for post in &posts {
            debug!("Processing post {} created at {}", post.id, post.created_at);

            if self.cursor.covers(&post.created_at) {
                debug!(
                    "Post {} was created before the cursor. Skipping.",
                    post.id
                );
                report.skipped_by_cursor += 1;
                continue;
            }

            if self.ledger.exists(&post.id).await? {
                debug!("Post {} already synced. Skipping.", post.id);
                report.skipped_as_synced += 1;
                continue;
            }

            info!("Found new post: {}", post.id);

            let message = compose_message(post);
            let results = deliver(
                self.destination.as_ref(),
                &self.channels,
                &message,
                &post.media,
            )
            .await;

            let failed = results.iter().filter(|r| !r.success).count();
            if failed > 0 {
                warn!(
                    "Post {} failed on {} of {} channel(s); recording it anyway",
                    post.id,
                    failed,
                    results.len()
                );
            }

            self.ledger.record_if_absent(&post.id).await?;
            self.cursor.advance(post.created_at);
            info!(
                "Sent post {} to {} channel(s) and recorded it in the ledger.",
                post.id,
                results.len() - failed
            );

            report.delivered.push(post.id.clone());
        }

        Ok(report)
    }

    /// Run a tick and log its outcome; errors never escape
    async fn tick_logged(&mut self) -> Option<TickReport> {
        match self.tick().await {
            Ok(report) => {
                info!(
                    "Tick finished: {} fetched, {} relayed, {} before cursor, {} already synced",
                    report.fetched,
                    report.delivered.len(),
                    report.skipped_by_cursor,
                    report.skipped_as_synced
                );
                Some(report)
            }
            Err(e) => {
                error!("An error occurred: {}", e);
                None
            }
        }
    }

    /// One-shot mode: a single tick, then the cursor to hand to the next run
    ///
    /// A failed tick counts as "no new posts"; the cursor is returned either way.
    pub async fn run_once(&mut self) -> TimeCursor {
        self.tick_logged().await;
        self.cursor
    }

    /// Continuous mode: tick, wait the poll interval, repeat
    ///
    /// Returns when `shutdown` changes or its sender is dropped. A tick in
    /// progress is finished first; the wait between ticks is cut short.
    pub async fn run_continuous(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tick_logged().await;

            info!("Sleeping for {} seconds...", self.poll_interval.as_secs());
            tokio::select! {
                _ = sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {
                    info!("Shutdown requested, stopping poll loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::{MockDestination, MockSource};
    use crate::types::SourcePost;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    fn post(id: &str, created_at: DateTime<Utc>) -> SourcePost {
        SourcePost {
            id: id.to_string(),
            created_at,
            content: format!("<p>post {}</p>", id),
            author_display_name: "Tester".to_string(),
            url: format!("https://example.social/@tester/{}", id),
            media: vec![],
        }
    }

    async fn engine(
        source: MockSource,
        destination: MockDestination,
        cursor: TimeCursor,
    ) -> (TempDir, SyncEngine) {
        let temp_dir = TempDir::new().unwrap();
        let ledger = Ledger::new(temp_dir.path().join("ledger.db").to_str().unwrap())
            .await
            .unwrap();
        let engine = SyncEngine::new(
            Box::new(source),
            Box::new(destination),
            ledger,
            vec!["@chan".to_string()],
            Duration::from_secs(300),
            cursor,
        );
        (temp_dir, engine)
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_source_order() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        // Newest first from the API: "b" was posted after "a" within the same second
        let source = MockSource::with_posts(vec![post("b", t), post("a", t)]);

        let (_dir, mut engine) = engine(source, MockDestination::success(), TimeCursor::default()).await;
        let report = engine.tick().await.unwrap();

        assert_eq!(report.delivered, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_page() {
        let source = MockSource::with_posts(vec![]);
        let destination = MockDestination::success();

        let (_dir, mut engine) = engine(source, destination.clone(), TimeCursor::default()).await;
        let report = engine.tick().await.unwrap();

        assert_eq!(report, TickReport::default());
        assert!(destination.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned_from_tick() {
        let (_dir, mut engine) = engine(
            MockSource::failing("boom"),
            MockDestination::success(),
            TimeCursor::default(),
        )
        .await;

        let err = engine.tick().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
