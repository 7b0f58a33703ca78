/// Bookmark sync producer
///
/// Periodically diffs the newest page of the remote list against the local
/// index. Unseen external ids get a work item and a queue message with a
/// randomized initial delay so a burst of new bookmarks does not hit the
/// downstream providers all at once.
use chrono::Duration;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

use crate::{
    bookmarks::client::BookmarkSource,
    bookmarks::queue::{DelayedQueue, WorkItem, WorkTracker},
    config::SyncConfig,
    error::CoffeyResult,
    store::index::Index,
};

/// Outcome of one producer run
#[derive(Debug, Default, PartialEq)]
pub struct SyncReport {
    pub discovered: u32,
    pub already_indexed: u32,
}

pub struct BookmarkSync {
    source: Arc<dyn BookmarkSource>,
    index: Index,
    queue: DelayedQueue,
    tracker: WorkTracker,
    config: SyncConfig,
}

impl BookmarkSync {
    pub fn new(
        source: Arc<dyn BookmarkSource>,
        index: Index,
        queue: DelayedQueue,
        tracker: WorkTracker,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            index,
            queue,
            tracker,
            config,
        }
    }

    /// One producer pass over the newest page
    pub async fn run_once(&self) -> CoffeyResult<SyncReport> {
        let items = self.source.list_newest(self.config.page_size).await?;
        if items.is_empty() {
            info!("Bookmark sync: remote list is empty");
            return Ok(SyncReport::default());
        }

        let mut report = SyncReport::default();

        for item in &items {
            if self.index.bookmark_exists(item.id).await? {
                report.already_indexed += 1;
                continue;
            }

            self.tracker
                .put(&WorkItem::new(item.id, item.collection.id))
                .await?;

            self.queue
                .send(item.id, item.collection.id, self.initial_delay())
                .await?;

            report.discovered += 1;
        }

        info!(
            "Bookmark sync: {} new, {} already indexed",
            report.discovered, report.already_indexed
        );

        Ok(report)
    }

    /// Random jitter within the configured bounds
    fn initial_delay(&self) -> Duration {
        let min = self.config.jitter_min_hours;
        let max = self.config.jitter_max_hours;
        let hours = if min >= max {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        Duration::hours(hours as i64)
    }
}
