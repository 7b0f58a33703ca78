/// Bookmark queue consumer
///
/// Drives the per-item state machine: fetch detail, persist the record,
/// then attempt the archived-copy download with a bounded explicit retry.
/// An error thrown out of `process` leaves the message unacked, so the
/// queue's own redelivery covers processing failures separately from the
/// artifact retry counter.
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    bookmarks::artifact,
    bookmarks::client::BookmarkSource,
    bookmarks::queue::{DelayedQueue, QueueMessage, WorkTracker},
    config::SyncConfig,
    enrichment::snapshot::{ApiSnapshot, ProviderInfo},
    error::CoffeyResult,
    metrics,
    records::bookmark::{BookmarkData, Collection, CollectionSummary},
    records::{assemble, RecordKind},
    store::ContentStore,
};

/// Terminal outcome of processing one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Work item absent (expired or already completed)
    Dropped,
    /// External id already indexed before we ever worked on it
    AlreadyIndexed,
    /// Record stored and artifact archived
    Complete,
    /// Record stored, artifact not ready; retry scheduled
    RetryScheduled,
    /// Retry ceiling reached; record kept without an artifact
    GaveUp,
}

pub struct BookmarkWorker {
    source: Arc<dyn BookmarkSource>,
    store: ContentStore,
    queue: DelayedQueue,
    tracker: WorkTracker,
    config: SyncConfig,
}

impl BookmarkWorker {
    pub fn new(
        source: Arc<dyn BookmarkSource>,
        store: ContentStore,
        queue: DelayedQueue,
        tracker: WorkTracker,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            queue,
            tracker,
            config,
        }
    }

    /// Pop and process one due message.
    ///
    /// Returns whether a message was handled. A processing error is logged
    /// and the message left unacked for the queue's native redelivery.
    pub async fn poll_once(&self) -> CoffeyResult<bool> {
        let message = match self.queue.pop_due().await? {
            Some(message) => message,
            None => return Ok(false),
        };

        match self.process(&message).await {
            Ok(outcome) => {
                metrics::record_queue_message(outcome_label(outcome));
                self.queue.ack(message.id).await?;
            }
            Err(e) => {
                warn!(
                    "Processing bookmark {} failed (attempt {}): {}",
                    message.external_id, message.attempts, e
                );
                metrics::record_queue_message("error");
                // No ack: the lease expires and the queue redelivers
            }
        }

        Ok(true)
    }

    /// The per-item state machine
    pub async fn process(&self, message: &QueueMessage) -> CoffeyResult<ProcessOutcome> {
        let external_id = message.external_id;

        let mut work = match self.tracker.get(external_id).await? {
            Some(work) => work,
            None => {
                info!("No work item for bookmark {}, skipping", external_id);
                return Ok(ProcessOutcome::Dropped);
            }
        };

        // A first-attempt item already in the index raced with another
        // completion. Items mid-retry have legitimately been inserted and
        // must keep going for their artifact.
        if work.retry_count == 0 && self.store.index().bookmark_exists(external_id).await? {
            info!("Bookmark {} already indexed, cleaning up", external_id);
            self.tracker.delete(external_id).await?;
            return Ok(ProcessOutcome::AlreadyIndexed);
        }

        // Detail fetch; an error here propagates and the message redelivers
        let item = self.source.fetch_item(external_id).await?;
        let collections = self.source.fetch_collections().await?;
        let collection = find_collection(&collections, message.collection_id);

        let data = BookmarkData {
            bookmark: ApiSnapshot::now(ProviderInfo::new("raindrop.io", "api", "v1"), item.clone()),
            collection,
        };
        let envelope = assemble(RecordKind::Bookmark, data, None)?;
        self.store.store_bookmark(&envelope).await?;

        if item.cache_ready() {
            let stored =
                artifact::download_and_store(self.source.as_ref(), self.store.blobs(), &item, &envelope.sha256)
                    .await;
            if stored.is_some() {
                info!("Bookmark {} complete with artifact", external_id);
                self.tracker.delete(external_id).await?;
                return Ok(ProcessOutcome::Complete);
            }
        }

        // Artifact not ready or download failed
        if work.retry_count >= self.config.max_retries {
            info!(
                "Bookmark {} exhausted {} artifact retries, keeping record without artifact",
                external_id, work.retry_count
            );
            self.tracker.delete(external_id).await?;
            return Ok(ProcessOutcome::GaveUp);
        }

        work.retry_count += 1;
        work.last_attempt_at = Some(Utc::now());
        self.tracker.put(&work).await?;

        self.queue
            .send(
                external_id,
                message.collection_id,
                Duration::seconds(self.config.retry_delay_secs as i64),
            )
            .await?;
        metrics::ARTIFACT_RETRIES_TOTAL.inc();

        info!(
            "Re-queued bookmark {} (retry {}/{})",
            external_id, work.retry_count, self.config.max_retries
        );

        Ok(ProcessOutcome::RetryScheduled)
    }
}

fn outcome_label(outcome: ProcessOutcome) -> &'static str {
    match outcome {
        ProcessOutcome::Dropped => "dropped",
        ProcessOutcome::AlreadyIndexed => "already_indexed",
        ProcessOutcome::Complete => "success",
        ProcessOutcome::RetryScheduled => "retry",
        ProcessOutcome::GaveUp => "gave_up",
    }
}

fn find_collection(collections: &[Collection], collection_id: i64) -> Option<CollectionSummary> {
    collections
        .iter()
        .find(|c| c.id == collection_id)
        .map(|c| CollectionSummary {
            id: c.id,
            title: c.title.clone(),
            parent_id: c.parent.as_ref().map(|p| p.id),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::DiskBlobBackend;
    use crate::bookmarks::queue::WorkItem;
    use crate::bookmarks::testing::{sync_config, test_item, MockBookmarkSource};
    use crate::store::index::testing::memory_pool;
    use crate::store::Index;
    use tempfile::tempdir;

    struct Fixture {
        worker: BookmarkWorker,
        source: Arc<MockBookmarkSource>,
        queue: DelayedQueue,
        tracker: WorkTracker,
        index: Index,
        _dir: tempfile::TempDir,
    }

    async fn fixture(source: MockBookmarkSource) -> Fixture {
        let pool = memory_pool().await;
        let dir = tempdir().unwrap();
        let index = Index::new(pool.clone());
        let blobs = Arc::new(DiskBlobBackend::new(dir.path().to_path_buf()));
        let store = ContentStore::new(index.clone(), blobs);
        let queue = DelayedQueue::new(pool.clone(), 600);
        let tracker = WorkTracker::new(pool, 3600);
        let source = Arc::new(source);

        Fixture {
            worker: BookmarkWorker::new(
                source.clone(),
                store,
                queue.clone(),
                tracker.clone(),
                sync_config(),
            ),
            source,
            queue,
            tracker,
            index,
            _dir: dir,
        }
    }

    fn message(external_id: i64, collection_id: i64) -> QueueMessage {
        QueueMessage {
            id: 1,
            external_id,
            collection_id,
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_absent_work_item_is_silent_drop() {
        let f = fixture(MockBookmarkSource::with_items(vec![test_item(1, 10)])).await;

        let outcome = f.worker.process(&message(1, 10)).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Dropped);
        assert_eq!(f.source.item_fetches(), 0);
        assert!(!f.index.bookmark_exists(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_raced_completion_deletes_work_item() {
        let item = test_item(1, 10);
        let f = fixture(MockBookmarkSource::with_items(vec![item.clone()])).await;

        f.tracker.put(&WorkItem::new(1, 10)).await.unwrap();
        f.index
            .insert_bookmark(&item, "deadbeef", None, Utc::now())
            .await
            .unwrap();

        let outcome = f.worker.process(&message(1, 10)).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::AlreadyIndexed);
        assert!(f.tracker.get(1).await.unwrap().is_none());
        assert_eq!(f.source.item_fetches(), 0);
    }

    #[tokio::test]
    async fn test_successful_artifact_completes_item() {
        let f = fixture(MockBookmarkSource::with_items(vec![test_item(1, 10)])).await;
        f.tracker.put(&WorkItem::new(1, 10)).await.unwrap();

        let outcome = f.worker.process(&message(1, 10)).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Complete);

        assert!(f.index.bookmark_exists(1).await.unwrap());
        assert!(f.tracker.get(1).await.unwrap().is_none());
        assert_eq!(f.queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_artifact_schedules_retry() {
        let source = MockBookmarkSource::with_items(vec![test_item(1, 10)]);
        source.set_copy_available(false);
        let f = fixture(source).await;
        f.tracker.put(&WorkItem::new(1, 10)).await.unwrap();

        let outcome = f.worker.process(&message(1, 10)).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::RetryScheduled);

        // Record stored; work item incremented; retry message queued
        assert!(f.index.bookmark_exists(1).await.unwrap());
        assert_eq!(f.tracker.get(1).await.unwrap().unwrap().retry_count, 1);
        assert_eq!(f.queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_keeps_record_and_drops_work_item() {
        let source = MockBookmarkSource::with_items(vec![test_item(1, 10)]);
        source.set_copy_available(false);
        let f = fixture(source).await;
        f.tracker.put(&WorkItem::new(1, 10)).await.unwrap();

        // 14 failing attempts schedule retries; the 15th gives up
        for attempt in 0..14 {
            let outcome = f.worker.process(&message(1, 10)).await.unwrap();
            assert_eq!(outcome, ProcessOutcome::RetryScheduled, "attempt {}", attempt);
        }
        let queued_before_final = f.queue.pending_count().await.unwrap();

        let outcome = f.worker.process(&message(1, 10)).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::GaveUp);

        // Work item gone, no further message enqueued, index row kept
        assert!(f.tracker.get(1).await.unwrap().is_none());
        assert_eq!(f.queue.pending_count().await.unwrap(), queued_before_final);
        assert!(f.index.bookmark_exists(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_detail_fetch_failure_leaves_message_for_redelivery() {
        let pool = memory_pool().await;
        let dir = tempdir().unwrap();
        let index = Index::new(pool.clone());
        let blobs: Arc<dyn crate::blob_store::BlobBackend> =
            Arc::new(DiskBlobBackend::new(dir.path().to_path_buf()));
        let store = ContentStore::new(index.clone(), blobs);
        // Zero redelivery delay so the lease expires immediately
        let queue = DelayedQueue::new(pool.clone(), 0);
        let tracker = WorkTracker::new(pool, 3600);

        let source = MockBookmarkSource::with_items(vec![test_item(1, 10)]);
        source.set_fail_fetch(true);
        let worker = BookmarkWorker::new(
            Arc::new(source),
            store,
            queue.clone(),
            tracker.clone(),
            sync_config(),
        );

        tracker.put(&WorkItem::new(1, 10)).await.unwrap();
        queue.send(1, 10, Duration::seconds(-1)).await.unwrap();

        // Message popped, processing errored, message not acked
        assert!(worker.poll_once().await.unwrap());
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        // Redelivered by the queue's own retry layer
        assert!(queue.pop_due().await.unwrap().is_some());
    }
}
