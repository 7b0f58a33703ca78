/// Bookmark sync and retry-queue worker
///
/// A producer diffs the remote bookmarking service against the local index
/// and enqueues unseen items; a consumer fetches full detail, persists the
/// record, and retries the best-effort artifact download with a bounded
/// counter. Partial success is acceptable: metadata without an archived
/// copy is kept.
pub mod artifact;
pub mod client;
pub mod queue;
pub mod sync;
pub mod worker;

pub use client::{BookmarkSource, RaindropClient};
pub use queue::{DelayedQueue, WorkTracker};
pub use sync::BookmarkSync;
pub use worker::BookmarkWorker;

#[cfg(test)]
pub(crate) mod testing {
    //! Shared mock bookmark source for producer/worker tests
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::bookmarks::client::{BookmarkSource, PermanentCopy};
    use crate::config::SyncConfig;
    use crate::error::{CoffeyError, CoffeyResult};
    use crate::records::bookmark::{BookmarkItem, CacheInfo, Collection, CollectionRef};

    pub fn test_item(id: i64, collection_id: i64) -> BookmarkItem {
        BookmarkItem {
            id,
            link: format!("https://example.com/{}", id),
            title: format!("Bookmark {}", id),
            excerpt: Some("An excerpt".to_string()),
            domain: Some("example.com".to_string()),
            item_type: "article".to_string(),
            cover: None,
            tags: Some(vec!["saved".to_string()]),
            created: "2025-02-01T12:00:00Z".parse().unwrap(),
            last_update: "2025-02-01T12:00:00Z".parse().unwrap(),
            collection: CollectionRef { id: collection_id },
            cache: Some(CacheInfo {
                status: "ready".to_string(),
                created: None,
            }),
        }
    }

    pub fn sync_config() -> SyncConfig {
        SyncConfig {
            enabled: true,
            page_size: 50,
            interval_secs: 3600,
            max_retries: 14,
            retry_delay_secs: 43_200,
            work_item_ttl_secs: 60 * 60 * 24 * 14,
            jitter_min_hours: 1,
            jitter_max_hours: 11,
            poll_interval_secs: 30,
            redelivery_delay_secs: 600,
        }
    }

    pub struct MockBookmarkSource {
        items: Vec<BookmarkItem>,
        collections: Vec<Collection>,
        copy_available: AtomicBool,
        fail_fetch: AtomicBool,
        item_fetch_calls: AtomicUsize,
    }

    impl MockBookmarkSource {
        pub fn with_items(items: Vec<BookmarkItem>) -> Self {
            Self {
                items,
                collections: vec![Collection {
                    id: 10,
                    title: "Reading".to_string(),
                    parent: None,
                }],
                copy_available: AtomicBool::new(true),
                fail_fetch: AtomicBool::new(false),
                item_fetch_calls: AtomicUsize::new(0),
            }
        }

        pub fn set_copy_available(&self, available: bool) {
            self.copy_available.store(available, Ordering::SeqCst);
        }

        pub fn set_fail_fetch(&self, fail: bool) {
            self.fail_fetch.store(fail, Ordering::SeqCst);
        }

        pub fn item_fetches(&self) -> usize {
            self.item_fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BookmarkSource for MockBookmarkSource {
        async fn list_newest(&self, page_size: u32) -> CoffeyResult<Vec<BookmarkItem>> {
            Ok(self
                .items
                .iter()
                .take(page_size as usize)
                .cloned()
                .collect())
        }

        async fn fetch_item(&self, external_id: i64) -> CoffeyResult<BookmarkItem> {
            self.item_fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(CoffeyError::provider_status(
                    "mock-raindrop",
                    500,
                    "down".to_string(),
                ));
            }
            self.items
                .iter()
                .find(|i| i.id == external_id)
                .cloned()
                .ok_or_else(|| {
                    CoffeyError::provider_status("mock-raindrop", 404, "not found".to_string())
                })
        }

        async fn fetch_collections(&self) -> CoffeyResult<Vec<Collection>> {
            Ok(self.collections.clone())
        }

        async fn fetch_permanent_copy(
            &self,
            _external_id: i64,
        ) -> CoffeyResult<Option<PermanentCopy>> {
            if self.copy_available.load(Ordering::SeqCst) {
                Ok(Some(PermanentCopy {
                    content: "<html>archived</html>".to_string(),
                    content_type: "text/html".to_string(),
                }))
            } else {
                Ok(None)
            }
        }
    }
}
