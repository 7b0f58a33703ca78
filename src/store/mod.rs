/// Dedup/persistence gateway
///
/// Writes the canonical JSON blob and the normalized index row for each
/// record kind. There is no two-phase commit across the two stores: metadata
/// wins over the archival copy, failures are logged, and nothing rolls back.
pub mod index;

pub use index::Index;

use std::sync::Arc;
use tracing::error;

use crate::{
    blob_store::{bookmark_json_key, chatter_json_key, BlobBackend},
    error::CoffeyResult,
    metrics,
    records::bookmark::BookmarkData,
    records::{ChatterData, Envelope},
};

#[derive(Clone)]
pub struct ContentStore {
    index: Index,
    blobs: Arc<dyn BlobBackend>,
}

impl ContentStore {
    pub fn new(index: Index, blobs: Arc<dyn BlobBackend>) -> Self {
        Self { index, blobs }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn blobs(&self) -> &Arc<dyn BlobBackend> {
        &self.blobs
    }

    /// Persist a chatter record: blob snapshot plus index row.
    ///
    /// Either write may fail without undoing the other; the object key is
    /// returned regardless so the caller can report what was attempted.
    pub async fn store_chatter(&self, envelope: &Envelope<ChatterData>) -> String {
        let object_key = chatter_json_key(envelope.created_at.date_naive(), &envelope.sha256);

        self.put_snapshot(&object_key, envelope).await;

        if let Err(e) = self.index.insert_chatter(envelope, &object_key).await {
            error!(
                "Failed to insert chatter index row for {}: {}",
                envelope.sha256, e
            );
        }

        metrics::record_created("chatter");
        object_key
    }

    /// Persist a bookmark record; the key date is the bookmark's own created
    /// timestamp (semantic date), not sync time
    pub async fn store_bookmark(&self, envelope: &Envelope<BookmarkData>) -> CoffeyResult<String> {
        let item = &envelope.data.bookmark.summary;
        let object_key = bookmark_json_key(item.created.date_naive(), &envelope.sha256);

        self.put_snapshot(&object_key, envelope).await;

        self.index
            .insert_bookmark(
                item,
                &envelope.sha256,
                envelope.data.collection.as_ref(),
                envelope.created_at,
            )
            .await?;

        metrics::record_created("bookmark");
        Ok(object_key)
    }

    async fn put_snapshot<T: serde::Serialize>(&self, object_key: &str, envelope: &T) {
        match serde_json::to_vec_pretty(envelope) {
            Ok(bytes) => {
                if let Err(e) = self.blobs.put(object_key, bytes, "application/json").await {
                    error!("Failed to store record blob {}: {}", object_key, e);
                }
            }
            Err(e) => error!("Failed to serialize record for {}: {}", object_key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::index::testing::memory_pool;
    use super::*;
    use crate::blob_store::DiskBlobBackend;
    use crate::records::{assemble, RecordKind};
    use tempfile::tempdir;

    fn chatter_data() -> ChatterData {
        ChatterData {
            kind: "chatter".to_string(),
            content: Some("hello".to_string()),
            comment: None,
            title: Some("Title".to_string()),
            tags: vec![],
            images: vec![],
            links: None,
            publish: true,
            location_hint: None,
            place: None,
            environment: None,
            watched: None,
        }
    }

    #[tokio::test]
    async fn test_store_chatter_writes_blob_and_index() {
        let dir = tempdir().unwrap();
        let blobs = Arc::new(DiskBlobBackend::new(dir.path().to_path_buf()));
        let store = ContentStore::new(Index::new(memory_pool().await), blobs.clone());

        let envelope = assemble(RecordKind::Chatter, chatter_data(), None).unwrap();
        let key = store.store_chatter(&envelope).await;

        assert!(key.starts_with("chatter/json/"));
        assert!(key.ends_with(&format!("sha_{}.json", envelope.sha256)));

        let stored = blobs.get(&key).await.unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(parsed["id"], format!("sha256:{}", envelope.sha256));

        assert!(store.index().chatter_exists(&envelope.sha256).await.unwrap());
    }

    #[tokio::test]
    async fn test_blob_failure_does_not_block_index_insert() {
        // Point the blob store at a path that cannot be created
        let blobs = Arc::new(DiskBlobBackend::new("/dev/null/blobs".into()));
        let store = ContentStore::new(Index::new(memory_pool().await), blobs);

        let envelope = assemble(RecordKind::Chatter, chatter_data(), None).unwrap();
        store.store_chatter(&envelope).await;

        assert!(store.index().chatter_exists(&envelope.sha256).await.unwrap());
    }
}
