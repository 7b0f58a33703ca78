/// Content-addressed blob storage
///
/// Holds canonical JSON snapshots and archived artifacts, keyed by a
/// deterministic path convention where the date prefix is the record's
/// semantic date (event/capture date), not the upload date.
pub mod disk;

pub use disk::DiskBlobBackend;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::CoffeyResult;

/// Blob storage backend trait
///
/// Implementations handle the actual storage and retrieval of blob data.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store a blob under a key
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> CoffeyResult<()>;

    /// Retrieve a blob by key
    async fn get(&self, key: &str) -> CoffeyResult<Option<Vec<u8>>>;

    /// Check if a blob exists
    async fn exists(&self, key: &str) -> CoffeyResult<bool>;

    /// Delete a blob by key
    async fn delete(&self, key: &str) -> CoffeyResult<()>;
}

/// Key for a chatter record snapshot
pub fn chatter_json_key(date: NaiveDate, sha256: &str) -> String {
    format!("chatter/json/{}-sha_{}.json", date.format("%Y-%m-%d"), sha256)
}

/// Key for a bookmark record snapshot
pub fn bookmark_json_key(date: NaiveDate, sha256: &str) -> String {
    format!("bookmarks/json/{}-sha_{}.json", date.format("%Y-%m-%d"), sha256)
}

/// Key for an archived bookmark artifact
pub fn artifact_json_key(date: NaiveDate, sha256: &str) -> String {
    format!("artifacts/json/{}-sha_{}.json", date.format("%Y-%m-%d"), sha256)
}

/// Key for an image record snapshot (underscore separator, historical quirk)
pub fn image_json_key(date: NaiveDate, sha256: &str) -> String {
    format!("images/json/{}_sha_{}.json", date.format("%Y-%m-%d"), sha256)
}
