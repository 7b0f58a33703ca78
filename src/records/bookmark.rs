/// Bookmark record data types
///
/// Bookmarks are synced from an external bookmarking service; the full API
/// item is kept verbatim inside a provider snapshot so nothing is lost to
/// normalization drift.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enrichment::snapshot::ApiSnapshot;

/// One item as returned by the bookmarking service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkItem {
    #[serde(rename = "_id")]
    pub id: i64,
    pub link: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub created: DateTime<Utc>,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
    pub collection: CollectionRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheInfo>,
}

/// Reference to the collection an item belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRef {
    #[serde(rename = "$id")]
    pub id: i64,
}

/// Archived-copy state reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl BookmarkItem {
    /// Whether the service reports an archived copy ready for download
    pub fn cache_ready(&self) -> bool {
        self.cache
            .as_ref()
            .map(|c| c.status == "ready")
            .unwrap_or(false)
    }
}

/// A collection as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "_id")]
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<CollectionRef>,
}

/// Denormalized collection facts stored alongside the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

/// The `data` of a bookmark envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkData {
    /// Complete API response, wrapped in the uniform snapshot envelope
    pub bookmark: ApiSnapshot<BookmarkItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionSummary>,
}

/// The `data` of a bookmark-artifact envelope: an archived full-content copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactData {
    pub uuid: i64,
    pub link: String,
    pub content: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub archived_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_cache_created: Option<DateTime<Utc>>,
}
