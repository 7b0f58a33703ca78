/// Bookmark artifact archival
///
/// Best-effort download of the service's archived page copy, stored as its
/// own record next to the bookmark. The artifact shares the bookmark's
/// content hash: it is an attachment to that record, not an independently
/// addressed one.
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    blob_store::{artifact_json_key, BlobBackend},
    bookmarks::client::BookmarkSource,
    records::bookmark::{ArtifactData, BookmarkItem},
    records::{assemble_with_hash, RecordKind},
};

/// Download the archived copy for an item and store it as an artifact
/// record.
///
/// Returns the object key on success, `None` on any failure. The copy not
/// existing, a transport error, and a blob-store failure all look the same
/// to the caller and drive the retry path.
pub async fn download_and_store(
    source: &dyn BookmarkSource,
    blobs: &Arc<dyn BlobBackend>,
    item: &BookmarkItem,
    bookmark_sha256: &str,
) -> Option<String> {
    let copy = match source.fetch_permanent_copy(item.id).await {
        Ok(Some(copy)) => copy,
        Ok(None) => {
            info!("No archived copy available for bookmark {}", item.id);
            return None;
        }
        Err(e) => {
            warn!("Artifact download failed for bookmark {}: {}", item.id, e);
            return None;
        }
    };

    let size_bytes = copy.content.len() as u64;
    let data = ArtifactData {
        uuid: item.id,
        link: item.link.clone(),
        content: copy.content,
        content_type: copy.content_type,
        size_bytes,
        archived_at: Utc::now(),
        source_cache_created: item.cache.as_ref().and_then(|c| c.created),
    };

    let envelope = assemble_with_hash(
        RecordKind::BookmarkArtifact,
        data,
        bookmark_sha256.to_string(),
        None,
    );

    // Key date is the bookmark's own created timestamp
    let object_key = artifact_json_key(item.created.date_naive(), bookmark_sha256);

    let bytes = match serde_json::to_vec_pretty(&envelope) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to serialize artifact for bookmark {}: {}", item.id, e);
            return None;
        }
    };

    if let Err(e) = blobs.put(&object_key, bytes, "application/json").await {
        warn!("Failed to store artifact {}: {}", object_key, e);
        return None;
    }

    info!("Stored artifact {}", object_key);
    Some(object_key)
}
