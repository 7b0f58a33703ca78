/// Record envelopes and assembly
///
/// Every persisted content kind shares one outer envelope whose identity is
/// derived from its own data: `id = "sha256:" + hash(canonical(data))`.
/// Records are immutable once assembled; mutating `data` after hashing is
/// forbidden.
pub mod bookmark;
pub mod chatter;
pub mod image;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{canonical, error::CoffeyResult};

pub use chatter::{
    ChatterData, CreateChatterRequest, Environment, Link, LinkInput, LocationHint, PlaceInput,
    WatchedInput,
};

/// Current envelope schema version, for forward migration
pub const SCHEMA_VERSION: &str = "1.0.0";

/// A latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Persisted record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "chatter")]
    Chatter,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "bookmark")]
    Bookmark,
    #[serde(rename = "bookmark-artifact")]
    BookmarkArtifact,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Chatter => "chatter",
            RecordKind::Image => "image",
            RecordKind::Bookmark => "bookmark",
            RecordKind::BookmarkArtifact => "bookmark-artifact",
        }
    }
}

/// Shared outer record shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// `"sha256:" + sha256`; derived, never client-supplied
    pub id: String,
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
    /// Raw hex digest, duplicated from `id` for indexing
    pub sha256: String,
    pub data: T,
}

/// Build the immutable record envelope for already-enriched data.
///
/// The hash covers the post-enrichment data, so two otherwise-identical
/// submissions that enriched differently hash differently. No I/O happens
/// here beyond a clock read.
pub fn assemble<T: Serialize>(
    kind: RecordKind,
    data: T,
    explicit_created_at: Option<DateTime<Utc>>,
) -> CoffeyResult<Envelope<T>> {
    let sha256 = canonical::hash_serializable(&data)?;
    Ok(finish(kind, data, sha256, explicit_created_at))
}

/// Build an envelope around a precomputed content hash.
///
/// Used on the image path, where identity is the hash of the raw file bytes
/// rather than of the canonicalized record data.
pub fn assemble_with_hash<T>(
    kind: RecordKind,
    data: T,
    sha256: String,
    explicit_created_at: Option<DateTime<Utc>>,
) -> Envelope<T> {
    finish(kind, data, sha256, explicit_created_at)
}

fn finish<T>(
    kind: RecordKind,
    data: T,
    sha256: String,
    explicit_created_at: Option<DateTime<Utc>>,
) -> Envelope<T> {
    Envelope {
        kind,
        id: format!("sha256:{}", sha256),
        schema_version: SCHEMA_VERSION.to_string(),
        created_at: explicit_created_at.unwrap_or_else(Utc::now),
        sha256,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assemble_id_matches_data_hash() {
        let data = json!({"kind": "chatter", "content": "hello"});
        let envelope = assemble(RecordKind::Chatter, data.clone(), None).unwrap();

        let expected = canonical::hash_value(&data);
        assert_eq!(envelope.sha256, expected);
        assert_eq!(envelope.id, format!("sha256:{}", expected));
        assert_eq!(envelope.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_assemble_respects_explicit_created_at() {
        let backdated = "2020-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let envelope =
            assemble(RecordKind::Bookmark, json!({"a": 1}), Some(backdated)).unwrap();
        assert_eq!(envelope.created_at, backdated);
    }

    #[test]
    fn test_identical_data_collides_on_hash() {
        let a = assemble(RecordKind::Chatter, json!({"content": "same"}), None).unwrap();
        let b = assemble(RecordKind::Chatter, json!({"content": "same"}), None).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_kind_serializes_as_type_tag() {
        let envelope = assemble(RecordKind::Chatter, json!({}), None).unwrap();
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "chatter");
        assert!(value.get("kind").is_none());
    }
}
