/// Normalized index rows over the SQLite datastore
///
/// Point lookups and inserts by primary/unique key, soft delete via a
/// timestamp column, and ordered/limited listing. No joins or transactions.
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::{
    error::{CoffeyError, CoffeyResult},
    records::bookmark::{BookmarkItem, CollectionSummary},
    records::{ChatterData, Envelope},
};

/// Index row for an uploaded image
#[derive(Debug, Clone, Serialize)]
pub struct ImageRow {
    pub sha256: String,
    pub uuid: String,
    pub original_filename: String,
    pub date_taken: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

fn image_row(row: &sqlx::sqlite::SqliteRow) -> CoffeyResult<ImageRow> {
    Ok(ImageRow {
        sha256: row.try_get("sha256")?,
        uuid: row.try_get("uuid")?,
        original_filename: row.try_get("original_filename")?,
        date_taken: row.try_get("date_taken")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

/// Typed access to the index tables
#[derive(Clone)]
pub struct Index {
    db: SqlitePool,
}

impl Index {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    // ----- chatter -----

    pub async fn insert_chatter(
        &self,
        envelope: &Envelope<ChatterData>,
        object_key: &str,
    ) -> CoffeyResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO chatter (sha256, kind, title, published, created_at, object_key)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&envelope.sha256)
        .bind(&envelope.data.kind)
        .bind(&envelope.data.title)
        .bind(envelope.data.publish)
        .bind(envelope.created_at)
        .bind(object_key)
        .execute(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        Ok(())
    }

    pub async fn chatter_exists(&self, sha256: &str) -> CoffeyResult<bool> {
        let row = sqlx::query("SELECT 1 FROM chatter WHERE sha256 = ?1")
            .bind(sha256)
            .fetch_optional(&self.db)
            .await
            .map_err(CoffeyError::Database)?;
        Ok(row.is_some())
    }

    // ----- images -----

    /// Active (not soft-deleted) image row with this content hash
    pub async fn find_image(&self, sha256: &str) -> CoffeyResult<Option<ImageRow>> {
        let row = sqlx::query(
            r#"
            SELECT sha256, uuid, original_filename, date_taken, created_at, updated_at, deleted_at
            FROM images
            WHERE sha256 = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(sha256)
        .fetch_optional(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        row.as_ref().map(image_row).transpose()
    }

    pub async fn insert_image(
        &self,
        sha256: &str,
        uuid: &str,
        original_filename: &str,
        date_taken: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> CoffeyResult<()> {
        sqlx::query(
            r#"
            INSERT INTO images (sha256, uuid, original_filename, date_taken, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(sha256)
        .bind(uuid)
        .bind(original_filename)
        .bind(date_taken)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        Ok(())
    }

    pub async fn list_images(&self, limit: i64) -> CoffeyResult<Vec<ImageRow>> {
        let rows = sqlx::query(
            r#"
            SELECT sha256, uuid, original_filename, date_taken, created_at, updated_at, deleted_at
            FROM images
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        rows.iter().map(image_row).collect()
    }

    /// Soft delete; the blob-store copy and hosted image are left in place
    pub async fn soft_delete_image(&self, sha256: &str) -> CoffeyResult<bool> {
        let result = sqlx::query(
            "UPDATE images SET deleted_at = ?1, updated_at = ?1 WHERE sha256 = ?2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(sha256)
        .execute(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    // ----- bookmarks -----

    /// Cheap first-pass existence check by external id
    pub async fn bookmark_exists(&self, external_id: i64) -> CoffeyResult<bool> {
        let row = sqlx::query("SELECT 1 FROM bookmark WHERE uuid = ?1")
            .bind(external_id)
            .fetch_optional(&self.db)
            .await
            .map_err(CoffeyError::Database)?;
        Ok(row.is_some())
    }

    pub async fn insert_bookmark(
        &self,
        item: &BookmarkItem,
        sha256: &str,
        collection: Option<&CollectionSummary>,
        synced_at: DateTime<Utc>,
    ) -> CoffeyResult<()> {
        let tags = item
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CoffeyError::Internal(format!("Failed to serialize tags: {}", e)))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO bookmark (
                uuid, sha256, link, title, excerpt, domain, type, cover_url,
                collection_id, collection_title, tags, created_at, updated_at, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(item.id)
        .bind(sha256)
        .bind(&item.link)
        .bind(&item.title)
        .bind(&item.excerpt)
        .bind(&item.domain)
        .bind(&item.item_type)
        .bind(&item.cover)
        .bind(collection.map(|c| c.id))
        .bind(collection.map(|c| c.title.as_str()))
        .bind(tags)
        .bind(item.created)
        .bind(item.last_update)
        .bind(synced_at)
        .execute(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use sqlx::SqlitePool;

    /// In-memory pool with the full schema, for unit tests
    pub async fn memory_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::raw_sql(include_str!("../../migrations/0001_init.sql"))
            .execute(&pool)
            .await
            .unwrap();
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::testing::memory_pool;
    use super::*;

    #[tokio::test]
    async fn test_image_dedup_lookup_ignores_soft_deleted() {
        let index = Index::new(memory_pool().await);

        index
            .insert_image("abc", "uuid-1", "photo.jpg", None, Utc::now())
            .await
            .unwrap();
        assert!(index.find_image("abc").await.unwrap().is_some());

        assert!(index.soft_delete_image("abc").await.unwrap());
        assert!(index.find_image("abc").await.unwrap().is_none());

        // Second delete is a no-op
        assert!(!index.soft_delete_image("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_images_newest_first() {
        let index = Index::new(memory_pool().await);

        let older = Utc::now() - chrono::Duration::hours(2);
        index
            .insert_image("old", "u1", "a.jpg", None, older)
            .await
            .unwrap();
        index
            .insert_image("new", "u2", "b.jpg", None, Utc::now())
            .await
            .unwrap();

        let rows = index.list_images(10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sha256, "new");
    }

    #[tokio::test]
    async fn test_bookmark_exists_by_external_id() {
        let index = Index::new(memory_pool().await);
        assert!(!index.bookmark_exists(42).await.unwrap());
    }
}
