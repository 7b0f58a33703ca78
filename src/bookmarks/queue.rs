/// Delayed message queue and work-item tracking
///
/// Two distinct retry layers live here. The queue's lease-based redelivery
/// catches processing exceptions: a popped message that is never acked
/// becomes due again after a fixed delay. The work item's `retry_count`
/// drives the explicit bounded artifact retry with its own longer delay.
/// Collapsing the two would change observable retry timing.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::error::{CoffeyError, CoffeyResult};

/// One message: an external item to process
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    /// Queue-assigned id, used to ack
    pub id: i64,
    pub external_id: i64,
    pub collection_id: i64,
    /// Delivery attempts so far, counted by the queue itself
    pub attempts: u32,
}

/// SQLite-backed delayed queue with at-least-once delivery.
///
/// `pop_due` leases the earliest due message by pushing its delivery time
/// forward; a consumer that acks deletes it, a consumer that dies or errors
/// leaves it to reappear once the lease expires.
#[derive(Clone)]
pub struct DelayedQueue {
    db: SqlitePool,
    redelivery_delay: Duration,
}

impl DelayedQueue {
    pub fn new(db: SqlitePool, redelivery_delay_secs: u64) -> Self {
        Self {
            db,
            redelivery_delay: Duration::seconds(redelivery_delay_secs as i64),
        }
    }

    /// Enqueue a message for delivery after `delay`
    pub async fn send(
        &self,
        external_id: i64,
        collection_id: i64,
        delay: Duration,
    ) -> CoffeyResult<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO bookmark_queue (external_id, collection_id, deliver_at, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(external_id)
        .bind(collection_id)
        .bind(now + delay)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        Ok(())
    }

    /// Lease the earliest due message, if any
    pub async fn pop_due(&self) -> CoffeyResult<Option<QueueMessage>> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            SELECT id, external_id, collection_id, attempts
            FROM bookmark_queue
            WHERE deliver_at <= ?1
            ORDER BY deliver_at ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let message = QueueMessage {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            collection_id: row.try_get("collection_id")?,
            attempts: row.try_get::<i64, _>("attempts")? as u32 + 1,
        };

        sqlx::query(
            "UPDATE bookmark_queue SET deliver_at = ?1, attempts = attempts + 1 WHERE id = ?2",
        )
        .bind(now + self.redelivery_delay)
        .bind(message.id)
        .execute(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        Ok(Some(message))
    }

    /// Acknowledge successful processing; the message is gone for good
    pub async fn ack(&self, message_id: i64) -> CoffeyResult<()> {
        sqlx::query("DELETE FROM bookmark_queue WHERE id = ?1")
            .bind(message_id)
            .execute(&self.db)
            .await
            .map_err(CoffeyError::Database)?;

        Ok(())
    }

    /// Messages currently queued, due or not
    pub async fn pending_count(&self) -> CoffeyResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM bookmark_queue")
            .fetch_one(&self.db)
            .await
            .map_err(CoffeyError::Database)?;
        Ok(row.try_get("n")?)
    }
}

/// Transient tracking record driving the bounded artifact retry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub external_id: i64,
    pub collection_id: i64,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn new(external_id: i64, collection_id: i64) -> Self {
        Self {
            external_id,
            collection_id,
            created_at: Utc::now(),
            retry_count: 0,
            last_attempt_at: None,
        }
    }
}

fn work_key(external_id: i64) -> String {
    format!("work:{}", external_id)
}

/// KV-with-TTL store for work items, keyed `work:{external_id}`.
///
/// The expiry is a fixed multi-day window independent of retry count;
/// expired entries read as absent.
#[derive(Clone)]
pub struct WorkTracker {
    db: SqlitePool,
    ttl: Duration,
}

impl WorkTracker {
    pub fn new(db: SqlitePool, ttl_secs: u64) -> Self {
        Self {
            db,
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Insert or replace a work item, resetting its expiry window
    pub async fn put(&self, item: &WorkItem) -> CoffeyResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO bookmark_work
                (work_key, external_id, collection_id, created_at, retry_count, last_attempt_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(work_key(item.external_id))
        .bind(item.external_id)
        .bind(item.collection_id)
        .bind(item.created_at)
        .bind(item.retry_count)
        .bind(item.last_attempt_at)
        .bind(Utc::now() + self.ttl)
        .execute(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        Ok(())
    }

    /// Look up a live work item; expired entries read as absent
    pub async fn get(&self, external_id: i64) -> CoffeyResult<Option<WorkItem>> {
        let row = sqlx::query(
            r#"
            SELECT external_id, collection_id, created_at, retry_count, last_attempt_at
            FROM bookmark_work
            WHERE work_key = ?1 AND expires_at > ?2
            "#,
        )
        .bind(work_key(external_id))
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await
        .map_err(CoffeyError::Database)?;

        row.map(|row| {
            Ok(WorkItem {
                external_id: row.try_get("external_id")?,
                collection_id: row.try_get("collection_id")?,
                created_at: row.try_get("created_at")?,
                retry_count: row.try_get::<i64, _>("retry_count")? as u32,
                last_attempt_at: row.try_get("last_attempt_at")?,
            })
        })
        .transpose()
    }

    pub async fn delete(&self, external_id: i64) -> CoffeyResult<()> {
        sqlx::query("DELETE FROM bookmark_work WHERE work_key = ?1")
            .bind(work_key(external_id))
            .execute(&self.db)
            .await
            .map_err(CoffeyError::Database)?;

        Ok(())
    }

    /// Drop entries past their expiry; run periodically
    pub async fn purge_expired(&self) -> CoffeyResult<u64> {
        let result = sqlx::query("DELETE FROM bookmark_work WHERE expires_at <= ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(CoffeyError::Database)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::index::testing::memory_pool;

    #[tokio::test]
    async fn test_delayed_message_is_not_due_early() {
        let queue = DelayedQueue::new(memory_pool().await, 600);

        queue.send(1, 10, Duration::hours(2)).await.unwrap();
        assert!(queue.pop_due().await.unwrap().is_none());
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_due_message_delivery_and_ack() {
        let queue = DelayedQueue::new(memory_pool().await, 600);

        queue.send(7, 3, Duration::seconds(-1)).await.unwrap();
        let message = queue.pop_due().await.unwrap().unwrap();
        assert_eq!(message.external_id, 7);
        assert_eq!(message.collection_id, 3);
        assert_eq!(message.attempts, 1);

        // Leased: not due again until the redelivery delay passes
        assert!(queue.pop_due().await.unwrap().is_none());

        queue.ack(message.id).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unacked_message_is_redelivered() {
        // Zero redelivery delay makes the lease expire immediately
        let queue = DelayedQueue::new(memory_pool().await, 0);

        queue.send(7, 3, Duration::seconds(-1)).await.unwrap();
        let first = queue.pop_due().await.unwrap().unwrap();
        assert_eq!(first.attempts, 1);

        // Never acked; the queue's native retry layer hands it back
        let second = queue.pop_due().await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.attempts, 2);
    }

    #[tokio::test]
    async fn test_work_item_roundtrip_and_delete() {
        let tracker = WorkTracker::new(memory_pool().await, 3600);

        let item = WorkItem::new(42, 7);
        tracker.put(&item).await.unwrap();

        let loaded = tracker.get(42).await.unwrap().unwrap();
        assert_eq!(loaded.external_id, 42);
        assert_eq!(loaded.collection_id, 7);
        assert_eq!(loaded.retry_count, 0);
        assert!(loaded.last_attempt_at.is_none());

        tracker.delete(42).await.unwrap();
        assert!(tracker.get(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_work_item_reads_as_absent() {
        let pool = memory_pool().await;
        let tracker = WorkTracker::new(pool.clone(), 0);

        tracker.put(&WorkItem::new(42, 7)).await.unwrap();
        assert!(tracker.get(42).await.unwrap().is_none());

        // Still physically present until purged
        assert_eq!(tracker.purge_expired().await.unwrap(), 1);
        assert_eq!(tracker.purge_expired().await.unwrap(), 0);
    }
}
