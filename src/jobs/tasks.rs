/// Background task implementations
use crate::{
    bookmarks::{sync::SyncReport, BookmarkSync, BookmarkWorker},
    context::AppContext,
    error::CoffeyResult,
};

/// Upper bound on messages handled per consumer tick
const DRAIN_BATCH_LIMIT: u32 = 50;

/// One bookmark sync producer pass
pub async fn run_bookmark_sync(ctx: &AppContext) -> CoffeyResult<SyncReport> {
    let sync = BookmarkSync::new(
        ctx.bookmark_source.clone(),
        ctx.store.index().clone(),
        ctx.queue.clone(),
        ctx.work_tracker.clone(),
        ctx.config.sync.clone(),
    );

    sync.run_once().await
}

/// Process due queue messages until the queue is drained or the batch
/// limit is reached
pub async fn drain_due_messages(ctx: &AppContext) -> CoffeyResult<u32> {
    let worker = BookmarkWorker::new(
        ctx.bookmark_source.clone(),
        ctx.store.clone(),
        ctx.queue.clone(),
        ctx.work_tracker.clone(),
        ctx.config.sync.clone(),
    );

    let mut handled = 0;
    while handled < DRAIN_BATCH_LIMIT && worker.poll_once().await? {
        handled += 1;
    }

    Ok(handled)
}

/// Drop work items past their TTL
pub async fn purge_expired_work(ctx: &AppContext) -> CoffeyResult<u64> {
    ctx.work_tracker.purge_expired().await
}

/// Health check - verify the index database is reachable
pub async fn health_check(ctx: &AppContext) -> CoffeyResult<()> {
    crate::db::test_connection(&ctx.db).await
}
