use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

use crate::metrics;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        if self.context.config.sync.enabled {
            tokio::spawn(Self::bookmark_sync_job(Arc::clone(&self)));
            tokio::spawn(Self::queue_consumer_job(Arc::clone(&self)));
            tokio::spawn(Self::work_item_purge_job(Arc::clone(&self)));
        } else {
            info!("Bookmark sync disabled, skipping sync jobs");
        }

        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Bookmark sync producer (interval from configuration, hourly default)
    async fn bookmark_sync_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(
            scheduler.context.config.sync.interval_secs,
        ));

        loop {
            interval.tick().await;
            info!("Running bookmark sync");

            match tasks::run_bookmark_sync(&scheduler.context).await {
                Ok(report) => {
                    metrics::record_background_job("bookmark_sync", "ok");
                    if report.discovered > 0 {
                        info!("Bookmark sync discovered {} new items", report.discovered);
                    }
                }
                Err(e) => {
                    metrics::record_background_job("bookmark_sync", "error");
                    error!("Bookmark sync failed: {}", e);
                }
            }
        }
    }

    /// Queue consumer poll (short interval)
    async fn queue_consumer_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(
            scheduler.context.config.sync.poll_interval_secs,
        ));

        loop {
            interval.tick().await;

            match tasks::drain_due_messages(&scheduler.context).await {
                Ok(handled) => {
                    if handled > 0 {
                        info!("Processed {} bookmark queue messages", handled);
                    }
                }
                Err(e) => {
                    metrics::record_background_job("queue_consumer", "error");
                    error!("Queue consumer failed: {}", e);
                }
            }
        }
    }

    /// Expired work-item purge (runs daily)
    async fn work_item_purge_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(86400));

        loop {
            interval.tick().await;
            info!("Running work-item purge");

            match tasks::purge_expired_work(&scheduler.context).await {
                Ok(count) => {
                    metrics::record_background_job("work_purge", "ok");
                    if count > 0 {
                        info!("Purged {} expired work items", count);
                    }
                }
                Err(e) => {
                    metrics::record_background_job("work_purge", "error");
                    error!("Work-item purge failed: {}", e);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}
