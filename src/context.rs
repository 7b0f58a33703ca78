/// Application context and dependency injection
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    blob_store::{BlobBackend, DiskBlobBackend},
    bookmarks::{BookmarkSource, DelayedQueue, RaindropClient, WorkTracker},
    config::{BlobstoreConfig, ServerConfig},
    db,
    enrichment::Enricher,
    error::{CoffeyError, CoffeyResult},
    images::pipeline::ImagePipeline,
    images::uploader::HostedImageClient,
    store::{ContentStore, Index},
};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub store: ContentStore,
    pub enricher: Arc<Enricher>,
    pub image_pipeline: Arc<ImagePipeline>,
    pub bookmark_source: Arc<dyn BookmarkSource>,
    pub queue: DelayedQueue,
    pub work_tracker: WorkTracker,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> CoffeyResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.index_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let blobs: Arc<dyn BlobBackend> = match &config.storage.blobstore {
            BlobstoreConfig::Disk { location } => {
                Arc::new(DiskBlobBackend::new(location.clone()))
            }
        };

        let index = Index::new(pool.clone());
        let store = ContentStore::new(index.clone(), blobs.clone());

        let enricher = Arc::new(Enricher::from_config(&config)?);

        let client = reqwest::Client::builder()
            .user_agent(&config.service.user_agent)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CoffeyError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let image_host = Arc::new(HostedImageClient::new(
            client.clone(),
            config.image_host.account_id.clone(),
            config.image_host.api_token.clone(),
        ));
        let image_pipeline = Arc::new(ImagePipeline::new(
            index,
            blobs,
            image_host,
            enricher.clone(),
            config.service.image_upload_limit,
        ));

        let bookmark_source: Arc<dyn BookmarkSource> = Arc::new(RaindropClient::new(
            client,
            config.providers.bookmark_api_token.clone(),
        )?);

        let queue = DelayedQueue::new(pool.clone(), config.sync.redelivery_delay_secs);
        let work_tracker = WorkTracker::new(pool.clone(), config.sync.work_item_ttl_secs);

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            store,
            enricher,
            image_pipeline,
            bookmark_source,
            queue,
            work_tracker,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> CoffeyResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory)
            .await
            .map_err(|e| {
                CoffeyError::Internal(format!(
                    "Failed to create directory {:?}: {}",
                    config.storage.data_directory, e
                ))
            })?;

        let BlobstoreConfig::Disk { location } = &config.storage.blobstore;
        tokio::fs::create_dir_all(location).await?;

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
