/// Configuration management for Coffey
use crate::error::{CoffeyError, CoffeyResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub providers: ProviderConfig,
    pub image_host: ImageHostConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    pub user_agent: String,
    pub image_upload_limit: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub index_db: PathBuf,
    pub blobstore: BlobstoreConfig,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlobstoreConfig {
    Disk { location: PathBuf },
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token granting access to the admin endpoints
    pub admin_token: String,
}

/// Third-party enrichment provider credentials
///
/// Every adapter requires exactly one key; a `None` here surfaces as a
/// configuration error when that adapter is invoked, never as a silent skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub google_api_key: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub bookmark_api_token: Option<String>,
}

/// Hosted-image provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHostConfig {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    /// Base URL images are served from, e.g. https://imagedelivery.net/{account_hash}
    pub delivery_base_url: String,
}

/// Bookmark sync and retry-queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Newest-items page size checked by the producer
    pub page_size: u32,
    /// Producer run interval in seconds
    pub interval_secs: u64,
    /// Explicit artifact-retry ceiling (distinct from queue redelivery)
    pub max_retries: u32,
    /// Fixed delay between artifact retries, in seconds
    pub retry_delay_secs: u64,
    /// Work-item TTL in seconds, independent of retry count
    pub work_item_ttl_secs: u64,
    /// Initial enqueue jitter bounds, in hours
    pub jitter_min_hours: u64,
    pub jitter_max_hours: u64,
    /// Consumer poll interval in seconds
    pub poll_interval_secs: u64,
    /// Queue-native redelivery delay after a processing error, in seconds
    pub redelivery_delay_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CoffeyResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("COFFEY_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("COFFEY_PORT")
            .unwrap_or_else(|_| "8787".to_string())
            .parse()
            .map_err(|_| CoffeyError::Validation("Invalid port number".to_string()))?;

        let version = env::var("COFFEY_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let user_agent = env::var("COFFEY_USER_AGENT")
            .unwrap_or_else(|_| "Mozilla/5.0 (compatible; CoffeyBot/1.0)".to_string());
        let image_upload_limit = env_parse("COFFEY_IMAGE_UPLOAD_LIMIT", 10_485_760usize);

        let data_directory: PathBuf = env::var("COFFEY_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let index_db = env::var("COFFEY_INDEX_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("index.sqlite"));
        let blobstore = BlobstoreConfig::Disk {
            location: env::var("COFFEY_BLOBSTORE_DISK_LOCATION")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_directory.join("blobs")),
        };

        let admin_token = env::var("COFFEY_ADMIN_TOKEN")
            .map_err(|_| CoffeyError::Validation("Admin token required".to_string()))?;

        let providers = ProviderConfig {
            google_api_key: env::var("COFFEY_GOOGLE_API_KEY").ok(),
            tmdb_api_key: env::var("COFFEY_TMDB_API_KEY").ok(),
            bookmark_api_token: env::var("COFFEY_RAINDROP_TOKEN").ok(),
        };

        let image_host = ImageHostConfig {
            account_id: env::var("COFFEY_IMAGES_ACCOUNT_ID").ok(),
            api_token: env::var("COFFEY_IMAGES_API_TOKEN").ok(),
            delivery_base_url: env::var("COFFEY_IMAGES_DELIVERY_URL")
                .unwrap_or_else(|_| "https://imagedelivery.net".to_string()),
        };

        let sync = SyncConfig {
            enabled: env_parse("COFFEY_SYNC_ENABLED", false),
            page_size: env_parse("COFFEY_SYNC_PAGE_SIZE", 50u32),
            interval_secs: env_parse("COFFEY_SYNC_INTERVAL_SECS", 3600u64),
            max_retries: env_parse("COFFEY_SYNC_MAX_RETRIES", 14u32),
            retry_delay_secs: env_parse("COFFEY_SYNC_RETRY_DELAY_SECS", 43_200u64),
            work_item_ttl_secs: env_parse("COFFEY_SYNC_WORK_TTL_SECS", 60 * 60 * 24 * 14),
            jitter_min_hours: env_parse("COFFEY_SYNC_JITTER_MIN_HOURS", 1u64),
            jitter_max_hours: env_parse("COFFEY_SYNC_JITTER_MAX_HOURS", 11u64),
            poll_interval_secs: env_parse("COFFEY_SYNC_POLL_INTERVAL_SECS", 30u64),
            redelivery_delay_secs: env_parse("COFFEY_SYNC_REDELIVERY_DELAY_SECS", 600u64),
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                user_agent,
                image_upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                index_db,
                blobstore,
            },
            authentication: AuthConfig { admin_token },
            providers,
            image_host,
            sync,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CoffeyResult<()> {
        if self.service.hostname.is_empty() {
            return Err(CoffeyError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.admin_token.len() < 16 {
            return Err(CoffeyError::Validation(
                "Admin token must be at least 16 characters".to_string(),
            ));
        }

        if self.sync.jitter_min_hours > self.sync.jitter_max_hours {
            return Err(CoffeyError::Validation(
                "Sync jitter minimum exceeds maximum".to_string(),
            ));
        }

        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.service.hostname, self.service.port)
    }
}
