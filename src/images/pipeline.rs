/// Image upload pipeline
///
/// Content hash is computed from the raw file bytes before any other work.
/// A hash already present in the index short-circuits the whole pipeline:
/// no metadata extraction, no enrichment, and no second call to the upload
/// provider. Only a cache miss proceeds to the expensive steps.
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    blob_store::{image_json_key, BlobBackend},
    canonical,
    enrichment::Enricher,
    error::{CoffeyError, CoffeyResult},
    images::{extract_metadata, uploader::ImageHost, ALLOWED_IMAGE_TYPES},
    metrics,
    records::image::{ImageData, ImageMetadata, UploadImageResponse},
    records::{assemble_with_hash, RecordKind},
    store::index::Index,
};

pub struct ImagePipeline {
    index: Index,
    blobs: Arc<dyn BlobBackend>,
    host: Arc<dyn ImageHost>,
    enricher: Arc<Enricher>,
    upload_limit: usize,
}

impl ImagePipeline {
    pub fn new(
        index: Index,
        blobs: Arc<dyn BlobBackend>,
        host: Arc<dyn ImageHost>,
        enricher: Arc<Enricher>,
        upload_limit: usize,
    ) -> Self {
        Self {
            index,
            blobs,
            host,
            enricher,
            upload_limit,
        }
    }

    pub async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> CoffeyResult<UploadImageResponse> {
        if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
            return Err(CoffeyError::Validation(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                ALLOWED_IMAGE_TYPES.join(", ")
            )));
        }

        if data.len() > self.upload_limit {
            return Err(CoffeyError::Validation(format!(
                "Image of {} bytes exceeds maximum of {} bytes",
                data.len(),
                self.upload_limit
            )));
        }

        // Hash the raw bytes before anything expensive
        let sha256 = canonical::hash_bytes(&data);

        if let Some(existing) = self.index.find_image(&sha256).await? {
            info!("Duplicate image upload for sha256 {}", sha256);
            metrics::record_dedup_hit("image");
            return Ok(UploadImageResponse {
                object_key: format!("images/sha_{}", sha256),
                uuid: existing.uuid,
                sha256,
                metadata: ImageMetadata::default(),
                uploaded_at: existing.created_at,
                is_duplicate: true,
            });
        }

        let metadata = extract_metadata(&data, content_type);

        // Capture-time enrichment, gated on EXIF GPS coordinates
        let environment = match metadata.exif.as_ref().and_then(|e| e.coordinates()) {
            Some(coords) => {
                let taken_at = metadata.exif.as_ref().and_then(|e| e.date_time_original);
                let env = self.enricher.enrich_image(coords, taken_at).await;
                if env.is_empty() {
                    None
                } else {
                    Some(env)
                }
            }
            None => None,
        };

        let uploaded_at = Utc::now();
        let host_metadata = build_host_metadata(filename, &sha256, &metadata, uploaded_at);

        // The irreversible step; a failure here persists nothing
        let uuid = self
            .host
            .upload(data, filename, content_type, host_metadata)
            .await?;

        let record_data = ImageData {
            file: metadata.file.clone(),
            exif: metadata.exif.clone(),
            host_uuid: uuid.clone(),
            original_filename: filename.to_string(),
            environment,
        };
        let envelope = assemble_with_hash(
            RecordKind::Image,
            record_data,
            sha256.clone(),
            Some(uploaded_at),
        );

        // Key date is the capture date when EXIF has one, else upload date
        let semantic_date = metadata
            .exif
            .as_ref()
            .and_then(|e| e.date_time_original)
            .unwrap_or(uploaded_at)
            .date_naive();
        let object_key = image_json_key(semantic_date, &sha256);

        // Metadata wins over the archival copy: a blob write failure does not
        // block the index insert, and neither rolls the other back
        match serde_json::to_vec_pretty(&envelope) {
            Ok(bytes) => {
                if let Err(e) = self.blobs.put(&object_key, bytes, "application/json").await {
                    error!("Failed to store image record blob {}: {}", object_key, e);
                }
            }
            Err(e) => error!("Failed to serialize image record: {}", e),
        }

        let date_taken = metadata
            .exif
            .as_ref()
            .and_then(|e| e.date_time_original)
            .map(|d| d.to_rfc3339());
        if let Err(e) = self
            .index
            .insert_image(&sha256, &uuid, filename, date_taken.as_deref(), uploaded_at)
            .await
        {
            error!("Failed to insert image index row for {}: {}", sha256, e);
        }

        metrics::record_created("image");

        Ok(UploadImageResponse {
            object_key: format!("images/sha_{}", sha256),
            uuid,
            sha256,
            metadata,
            uploaded_at,
            is_duplicate: false,
        })
    }
}

fn build_host_metadata(
    filename: &str,
    sha256: &str,
    metadata: &ImageMetadata,
    uploaded_at: chrono::DateTime<Utc>,
) -> serde_json::Value {
    let mut map = json!({
        "uploaded-at": uploaded_at.to_rfc3339(),
        "original-filename": filename,
        "file-size": metadata.file.size.to_string(),
        "sha256": sha256,
    });

    if let Some(width) = metadata.file.width {
        map["width"] = json!(width.to_string());
    }
    if let Some(height) = metadata.file.height {
        map["height"] = json!(height.to_string());
    }
    if let Some(exif) = &metadata.exif {
        if let Some(make) = &exif.make {
            map["exif-make"] = json!(make);
        }
        if let Some(model) = &exif.model {
            map["exif-model"] = json!(model);
        }
        if let Some(taken) = &exif.date_time_original {
            map["exif-date-time-original"] = json!(taken.to_rfc3339());
        }
        if let Some(lat) = exif.latitude {
            map["exif-gps-latitude"] = json!(lat.to_string());
        }
        if let Some(lng) = exif.longitude {
            map["exif-gps-longitude"] = json!(lng.to_string());
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::DiskBlobBackend;
    use crate::enrichment::testing::TestProviders;
    use crate::store::index::testing::memory_pool;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingHost {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingHost {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ImageHost for CountingHost {
        async fn upload(
            &self,
            _data: Vec<u8>,
            _filename: &str,
            _content_type: &str,
            _metadata: serde_json::Value,
        ) -> CoffeyResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CoffeyError::Upload("host down".to_string()));
            }
            Ok(format!("host-uuid-{}", self.calls.load(Ordering::SeqCst)))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::new(10, 10);
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        buf
    }

    async fn test_pipeline(host: Arc<CountingHost>) -> (ImagePipeline, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let index = Index::new(memory_pool().await);
        let blobs = Arc::new(DiskBlobBackend::new(dir.path().to_path_buf()));
        let enricher = Arc::new(TestProviders::default().enricher());
        (
            ImagePipeline::new(index, blobs, host, enricher, 1024 * 1024),
            dir,
        )
    }

    #[tokio::test]
    async fn test_duplicate_upload_skips_host_call() {
        let host = Arc::new(CountingHost::new());
        let (pipeline, _dir) = test_pipeline(host.clone()).await;

        let data = png_bytes();
        let first = pipeline.upload(data.clone(), "photo.png", "image/png").await.unwrap();
        assert!(!first.is_duplicate);
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);

        let second = pipeline.upload(data, "photo.png", "image/png").await.unwrap();
        assert!(second.is_duplicate);
        assert_eq!(second.uuid, first.uuid);
        assert_eq!(second.sha256, first.sha256);
        // No second call to the upload provider
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_mime_type_rejected() {
        let host = Arc::new(CountingHost::new());
        let (pipeline, _dir) = test_pipeline(host.clone()).await;

        let err = pipeline
            .upload(b"x".to_vec(), "run.exe", "application/exe")
            .await
            .unwrap_err();
        assert!(matches!(err, CoffeyError::Validation(_)));
        assert_eq!(host.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let host = Arc::new(CountingHost::new());
        let dir = tempdir().unwrap();
        let index = Index::new(memory_pool().await);
        let blobs = Arc::new(DiskBlobBackend::new(dir.path().to_path_buf()));
        let enricher = Arc::new(TestProviders::default().enricher());
        let pipeline = ImagePipeline::new(index, blobs, host.clone(), enricher, 16);

        let err = pipeline
            .upload(vec![0u8; 64], "big.png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, CoffeyError::Validation(_)));
        assert_eq!(host.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_persists_nothing() {
        let host = Arc::new(CountingHost {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let (pipeline, _dir) = test_pipeline(host.clone()).await;

        let data = png_bytes();
        let sha256 = canonical::hash_bytes(&data);
        let err = pipeline.upload(data, "photo.png", "image/png").await.unwrap_err();
        assert!(matches!(err, CoffeyError::Upload(_)));

        // No partial record was persisted
        assert!(pipeline.index.find_image(&sha256).await.unwrap().is_none());
    }
}
