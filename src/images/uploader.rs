/// Hosted-image provider client
///
/// The original file is pushed to a hosted-images service; only the record
/// snapshot and index row stay local. Upload is the one irreversible side
/// effect on the image path, so the pipeline dedup-checks before calling in.
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{CoffeyError, CoffeyResult};

/// Seam for the hosted-image provider
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload an original; returns the provider's id for the image
    async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
        metadata: serde_json::Value,
    ) -> CoffeyResult<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    success: bool,
    result: Option<UploadResult>,
    #[serde(default)]
    errors: Vec<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadResult {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: String,
}

/// Cloudflare-Images-style HTTP uploader
pub struct HostedImageClient {
    client: reqwest::Client,
    account_id: Option<String>,
    api_token: Option<String>,
}

impl HostedImageClient {
    pub fn new(client: reqwest::Client, account_id: Option<String>, api_token: Option<String>) -> Self {
        Self {
            client,
            account_id,
            api_token,
        }
    }
}

#[async_trait]
impl ImageHost for HostedImageClient {
    async fn upload(
        &self,
        data: Vec<u8>,
        filename: &str,
        content_type: &str,
        metadata: serde_json::Value,
    ) -> CoffeyResult<String> {
        let api_token = self.api_token.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("IMAGES_API_TOKEN not configured".to_string())
        })?;
        let account_id = self.account_id.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("IMAGES_ACCOUNT_ID not configured".to_string())
        })?;

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| CoffeyError::Upload(format!("Invalid content type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("requireSignedURLs", "true")
            .text("metadata", metadata.to_string());

        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/images/v1",
            account_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CoffeyError::Upload(format!("Image upload request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::Upload(format!(
                "Image upload failed: {} {}",
                status, body
            )));
        }

        let result: UploadResponse = response
            .json()
            .await
            .map_err(|e| CoffeyError::Upload(format!("Invalid upload response: {}", e)))?;

        match (result.success, result.result) {
            (true, Some(upload)) => Ok(upload.id),
            _ => {
                let message = result
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(CoffeyError::Upload(format!(
                    "Image upload rejected: {}",
                    if message.is_empty() {
                        "Unknown error"
                    } else {
                        &message
                    }
                )))
            }
        }
    }
}
