/// Bookmarking-service API client
///
/// Raindrop-style REST API behind a bearer token. The permanent-copy
/// endpoint answers with a 307 redirect to the archived file; the client
/// reads the Location header instead of following it, then downloads the
/// copy with a separate redirect-following client.
use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    error::{CoffeyError, CoffeyResult},
    records::bookmark::{BookmarkItem, Collection},
};

const PROVIDER: &str = "raindrop";

/// An archived full-content copy of a bookmarked page
#[derive(Debug, Clone)]
pub struct PermanentCopy {
    pub content: String,
    pub content_type: String,
}

/// Seam for the external bookmarking service
#[async_trait]
pub trait BookmarkSource: Send + Sync {
    /// Newest items across all collections, newest first
    async fn list_newest(&self, page_size: u32) -> CoffeyResult<Vec<BookmarkItem>>;

    /// Full detail for one item
    async fn fetch_item(&self, external_id: i64) -> CoffeyResult<BookmarkItem>;

    /// All collections, root and children
    async fn fetch_collections(&self) -> CoffeyResult<Vec<Collection>>;

    /// Download the archived copy of an item.
    ///
    /// `Ok(None)` means the service has no copy (or the copy is not ready
    /// yet); an `Err` is a transport failure. Both drive the retry path.
    async fn fetch_permanent_copy(&self, external_id: i64) -> CoffeyResult<Option<PermanentCopy>>;
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    item: BookmarkItem,
}

#[derive(Debug, Deserialize)]
struct ItemListResponse {
    items: Vec<BookmarkItem>,
}

#[derive(Debug, Deserialize)]
struct CollectionListResponse {
    items: Vec<Collection>,
}

/// HTTP client for the Raindrop API
pub struct RaindropClient {
    client: reqwest::Client,
    /// Same client but with redirects disabled, for the cache endpoint
    no_redirect: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl RaindropClient {
    pub fn new(client: reqwest::Client, token: Option<String>) -> CoffeyResult<Self> {
        Self::with_base_url(client, token, "https://api.raindrop.io/rest/v1".to_string())
    }

    pub fn with_base_url(
        client: reqwest::Client,
        token: Option<String>,
        base_url: String,
    ) -> CoffeyResult<Self> {
        let no_redirect = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CoffeyError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            no_redirect,
            token,
            base_url,
        })
    }

    fn token(&self) -> CoffeyResult<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| CoffeyError::Configuration("RAINDROP_TOKEN not configured".to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> CoffeyResult<T> {
        let token = self.token()?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::provider_status(PROVIDER, status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))
    }

    /// Resolve the redirect target of the permanent-copy endpoint without
    /// following it. 404/400 mean no copy exists.
    async fn permanent_copy_url(&self, external_id: i64) -> CoffeyResult<Option<String>> {
        let token = self.token()?;
        let url = format!("{}/raindrop/{}/cache", self.base_url, external_id);

        let response = self
            .no_redirect
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        match response.status().as_u16() {
            307 => Ok(response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .map(String::from)),
            400 | 404 => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CoffeyError::provider_status(PROVIDER, status, body))
            }
        }
    }
}

#[async_trait]
impl BookmarkSource for RaindropClient {
    async fn list_newest(&self, page_size: u32) -> CoffeyResult<Vec<BookmarkItem>> {
        let url = format!(
            "{}/raindrops/0?perpage={}&page=0&sort=-created",
            self.base_url, page_size
        );
        let response: ItemListResponse = self.get_json(&url).await?;
        Ok(response.items)
    }

    async fn fetch_item(&self, external_id: i64) -> CoffeyResult<BookmarkItem> {
        let url = format!("{}/raindrop/{}", self.base_url, external_id);
        let response: ItemResponse = self.get_json(&url).await?;
        Ok(response.item)
    }

    async fn fetch_collections(&self) -> CoffeyResult<Vec<Collection>> {
        let mut collections = Vec::new();

        let root: CollectionListResponse =
            self.get_json(&format!("{}/collections", self.base_url)).await?;
        collections.extend(root.items);

        let children: CollectionListResponse = self
            .get_json(&format!("{}/collections/childrens", self.base_url))
            .await?;
        collections.extend(children.items);

        Ok(collections)
    }

    async fn fetch_permanent_copy(&self, external_id: i64) -> CoffeyResult<Option<PermanentCopy>> {
        let copy_url = match self.permanent_copy_url(external_id).await? {
            Some(url) => url,
            None => return Ok(None),
        };

        let response = self
            .client
            .get(&copy_url)
            .send()
            .await
            .map_err(|e| CoffeyError::TransientFetch(format!("Artifact download failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoffeyError::TransientFetch(format!(
                "Artifact download returned {}",
                status
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        let content = response
            .text()
            .await
            .map_err(|e| CoffeyError::TransientFetch(format!("Artifact read failed: {}", e)))?;

        Ok(Some(PermanentCopy {
            content,
            content_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_configuration_error() {
        let client = RaindropClient::new(reqwest::Client::new(), None).unwrap();

        let err = client.list_newest(50).await.unwrap_err();
        assert!(matches!(err, CoffeyError::Configuration(_)));

        let err = client.fetch_permanent_copy(1).await.unwrap_err();
        assert!(matches!(err, CoffeyError::Configuration(_)));
    }

    #[test]
    fn test_item_response_parses_service_shape() {
        let raw = r#"{
            "item": {
                "_id": 987654321,
                "link": "https://example.com/article",
                "title": "An Article",
                "excerpt": "Summary text",
                "domain": "example.com",
                "type": "article",
                "tags": ["reading"],
                "created": "2025-01-15T08:30:00.000Z",
                "lastUpdate": "2025-01-16T10:00:00.000Z",
                "collection": {"$id": 42},
                "cache": {"status": "ready", "created": "2025-01-15T09:00:00.000Z"}
            }
        }"#;

        let parsed: ItemResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.item.id, 987654321);
        assert_eq!(parsed.item.collection.id, 42);
        assert!(parsed.item.cache_ready());
    }
}
