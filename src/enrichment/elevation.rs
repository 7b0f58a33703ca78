/// Elevation enrichment via the Google Elevation API
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    enrichment::snapshot::{ApiSnapshot, ProviderInfo},
    error::{CoffeyError, CoffeyResult},
    records::Coordinates,
};

const PROVIDER: &str = "google-elevation";

const METERS_TO_FEET: f64 = 3.28084;

/// Normalized elevation summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationSummary {
    pub lat: f64,
    pub lng: f64,
    pub elevation_ft: f64,
}

#[async_trait]
pub trait ElevationSource: Send + Sync {
    async fn fetch(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<ElevationSummary>>;
}

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    #[serde(default)]
    results: Vec<ElevationResult>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ElevationResult {
    elevation: f64,
}

/// Google Elevation adapter
pub struct GoogleElevation {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GoogleElevation {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl ElevationSource for GoogleElevation {
    async fn fetch(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<ElevationSummary>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("GOOGLE_API_KEY not configured".to_string())
        })?;

        let url = format!(
            "https://maps.googleapis.com/maps/api/elevation/json?locations={},{}&key={}",
            coords.lat, coords.lng, api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::provider_status(PROVIDER, status.as_u16(), body));
        }

        let data: ElevationResponse = response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        if data.status != "OK" {
            return Err(CoffeyError::provider_status(
                PROVIDER,
                status.as_u16(),
                format!("Elevation lookup returned status {}", data.status),
            ));
        }

        let elevation_m = data
            .results
            .first()
            .map(|r| r.elevation)
            .ok_or_else(|| {
                CoffeyError::provider_status(
                    PROVIDER,
                    status.as_u16(),
                    "No elevation result".to_string(),
                )
            })?;

        Ok(ApiSnapshot::now(
            ProviderInfo::new("google", "elevation", "v1"),
            ElevationSummary {
                lat: coords.lat,
                lng: coords.lng,
                elevation_ft: elevation_m * METERS_TO_FEET,
            },
        ))
    }
}
