/// Reverse geocoding via the Google Geocoding API
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    enrichment::snapshot::{ApiSnapshot, ProviderInfo},
    error::{CoffeyError, CoffeyResult},
    records::Coordinates,
};

const PROVIDER: &str = "google-geocoding";

/// Normalized reverse-geocode summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodingSummary {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
}

#[async_trait]
pub trait GeocodingSource: Send + Sync {
    async fn reverse(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<GeocodingSummary>>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

/// Google reverse-geocoding adapter
pub struct GoogleGeocoding {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GoogleGeocoding {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

fn component<'a>(
    components: &'a [AddressComponent],
    kind: &str,
) -> Option<&'a AddressComponent> {
    components.iter().find(|c| c.types.iter().any(|t| t == kind))
}

#[async_trait]
impl GeocodingSource for GoogleGeocoding {
    async fn reverse(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<GeocodingSummary>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("GOOGLE_API_KEY not configured".to_string())
        })?;

        let url = format!(
            "https://maps.googleapis.com/maps/api/geocode/json?latlng={},{}&key={}",
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

        let data: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        if data.status != "OK" {
            return Err(CoffeyError::provider_status(
                PROVIDER,
                status.as_u16(),
                format!("Geocode returned status {}", data.status),
            ));
        }

        let best = data.results.into_iter().next().ok_or_else(|| {
            CoffeyError::provider_status(PROVIDER, status.as_u16(), "No geocode result".to_string())
        })?;

        let c = &best.address_components;
        let summary = GeocodingSummary {
            lat: coords.lat,
            lng: coords.lng,
            formatted_address: best.formatted_address.clone(),
            country_code: component(c, "country").map(|x| x.short_name.clone()),
            country_name: component(c, "country").map(|x| x.long_name.clone()),
            region_code: component(c, "administrative_area_level_1").map(|x| x.short_name.clone()),
            region_name: component(c, "administrative_area_level_1").map(|x| x.long_name.clone()),
            locality: component(c, "locality").map(|x| x.long_name.clone()),
            postal_code: component(c, "postal_code").map(|x| x.long_name.clone()),
            neighborhood: component(c, "neighborhood").map(|x| x.long_name.clone()),
            street_name: component(c, "route").map(|x| x.long_name.clone()),
            street_number: component(c, "street_number").map(|x| x.long_name.clone()),
        };

        Ok(ApiSnapshot::now(
            ProviderInfo::new("google", "geocoding", "v1"),
            summary,
        ))
    }
}
