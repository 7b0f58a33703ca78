/// Air quality enrichment via the Google Air Quality API
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    enrichment::snapshot::{ApiSnapshot, ProviderInfo},
    error::{CoffeyError, CoffeyResult},
    records::Coordinates,
};

const PROVIDER: &str = "google-air-quality";

/// Normalized air quality summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aqi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aqi_scale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aqi_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_pollutant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm25_ugm3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10_ugm3: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o3_ppb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no2_ppb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub so2_ppb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co_ppm: Option<f64>,
}

#[async_trait]
pub trait AirQualitySource: Send + Sync {
    async fn fetch(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<AirQualitySummary>>;
}

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    #[serde(default)]
    indexes: Vec<AqIndex>,
    #[serde(default)]
    pollutants: Vec<Pollutant>,
}

#[derive(Debug, Deserialize)]
struct AqIndex {
    aqi: Option<f64>,
    category: Option<String>,
    #[serde(rename = "dominantPollutant")]
    dominant_pollutant: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pollutant {
    code: String,
    concentration: Option<Concentration>,
}

#[derive(Debug, Deserialize)]
struct Concentration {
    value: Option<f64>,
}

/// Google Air Quality adapter
pub struct GoogleAirQuality {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GoogleAirQuality {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl AirQualitySource for GoogleAirQuality {
    async fn fetch(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<AirQualitySummary>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("GOOGLE_API_KEY not configured".to_string())
        })?;

        let url = format!(
            "https://airquality.googleapis.com/v1/currentConditions:lookup?key={}",
            api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "location": { "latitude": coords.lat, "longitude": coords.lng },
                "universalAqi": true,
            }))
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::provider_status(PROVIDER, status.as_u16(), body));
        }

        let data: AirQualityResponse = response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let mut summary = AirQualitySummary {
            aqi: data.indexes.first().and_then(|i| i.aqi),
            aqi_scale: Some("US EPA".to_string()),
            aqi_category: data.indexes.first().and_then(|i| i.category.clone()),
            dominant_pollutant: data
                .indexes
                .first()
                .and_then(|i| i.dominant_pollutant.clone()),
            ..Default::default()
        };

        for pollutant in &data.pollutants {
            let concentration = pollutant.concentration.as_ref().and_then(|c| c.value);
            match pollutant.code.as_str() {
                "pm25" => summary.pm25_ugm3 = concentration,
                "pm10" => summary.pm10_ugm3 = concentration,
                "o3" => summary.o3_ppb = concentration,
                "no2" => summary.no2_ppb = concentration,
                "so2" => summary.so2_ppb = concentration,
                "co" => summary.co_ppm = concentration,
                _ => {}
            }
        }

        Ok(ApiSnapshot::now(
            ProviderInfo::new("google", "air_quality", "v1"),
            summary,
        ))
    }
}
