/// Pollen enrichment via the Google Pollen API
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    enrichment::snapshot::{ApiSnapshot, ProviderInfo},
    error::{CoffeyError, CoffeyResult},
    records::Coordinates,
};

const PROVIDER: &str = "google-pollen";

/// Normalized pollen summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollenSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_overall: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grass_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grass_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weed_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weed_category: Option<String>,
}

#[async_trait]
pub trait PollenSource: Send + Sync {
    async fn fetch(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<PollenSummary>>;
}

#[derive(Debug, Deserialize)]
struct PollenResponse {
    #[serde(rename = "dailyInfo", default)]
    daily_info: Vec<DailyInfo>,
}

#[derive(Debug, Deserialize)]
struct DailyInfo {
    date: Option<PollenDate>,
    #[serde(rename = "pollenTypeInfo", default)]
    pollen_type_info: Vec<PollenTypeInfo>,
}

#[derive(Debug, Deserialize)]
struct PollenDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PollenTypeInfo {
    code: String,
    #[serde(rename = "indexInfo")]
    index_info: Option<IndexInfo>,
}

#[derive(Debug, Deserialize)]
struct IndexInfo {
    value: Option<u32>,
    category: Option<String>,
}

/// Google Pollen adapter
pub struct GooglePollen {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GooglePollen {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl PollenSource for GooglePollen {
    async fn fetch(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<PollenSummary>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("GOOGLE_API_KEY not configured".to_string())
        })?;

        let url = format!(
            "https://pollen.googleapis.com/v1/forecast:lookup?location.latitude={}&location.longitude={}&days=1&key={}",
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

        let data: PollenResponse = response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let today = data.daily_info.into_iter().next();
        let mut summary = PollenSummary::default();

        if let Some(day) = today {
            if let Some(date) = day.date {
                if let (Some(y), Some(m), Some(d)) = (date.year, date.month, date.day) {
                    summary.date = Some(format!("{:04}-{:02}-{:02}", y, m, d));
                }
            }

            for info in day.pollen_type_info {
                let value = info.index_info.as_ref().and_then(|i| i.value);
                let category = info.index_info.as_ref().and_then(|i| i.category.clone());
                match info.code.as_str() {
                    "TREE" => {
                        summary.tree_index = value;
                        summary.tree_category = category;
                    }
                    "GRASS" => {
                        summary.grass_index = value;
                        summary.grass_category = category;
                    }
                    "WEED" => {
                        summary.weed_index = value;
                        summary.weed_category = category;
                    }
                    _ => {}
                }
            }

            // Overall index is the worst of the per-type indexes
            summary.index_overall = [summary.tree_index, summary.grass_index, summary.weed_index]
                .into_iter()
                .flatten()
                .max();
            summary.index_category = match summary.index_overall {
                Some(i) if i == summary.tree_index.unwrap_or(u32::MAX) => {
                    summary.tree_category.clone()
                }
                Some(i) if i == summary.grass_index.unwrap_or(u32::MAX) => {
                    summary.grass_category.clone()
                }
                Some(_) => summary.weed_category.clone(),
                None => None,
            };
        }

        Ok(ApiSnapshot::now(
            ProviderInfo::new("google", "pollen", "v1"),
            summary,
        ))
    }
}
