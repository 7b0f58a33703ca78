/// Image record data types
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    enrichment::{
        elevation::ElevationSummary, geocoding::GeocodingSummary, places::NearbyPlacesSummary,
        snapshot::ApiSnapshot, weather::WeatherSummary,
    },
    records::Coordinates,
};

/// Basic file facts, always present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub size: u64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Camera metadata pulled from EXIF, all best-effort
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time_original: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_number: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
}

impl ExifInfo {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// Environmental enrichment attached to an image (capture-time context)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageEnvironment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geocoding: Option<ApiSnapshot<GeocodingSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<ApiSnapshot<ElevationSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<ApiSnapshot<WeatherSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearby_places: Option<ApiSnapshot<NearbyPlacesSummary>>,
}

impl ImageEnvironment {
    pub fn is_empty(&self) -> bool {
        self.geocoding.is_none()
            && self.elevation.is_none()
            && self.weather.is_none()
            && self.nearby_places.is_none()
    }
}

/// Extracted metadata for an uploaded image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub file: FileInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifInfo>,
}

/// The `data` of an image envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub file: FileInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifInfo>,
    /// Hosted-image provider id for the uploaded original
    pub host_uuid: String,
    pub original_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<ImageEnvironment>,
}

/// Response to an image upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadImageResponse {
    pub object_key: String,
    pub uuid: String,
    pub sha256: String,
    pub metadata: ImageMetadata,
    pub uploaded_at: DateTime<Utc>,
    pub is_duplicate: bool,
}
