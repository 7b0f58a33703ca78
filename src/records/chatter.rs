/// Chatter request and record data types
use serde::{Deserialize, Serialize};

use crate::{
    enrichment::{
        air_quality::AirQualitySummary,
        elevation::ElevationSummary,
        geocoding::GeocodingSummary,
        media::{MediaSummary, MediaType},
        places::{NearbyPlacesSummary, PlaceSummary},
        snapshot::ApiSnapshot,
        weather::WeatherSummary,
    },
    enrichment::pollen::PollenSummary,
    error::{CoffeyError, CoffeyResult},
    records::Coordinates,
};

/// Device GPS fix supplied by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHint {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

/// A place reference: either a provider id to resolve, or fully manual fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_ids: Option<std::collections::BTreeMap<String, String>>,
}

impl PlaceInput {
    /// The Google Places id, when one was supplied
    pub fn google_place_id(&self) -> Option<&str> {
        self.provider_ids
            .as_ref()
            .and_then(|ids| ids.get("google_places"))
            .map(String::as_str)
    }

    pub fn has_manual_fields(&self) -> bool {
        self.name.is_some()
            && self.formatted_address.is_some()
            && self.short_address.is_some()
            && self.location.is_some()
    }

    /// A place must carry either a resolvable provider id or the full manual
    /// field set; anything in between is rejected before enrichment starts.
    pub fn validate(&self) -> CoffeyResult<()> {
        if self.google_place_id().is_some() || self.has_manual_fields() {
            Ok(())
        } else {
            Err(CoffeyError::Validation(
                "Place must provide either provider_ids.google_places or all manual fields \
                 (name, formatted_address, short_address, location)"
                    .to_string(),
            ))
        }
    }
}

/// A referenced URL with optional preview metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Links arrive in flexible form: one URL, a list of URLs, or link objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkInput {
    Single(String),
    Urls(Vec<String>),
    Objects(Vec<Link>),
}

impl LinkInput {
    /// Normalize any accepted input shape to link objects
    pub fn normalize(self) -> Vec<Link> {
        match self {
            LinkInput::Single(url) => vec![Link {
                url,
                ..Default::default()
            }],
            LinkInput::Urls(urls) => urls
                .into_iter()
                .map(|url| Link {
                    url,
                    ..Default::default()
                })
                .collect(),
            LinkInput::Objects(links) => links,
        }
    }
}

/// Watched movie/TV reference, by id or by title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedInput {
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_title: Option<String>,
}

/// Client request to create a chatter
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChatterRequest {
    #[serde(default)]
    pub content: Option<String>,
    /// Private comment/note about this chatter
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Object keys from the image upload endpoint
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub links: Option<LinkInput>,
    #[serde(default)]
    pub publish: Option<bool>,
    #[serde(default)]
    pub location_hint: Option<LocationHint>,
    #[serde(default)]
    pub place: Option<PlaceInput>,
    #[serde(default)]
    pub watched: Option<WatchedInput>,
    /// Backdating support for imports
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Merged enrichment results, keyed by category.
///
/// A missing key means the provider failed or was not applicable; there is
/// never a placeholder error value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geocoding: Option<ApiSnapshot<GeocodingSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<ApiSnapshot<ElevationSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<ApiSnapshot<WeatherSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_quality: Option<ApiSnapshot<AirQualitySummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pollen: Option<ApiSnapshot<PollenSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearby_places: Option<ApiSnapshot<NearbyPlacesSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<ApiSnapshot<PlaceSummary>>,
}

impl Environment {
    pub fn is_empty(&self) -> bool {
        self.geocoding.is_none()
            && self.elevation.is_none()
            && self.weather.is_none()
            && self.air_quality.is_none()
            && self.pollen.is_none()
            && self.nearby_places.is_none()
            && self.place.is_none()
    }
}

/// Enriched chatter payload, the `data` of a chatter envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatterData {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    pub publish: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<LocationHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<PlaceInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched: Option<ApiSnapshot<MediaSummary>>,
}
