/// Place details and nearby-places enrichment via the Google Places API (v1)
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    enrichment::snapshot::{ApiSnapshot, ProviderInfo},
    error::{CoffeyError, CoffeyResult},
    records::Coordinates,
};

const PROVIDER: &str = "google-places";

/// Point-of-interest types included in nearby searches
const POI_TYPES: &[&str] = &[
    "tourist_attraction",
    "museum",
    "art_gallery",
    "park",
    "amusement_park",
    "aquarium",
    "zoo",
    "restaurant",
    "cafe",
    "bar",
    "shopping_mall",
    "store",
    "movie_theater",
    "performing_arts_theater",
    "night_club",
    "casino",
    "stadium",
    "church",
    "hindu_temple",
    "mosque",
    "synagogue",
];

const NEARBY_FIELD_MASK: &str =
    "places.id,places.displayName,places.formattedAddress,places.location,places.types";

const DETAILS_FIELD_MASK: &str = "id,displayName,formattedAddress,location,types,websiteUri,nationalPhoneNumber,rating,userRatingCount,priceLevel";

/// Normalized place-details summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceSummary {
    pub name: String,
    pub formatted_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maps_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_rating_count: Option<u32>,
}

/// One nearby result with its great-circle distance from the query point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlaceSummary {
    pub name: String,
    pub formatted_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub distance_m: i64,
    pub place_id: Option<String>,
    pub maps_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
}

/// Normalized nearby-places summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlacesSummary {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: u32,
    pub places: Vec<NearbyPlaceSummary>,
}

#[async_trait]
pub trait PlaceDetailsSource: Send + Sync {
    async fn fetch(&self, place_id: &str) -> CoffeyResult<ApiSnapshot<PlaceSummary>>;
}

#[async_trait]
pub trait NearbyPlacesSource: Send + Sync {
    async fn fetch(
        &self,
        coords: Coordinates,
        radius_m: u32,
        query: Option<&str>,
    ) -> CoffeyResult<ApiSnapshot<NearbyPlacesSummary>>;
}

/// Great-circle distance in meters (haversine, Earth radius 6,371,000 m)
pub fn haversine_distance_m(a: Coordinates, b: Coordinates) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lng - a.lng).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Drop the country and postal suffix from a formatted address for display
pub fn extract_short_address(formatted: &str) -> Option<String> {
    let parts: Vec<&str> = formatted.split(", ").collect();
    if parts.len() >= 2 {
        Some(parts[..2].join(", "))
    } else if !formatted.is_empty() {
        Some(formatted.to_string())
    } else {
        None
    }
}

fn maps_url(place_id: &str) -> String {
    format!("https://www.google.com/maps/place/?q=place_id:{}", place_id)
}

// Raw Places v1 shapes

#[derive(Debug, Deserialize)]
struct PlacesSearchResponse {
    #[serde(default)]
    places: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    id: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<DisplayName>,
    #[serde(rename = "formattedAddress")]
    formatted_address: Option<String>,
    location: Option<LatLng>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(rename = "websiteUri")]
    website_uri: Option<String>,
    #[serde(rename = "nationalPhoneNumber")]
    national_phone_number: Option<String>,
    rating: Option<f64>,
    #[serde(rename = "userRatingCount")]
    user_rating_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Google Places adapter (details + nearby search)
pub struct GooglePlaces {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GooglePlaces {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn api_key(&self) -> CoffeyResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("GOOGLE_API_KEY not configured".to_string())
        })
    }
}

#[async_trait]
impl PlaceDetailsSource for GooglePlaces {
    async fn fetch(&self, place_id: &str) -> CoffeyResult<ApiSnapshot<PlaceSummary>> {
        let api_key = self.api_key()?;

        let url = format!("https://places.googleapis.com/v1/places/{}", place_id);

        let response = self
            .client
            .get(&url)
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::provider_status(PROVIDER, status.as_u16(), body));
        }

        let place: RawPlace = response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let formatted = place.formatted_address.clone().unwrap_or_default();
        let summary = PlaceSummary {
            name: place
                .display_name
                .and_then(|d| d.text)
                .unwrap_or_else(|| "Unknown Place".to_string()),
            short_address: extract_short_address(&formatted),
            formatted_address: formatted,
            lat: place.location.as_ref().and_then(|l| l.latitude).unwrap_or(0.0),
            lng: place.location.as_ref().and_then(|l| l.longitude).unwrap_or(0.0),
            maps_url: place.id.as_deref().map(maps_url),
            place_id: place.id,
            website_url: place.website_uri,
            phone: place.national_phone_number,
            types: if place.types.is_empty() {
                None
            } else {
                Some(place.types)
            },
            rating: place.rating,
            user_rating_count: place.user_rating_count,
        };

        Ok(ApiSnapshot::now(
            ProviderInfo::new("google", "places", "v1"),
            summary,
        ))
    }
}

#[async_trait]
impl NearbyPlacesSource for GooglePlaces {
    async fn fetch(
        &self,
        coords: Coordinates,
        radius_m: u32,
        query: Option<&str>,
    ) -> CoffeyResult<ApiSnapshot<NearbyPlacesSummary>> {
        let api_key = self.api_key()?;

        let mut body = json!({
            "locationRestriction": {
                "circle": {
                    "center": { "latitude": coords.lat, "longitude": coords.lng },
                    "radius": radius_m,
                }
            },
            "includedTypes": POI_TYPES,
            "maxResultCount": 20,
            "rankPreference": "POPULARITY",
        });
        if let Some(q) = query {
            body["textQuery"] = json!(q);
        }

        let response = self
            .client
            .post("https://places.googleapis.com/v1/places:searchNearby")
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", NEARBY_FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::provider_status(PROVIDER, status.as_u16(), body));
        }

        let data: PlacesSearchResponse = response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let places = data
            .places
            .into_iter()
            .map(|place| {
                let lat = place.location.as_ref().and_then(|l| l.latitude).unwrap_or(0.0);
                let lng = place.location.as_ref().and_then(|l| l.longitude).unwrap_or(0.0);
                let distance = haversine_distance_m(coords, Coordinates { lat, lng });
                let formatted = place.formatted_address.unwrap_or_default();

                NearbyPlaceSummary {
                    name: place
                        .display_name
                        .and_then(|d| d.text)
                        .unwrap_or_else(|| "Unknown Place".to_string()),
                    short_address: extract_short_address(&formatted),
                    formatted_address: formatted,
                    lat,
                    lng,
                    distance_m: distance.round() as i64,
                    maps_url: place.id.as_deref().map(maps_url),
                    place_id: place.id,
                    types: if place.types.is_empty() {
                        None
                    } else {
                        Some(place.types)
                    },
                }
            })
            .collect();

        Ok(ApiSnapshot::now(
            ProviderInfo::new("google", "places-nearby", "v1"),
            NearbyPlacesSummary {
                lat: coords.lat,
                lng: coords.lng,
                radius_m,
                places,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_latitude_degree() {
        // 0.01 degrees of latitude is roughly 1,113 m
        let origin = Coordinates {
            lat: 40.7128,
            lng: -74.0060,
        };
        let north = Coordinates {
            lat: 40.7228,
            lng: -74.0060,
        };
        let d = haversine_distance_m(origin, north);
        assert!((d - 1113.0).abs() < 5.0, "distance was {}", d);
    }

    #[test]
    fn test_haversine_zero_distance() {
        let p = Coordinates {
            lat: 51.5074,
            lng: -0.1278,
        };
        assert_eq!(haversine_distance_m(p, p), 0.0);
    }

    #[test]
    fn test_short_address_truncates() {
        assert_eq!(
            extract_short_address("1 Ferry Building, San Francisco, CA 94111, USA").as_deref(),
            Some("1 Ferry Building, San Francisco")
        );
        assert_eq!(extract_short_address("Lone Name").as_deref(), Some("Lone Name"));
        assert_eq!(extract_short_address(""), None);
    }
}
