/// Environmental enrichment
///
/// Fans out to the independent third-party providers for a record draft,
/// tolerates partial provider failure, and merges whatever succeeded into
/// one environment bag. Only place resolution and input validation can fail
/// the whole call; every other branch degrades to an absent key.
pub mod air_quality;
pub mod elevation;
pub mod geocoding;
pub mod link_preview;
pub mod media;
pub mod places;
pub mod pollen;
pub mod snapshot;
pub mod weather;

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::{
    config::ServerConfig,
    error::{CoffeyError, CoffeyResult},
    metrics,
    records::{ChatterData, Coordinates, CreateChatterRequest, Environment, PlaceInput},
};

use air_quality::{AirQualitySource, AirQualitySummary, GoogleAirQuality};
use elevation::{ElevationSource, ElevationSummary, GoogleElevation};
use geocoding::{GeocodingSource, GeocodingSummary, GoogleGeocoding};
use link_preview::{HttpLinkPreview, LinkPreviewSource};
use media::{MediaSource, MediaSummary, TmdbClient};
use places::{
    GooglePlaces, NearbyPlacesSource, NearbyPlacesSummary, PlaceDetailsSource, PlaceSummary,
};
use pollen::{GooglePollen, PollenSource, PollenSummary};
use snapshot::ApiSnapshot;
use weather::{
    GoogleHourlyWeather, OpenMeteoArchive, WeatherService, WeatherSource, WeatherSummary,
};

/// Search radius for nearby-places enrichment, in meters
const NEARBY_RADIUS_M: u32 = 500;

/// Enrichment categories, used to tag fan-out outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKey {
    Weather,
    AirQuality,
    Pollen,
    Elevation,
    Geocoding,
    NearbyPlaces,
    Place,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::Weather => "weather",
            EnvKey::AirQuality => "air_quality",
            EnvKey::Pollen => "pollen",
            EnvKey::Elevation => "elevation",
            EnvKey::Geocoding => "geocoding",
            EnvKey::NearbyPlaces => "nearby_places",
            EnvKey::Place => "place",
        }
    }
}

/// A successfully-fetched snapshot, tagged by category
pub enum EnvValue {
    Weather(ApiSnapshot<WeatherSummary>),
    AirQuality(ApiSnapshot<AirQualitySummary>),
    Pollen(ApiSnapshot<PollenSummary>),
    Elevation(ApiSnapshot<ElevationSummary>),
    Geocoding(ApiSnapshot<GeocodingSummary>),
    NearbyPlaces(ApiSnapshot<NearbyPlacesSummary>),
    Place(ApiSnapshot<PlaceSummary>),
}

/// One settled fan-out branch: `Ok(None)` is an intentional skip (e.g. a
/// future timestamp for weather), `Err` is a provider failure
pub type Branch = (EnvKey, CoffeyResult<Option<EnvValue>>);

/// Pure reduce over settled branches; failures are logged and contribute
/// nothing, they never abort siblings
pub fn merge_environment(branches: Vec<Branch>) -> Environment {
    let mut env = Environment::default();
    for (key, outcome) in branches {
        match outcome {
            Ok(Some(value)) => match value {
                EnvValue::Weather(s) => env.weather = Some(s),
                EnvValue::AirQuality(s) => env.air_quality = Some(s),
                EnvValue::Pollen(s) => env.pollen = Some(s),
                EnvValue::Elevation(s) => env.elevation = Some(s),
                EnvValue::Geocoding(s) => env.geocoding = Some(s),
                EnvValue::NearbyPlaces(s) => env.nearby_places = Some(s),
                EnvValue::Place(s) => env.place = Some(s),
            },
            Ok(None) => {}
            Err(e) => {
                warn!("{} enrichment failed: {}", key.as_str(), e);
                metrics::record_provider_failure(key.as_str());
            }
        }
    }
    env
}

/// Holds every provider seam; the HTTP-backed set comes from configuration,
/// tests inject mocks
pub struct Enricher {
    weather: Arc<dyn WeatherSource>,
    air_quality: Arc<dyn AirQualitySource>,
    pollen: Arc<dyn PollenSource>,
    elevation: Arc<dyn ElevationSource>,
    geocoding: Arc<dyn GeocodingSource>,
    nearby: Arc<dyn NearbyPlacesSource>,
    place_details: Arc<dyn PlaceDetailsSource>,
    link_preview: Arc<dyn LinkPreviewSource>,
    media: Arc<dyn MediaSource>,
}

impl Enricher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        weather: Arc<dyn WeatherSource>,
        air_quality: Arc<dyn AirQualitySource>,
        pollen: Arc<dyn PollenSource>,
        elevation: Arc<dyn ElevationSource>,
        geocoding: Arc<dyn GeocodingSource>,
        nearby: Arc<dyn NearbyPlacesSource>,
        place_details: Arc<dyn PlaceDetailsSource>,
        link_preview: Arc<dyn LinkPreviewSource>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            weather,
            air_quality,
            pollen,
            elevation,
            geocoding,
            nearby,
            place_details,
            link_preview,
            media,
        }
    }

    /// Build the HTTP-backed provider set from configuration
    pub fn from_config(config: &ServerConfig) -> CoffeyResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.service.user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CoffeyError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let google_key = config.providers.google_api_key.clone();
        let places = Arc::new(GooglePlaces::new(client.clone(), google_key.clone()));

        Ok(Self {
            weather: Arc::new(WeatherService::new(
                Arc::new(GoogleHourlyWeather::new(client.clone(), google_key.clone())),
                Arc::new(OpenMeteoArchive::new(client.clone())),
            )),
            air_quality: Arc::new(GoogleAirQuality::new(client.clone(), google_key.clone())),
            pollen: Arc::new(GooglePollen::new(client.clone(), google_key.clone())),
            elevation: Arc::new(GoogleElevation::new(client.clone(), google_key.clone())),
            geocoding: Arc::new(GoogleGeocoding::new(client.clone(), google_key)),
            nearby: places.clone(),
            place_details: places,
            link_preview: Arc::new(HttpLinkPreview::new(&config.service.user_agent)?),
            media: Arc::new(TmdbClient::new(
                client,
                config.providers.tmdb_api_key.clone(),
            )),
        })
    }

    pub fn geocoding_source(&self) -> &dyn GeocodingSource {
        self.geocoding.as_ref()
    }

    pub fn nearby_source(&self) -> &dyn NearbyPlacesSource {
        self.nearby.as_ref()
    }

    /// Enrich a chatter draft.
    ///
    /// Validation and place resolution gate the whole call; everything after
    /// runs as isolated concurrent branches with no ordering dependency.
    pub async fn enrich_chatter(
        &self,
        request: CreateChatterRequest,
    ) -> CoffeyResult<ChatterData> {
        let mut place = request.place.clone();
        if let Some(p) = &place {
            p.validate()?;
        }

        // A place id without display fields resolves synchronously up front;
        // a bad place reference aborts creation entirely
        if let Some(p) = &mut place {
            if p.name.is_none() {
                if let Some(place_id) = p.google_place_id().map(String::from) {
                    let snapshot = self.place_details.fetch(&place_id).await.map_err(|e| {
                        CoffeyError::Validation(format!(
                            "Failed to fetch place details for place id {}: {}",
                            place_id, e
                        ))
                    })?;
                    apply_place_details(p, &snapshot.summary);
                }
            }
        }

        // Explicit location hint wins over the resolved place's coordinates
        let coords = request
            .location_hint
            .as_ref()
            .map(|h| Coordinates {
                lat: h.lat,
                lng: h.lng,
            })
            .or_else(|| place.as_ref().and_then(|p| p.location));

        let place_id = place
            .as_ref()
            .and_then(|p| p.google_place_id())
            .map(String::from);

        let target = request.created_at.unwrap_or_else(Utc::now);

        let links_fut = async {
            let links = request.links.clone().map(|input| input.normalize());
            match links {
                Some(links) if !links.is_empty() => {
                    Some(link_preview::enrich_links(self.link_preview.as_ref(), links).await)
                }
                _ => None,
            }
        };

        let watched_fut = self.enrich_watched(request.watched.clone());

        let geo_fut = async {
            match coords {
                Some(coords) => Some(self.fan_out(coords, target, place_id.as_deref()).await),
                None => None,
            }
        };

        let (links, watched, geo_branches) = tokio::join!(links_fut, watched_fut, geo_fut);

        Ok(ChatterData {
            kind: "chatter".to_string(),
            content: request.content,
            comment: request.comment,
            title: request.title,
            tags: request.tags.unwrap_or_default(),
            images: request.images.unwrap_or_default(),
            links,
            publish: request.publish.unwrap_or(true),
            location_hint: request.location_hint,
            place,
            environment: geo_branches.map(merge_environment),
            watched,
        })
    }

    /// All geo-based branches, launched concurrently and settled together
    async fn fan_out(
        &self,
        coords: Coordinates,
        target: DateTime<Utc>,
        place_id: Option<&str>,
    ) -> Vec<Branch> {
        let mut branches: Vec<BoxFuture<'_, Branch>> = vec![
            async move {
                (
                    EnvKey::Weather,
                    self.weather
                        .fetch(coords, target)
                        .await
                        .map(|o| o.map(EnvValue::Weather)),
                )
            }
            .boxed(),
            async move {
                (
                    EnvKey::AirQuality,
                    self.air_quality
                        .fetch(coords)
                        .await
                        .map(|s| Some(EnvValue::AirQuality(s))),
                )
            }
            .boxed(),
            async move {
                (
                    EnvKey::Pollen,
                    self.pollen
                        .fetch(coords)
                        .await
                        .map(|s| Some(EnvValue::Pollen(s))),
                )
            }
            .boxed(),
            async move {
                (
                    EnvKey::Elevation,
                    self.elevation
                        .fetch(coords)
                        .await
                        .map(|s| Some(EnvValue::Elevation(s))),
                )
            }
            .boxed(),
            async move {
                (
                    EnvKey::Geocoding,
                    self.geocoding
                        .reverse(coords)
                        .await
                        .map(|s| Some(EnvValue::Geocoding(s))),
                )
            }
            .boxed(),
            async move {
                (
                    EnvKey::NearbyPlaces,
                    self.nearby
                        .fetch(coords, NEARBY_RADIUS_M, None)
                        .await
                        .map(|s| Some(EnvValue::NearbyPlaces(s))),
                )
            }
            .boxed(),
        ];

        if let Some(place_id) = place_id {
            let place_id = place_id.to_string();
            branches.push(
                async move {
                    (
                        EnvKey::Place,
                        self.place_details
                            .fetch(&place_id)
                            .await
                            .map(|s| Some(EnvValue::Place(s))),
                    )
                }
                .boxed(),
            );
        }

        join_all(branches).await
    }

    /// Capture-time enrichment for an uploaded image.
    ///
    /// Weather is gated on a capture timestamp; the other branches only need
    /// coordinates. Same settle-all isolation as the chatter fan-out.
    pub async fn enrich_image(
        &self,
        coords: Coordinates,
        taken_at: Option<DateTime<Utc>>,
    ) -> crate::records::image::ImageEnvironment {
        let mut branches: Vec<BoxFuture<'_, Branch>> = vec![
            async move {
                (
                    EnvKey::Elevation,
                    self.elevation
                        .fetch(coords)
                        .await
                        .map(|s| Some(EnvValue::Elevation(s))),
                )
            }
            .boxed(),
            async move {
                (
                    EnvKey::Geocoding,
                    self.geocoding
                        .reverse(coords)
                        .await
                        .map(|s| Some(EnvValue::Geocoding(s))),
                )
            }
            .boxed(),
            async move {
                (
                    EnvKey::NearbyPlaces,
                    self.nearby
                        .fetch(coords, NEARBY_RADIUS_M, None)
                        .await
                        .map(|s| Some(EnvValue::NearbyPlaces(s))),
                )
            }
            .boxed(),
        ];

        if let Some(taken_at) = taken_at {
            branches.push(
                async move {
                    (
                        EnvKey::Weather,
                        self.weather
                            .fetch(coords, taken_at)
                            .await
                            .map(|o| o.map(EnvValue::Weather)),
                    )
                }
                .boxed(),
            );
        }

        let merged = merge_environment(join_all(branches).await);
        crate::records::image::ImageEnvironment {
            geocoding: merged.geocoding,
            elevation: merged.elevation,
            weather: merged.weather,
            nearby_places: merged.nearby_places,
        }
    }

    /// Watched-media enrichment is always best-effort; failures are logged
    /// and the field is simply omitted
    async fn enrich_watched(
        &self,
        input: Option<crate::records::WatchedInput>,
    ) -> Option<ApiSnapshot<MediaSummary>> {
        let input = input?;

        let outcome: CoffeyResult<Option<ApiSnapshot<MediaSummary>>> = async {
            let tmdb_id = match (input.tmdb_id, input.tmdb_title.as_deref()) {
                (Some(id), _) => Some(id),
                (None, Some(title)) => Some(self.media.search(input.media_type, title).await?),
                (None, None) => None,
            };

            match tmdb_id {
                Some(id) => Ok(Some(self.media.details(input.media_type, id).await?)),
                None => Ok(None),
            }
        }
        .await;

        match outcome {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Watched-media enrichment failed: {}", e);
                metrics::record_provider_failure("watched");
                None
            }
        }
    }
}

fn apply_place_details(place: &mut PlaceInput, summary: &PlaceSummary) {
    place.name = Some(summary.name.clone());
    place.formatted_address = Some(summary.formatted_address.clone());
    place.short_address = Some(
        summary
            .short_address
            .clone()
            .unwrap_or_else(|| summary.name.clone()),
    );
    place.location = Some(Coordinates {
        lat: summary.lat,
        lng: summary.lng,
    });
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared mock providers for orchestrator and pipeline tests
    use super::*;
    use crate::records::Link;
    use async_trait::async_trait;
    use snapshot::ProviderInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct CallCounter(AtomicUsize);

    impl CallCounter {
        pub fn bump(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        pub fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn snap<T>(product: &str, summary: T) -> ApiSnapshot<T> {
        ApiSnapshot::now(ProviderInfo::new("mock", product, "v1"), summary)
    }

    pub struct MockWeather {
        pub calls: CallCounter,
        pub fail: bool,
        pub skip: bool,
    }

    impl Default for MockWeather {
        fn default() -> Self {
            Self {
                calls: CallCounter::default(),
                fail: false,
                skip: false,
            }
        }
    }

    #[async_trait]
    impl WeatherSource for MockWeather {
        async fn fetch(
            &self,
            _coords: Coordinates,
            _target: DateTime<Utc>,
        ) -> CoffeyResult<Option<ApiSnapshot<WeatherSummary>>> {
            self.calls.bump();
            if self.fail {
                return Err(CoffeyError::provider_status(
                    "mock-weather",
                    500,
                    "down".to_string(),
                ));
            }
            if self.skip {
                return Ok(None);
            }
            Ok(Some(snap(
                "weather",
                WeatherSummary {
                    temp_f: Some(61.0),
                    condition_text: Some("Partly cloudy".to_string()),
                    ..Default::default()
                },
            )))
        }
    }

    #[derive(Default)]
    pub struct MockAirQuality {
        pub calls: CallCounter,
    }

    #[async_trait]
    impl AirQualitySource for MockAirQuality {
        async fn fetch(&self, _coords: Coordinates) -> CoffeyResult<ApiSnapshot<AirQualitySummary>> {
            self.calls.bump();
            Ok(snap(
                "air_quality",
                AirQualitySummary {
                    aqi: Some(42.0),
                    ..Default::default()
                },
            ))
        }
    }

    #[derive(Default)]
    pub struct MockPollen {
        pub calls: CallCounter,
    }

    #[async_trait]
    impl PollenSource for MockPollen {
        async fn fetch(&self, _coords: Coordinates) -> CoffeyResult<ApiSnapshot<PollenSummary>> {
            self.calls.bump();
            Ok(snap("pollen", PollenSummary::default()))
        }
    }

    #[derive(Default)]
    pub struct MockElevation {
        pub calls: CallCounter,
    }

    #[async_trait]
    impl ElevationSource for MockElevation {
        async fn fetch(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<ElevationSummary>> {
            self.calls.bump();
            Ok(snap(
                "elevation",
                ElevationSummary {
                    lat: coords.lat,
                    lng: coords.lng,
                    elevation_ft: 52.0,
                },
            ))
        }
    }

    #[derive(Default)]
    pub struct MockGeocoding {
        pub calls: CallCounter,
    }

    #[async_trait]
    impl GeocodingSource for MockGeocoding {
        async fn reverse(&self, coords: Coordinates) -> CoffeyResult<ApiSnapshot<GeocodingSummary>> {
            self.calls.bump();
            Ok(snap(
                "geocoding",
                GeocodingSummary {
                    lat: coords.lat,
                    lng: coords.lng,
                    formatted_address: "San Francisco, CA, USA".to_string(),
                    ..Default::default()
                },
            ))
        }
    }

    #[derive(Default)]
    pub struct MockNearby {
        pub calls: CallCounter,
    }

    #[async_trait]
    impl NearbyPlacesSource for MockNearby {
        async fn fetch(
            &self,
            coords: Coordinates,
            radius_m: u32,
            _query: Option<&str>,
        ) -> CoffeyResult<ApiSnapshot<NearbyPlacesSummary>> {
            self.calls.bump();
            Ok(snap(
                "places-nearby",
                NearbyPlacesSummary {
                    lat: coords.lat,
                    lng: coords.lng,
                    radius_m,
                    places: vec![],
                },
            ))
        }
    }

    #[derive(Default)]
    pub struct MockPlaceDetails {
        pub calls: CallCounter,
        pub fail: bool,
    }

    #[async_trait]
    impl PlaceDetailsSource for MockPlaceDetails {
        async fn fetch(&self, place_id: &str) -> CoffeyResult<ApiSnapshot<PlaceSummary>> {
            self.calls.bump();
            if self.fail {
                return Err(CoffeyError::provider_status(
                    "mock-places",
                    404,
                    "not found".to_string(),
                ));
            }
            Ok(snap(
                "places",
                PlaceSummary {
                    name: "Ferry Building".to_string(),
                    formatted_address: "1 Ferry Building, San Francisco, CA 94111, USA".to_string(),
                    short_address: Some("1 Ferry Building, San Francisco".to_string()),
                    lat: 37.7955,
                    lng: -122.3937,
                    place_id: Some(place_id.to_string()),
                    ..Default::default()
                },
            ))
        }
    }

    #[derive(Default)]
    pub struct MockLinkPreview {
        pub calls: CallCounter,
    }

    #[async_trait]
    impl LinkPreviewSource for MockLinkPreview {
        async fn fetch(&self, url: &str) -> Link {
            self.calls.bump();
            Link {
                url: url.to_string(),
                title: Some("Mock Page".to_string()),
                domain: link_preview::extract_domain(url),
                ..Default::default()
            }
        }
    }

    #[derive(Default)]
    pub struct MockMedia {
        pub search_calls: CallCounter,
        pub detail_calls: CallCounter,
        pub fail: bool,
    }

    #[async_trait]
    impl MediaSource for MockMedia {
        async fn search(&self, _media_type: media::MediaType, _title: &str) -> CoffeyResult<u64> {
            self.search_calls.bump();
            if self.fail {
                return Err(CoffeyError::provider_status(
                    "mock-media",
                    404,
                    "no results".to_string(),
                ));
            }
            Ok(603)
        }

        async fn details(
            &self,
            media_type: media::MediaType,
            tmdb_id: u64,
        ) -> CoffeyResult<ApiSnapshot<MediaSummary>> {
            self.detail_calls.bump();
            if self.fail {
                return Err(CoffeyError::provider_status(
                    "mock-media",
                    500,
                    "down".to_string(),
                ));
            }
            Ok(snap(
                "media",
                MediaSummary {
                    media_type,
                    tmdb_id,
                    title: "The Matrix".to_string(),
                    release_date: None,
                    overview: None,
                    poster_url: None,
                    backdrop_url: None,
                    genres: None,
                    tmdb_rating: None,
                    vote_count: None,
                    tmdb_url: media::build_tmdb_url(tmdb_id, media_type),
                    runtime: None,
                    director: None,
                    number_of_seasons: None,
                    number_of_episodes: None,
                    creators: None,
                    cast: None,
                },
            ))
        }
    }

    /// Mock provider set with adjustable failure behavior
    pub struct TestProviders {
        pub weather: Arc<MockWeather>,
        pub air_quality: Arc<MockAirQuality>,
        pub pollen: Arc<MockPollen>,
        pub elevation: Arc<MockElevation>,
        pub geocoding: Arc<MockGeocoding>,
        pub nearby: Arc<MockNearby>,
        pub place_details: Arc<MockPlaceDetails>,
        pub link_preview: Arc<MockLinkPreview>,
        pub media: Arc<MockMedia>,
    }

    impl Default for TestProviders {
        fn default() -> Self {
            Self {
                weather: Arc::new(MockWeather::default()),
                air_quality: Arc::new(MockAirQuality::default()),
                pollen: Arc::new(MockPollen::default()),
                elevation: Arc::new(MockElevation::default()),
                geocoding: Arc::new(MockGeocoding::default()),
                nearby: Arc::new(MockNearby::default()),
                place_details: Arc::new(MockPlaceDetails::default()),
                link_preview: Arc::new(MockLinkPreview::default()),
                media: Arc::new(MockMedia::default()),
            }
        }
    }

    impl TestProviders {
        pub fn enricher(&self) -> Enricher {
            Enricher::new(
                self.weather.clone(),
                self.air_quality.clone(),
                self.pollen.clone(),
                self.elevation.clone(),
                self.geocoding.clone(),
                self.nearby.clone(),
                self.place_details.clone(),
                self.link_preview.clone(),
                self.media.clone(),
            )
        }

        pub fn geo_call_total(&self) -> usize {
            self.weather.calls.count()
                + self.air_quality.calls.count()
                + self.pollen.calls.count()
                + self.elevation.calls.count()
                + self.geocoding.calls.count()
                + self.nearby.calls.count()
                + self.place_details.calls.count()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::records::{LinkInput, LocationHint, WatchedInput};
    use std::collections::BTreeMap;

    fn base_request() -> CreateChatterRequest {
        CreateChatterRequest {
            content: Some("hello".to_string()),
            comment: None,
            title: None,
            tags: None,
            images: None,
            links: None,
            publish: None,
            location_hint: Some(LocationHint {
                lat: 37.7749,
                lng: -122.4194,
                accuracy_m: None,
            }),
            place: None,
            watched: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_failing_weather_does_not_fail_request() {
        let mut providers = TestProviders::default();
        providers.weather = Arc::new(MockWeather {
            fail: true,
            ..Default::default()
        });
        let enricher = providers.enricher();

        let data = enricher.enrich_chatter(base_request()).await.unwrap();

        let env = data.environment.expect("environment should be attached");
        assert!(env.weather.is_none());
        assert!(env.air_quality.is_some());
        assert!(env.elevation.is_some());
        assert!(env.geocoding.is_some());
        assert!(env.pollen.is_some());
        assert!(env.nearby_places.is_some());
    }

    #[tokio::test]
    async fn test_future_timestamp_omits_weather_key() {
        let mut providers = TestProviders::default();
        providers.weather = Arc::new(MockWeather {
            skip: true,
            ..Default::default()
        });
        let enricher = providers.enricher();

        let data = enricher.enrich_chatter(base_request()).await.unwrap();

        let env = data.environment.unwrap();
        assert!(env.weather.is_none());
        assert!(env.air_quality.is_some());
        assert_eq!(providers.weather.calls.count(), 1);
    }

    #[tokio::test]
    async fn test_no_coordinates_skips_geo_enrichment() {
        let providers = TestProviders::default();
        let enricher = providers.enricher();

        let mut request = base_request();
        request.location_hint = None;

        let data = enricher.enrich_chatter(request).await.unwrap();

        assert!(data.environment.is_none());
        assert_eq!(providers.geo_call_total(), 0);
    }

    #[tokio::test]
    async fn test_invalid_place_rejected_before_any_network_call() {
        let providers = TestProviders::default();
        let enricher = providers.enricher();

        let mut request = base_request();
        request.place = Some(PlaceInput {
            name: Some("Only a name".to_string()),
            ..Default::default()
        });

        let err = enricher.enrich_chatter(request).await.unwrap_err();

        assert!(matches!(err, CoffeyError::Validation(_)));
        assert_eq!(providers.geo_call_total(), 0);
        assert_eq!(providers.link_preview.calls.count(), 0);
        assert_eq!(providers.media.search_calls.count(), 0);
    }

    #[tokio::test]
    async fn test_place_id_resolution_failure_aborts_creation() {
        let mut providers = TestProviders::default();
        providers.place_details = Arc::new(MockPlaceDetails {
            fail: true,
            ..Default::default()
        });
        let enricher = providers.enricher();

        let mut ids = BTreeMap::new();
        ids.insert("google_places".to_string(), "ChIJbad".to_string());
        let mut request = base_request();
        request.place = Some(PlaceInput {
            provider_ids: Some(ids),
            ..Default::default()
        });

        assert!(enricher.enrich_chatter(request).await.is_err());
    }

    #[tokio::test]
    async fn test_place_id_resolves_display_fields_and_adds_place_key() {
        let providers = TestProviders::default();
        let enricher = providers.enricher();

        let mut ids = BTreeMap::new();
        ids.insert("google_places".to_string(), "ChIJgood".to_string());
        let mut request = base_request();
        request.location_hint = None;
        request.place = Some(PlaceInput {
            provider_ids: Some(ids),
            ..Default::default()
        });

        let data = enricher.enrich_chatter(request).await.unwrap();

        let place = data.place.unwrap();
        assert_eq!(place.name.as_deref(), Some("Ferry Building"));
        assert!(place.location.is_some());
        // Coordinates came from the resolved place, so geo enrichment ran
        let env = data.environment.unwrap();
        assert!(env.place.is_some());
        // One early resolution plus one fan-out branch
        assert_eq!(providers.place_details.calls.count(), 2);
    }

    #[tokio::test]
    async fn test_link_and_watched_enrichment_without_coordinates() {
        let providers = TestProviders::default();
        let enricher = providers.enricher();

        let mut request = base_request();
        request.location_hint = None;
        request.links = Some(LinkInput::Urls(vec![
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
        ]));
        request.watched = Some(WatchedInput {
            media_type: media::MediaType::Movie,
            tmdb_id: None,
            tmdb_title: Some("The Matrix".to_string()),
        });

        let data = enricher.enrich_chatter(request).await.unwrap();

        let links = data.links.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.title.is_some()));
        assert_eq!(providers.link_preview.calls.count(), 2);

        let watched = data.watched.unwrap();
        assert_eq!(watched.summary.tmdb_id, 603);
        assert_eq!(providers.media.search_calls.count(), 1);
        assert_eq!(providers.media.detail_calls.count(), 1);
    }

    #[tokio::test]
    async fn test_watched_failure_is_swallowed() {
        let mut providers = TestProviders::default();
        providers.media = Arc::new(MockMedia {
            fail: true,
            ..Default::default()
        });
        let enricher = providers.enricher();

        let mut request = base_request();
        request.watched = Some(WatchedInput {
            media_type: media::MediaType::Tv,
            tmdb_id: Some(1396),
            tmdb_title: None,
        });

        let data = enricher.enrich_chatter(request).await.unwrap();
        assert!(data.watched.is_none());
    }

    #[test]
    fn test_merge_environment_is_pure_and_commutative() {
        let snap_elev = ApiSnapshot::now(
            snapshot::ProviderInfo::new("mock", "elevation", "v1"),
            ElevationSummary {
                lat: 0.0,
                lng: 0.0,
                elevation_ft: 10.0,
            },
        );

        let branches_a: Vec<Branch> = vec![
            (EnvKey::Weather, Ok(None)),
            (
                EnvKey::Elevation,
                Ok(Some(EnvValue::Elevation(snap_elev.clone()))),
            ),
            (
                EnvKey::Geocoding,
                Err(CoffeyError::provider_status("mock", 500, "down".to_string())),
            ),
        ];
        let branches_b: Vec<Branch> = vec![
            (
                EnvKey::Geocoding,
                Err(CoffeyError::provider_status("mock", 500, "down".to_string())),
            ),
            (
                EnvKey::Elevation,
                Ok(Some(EnvValue::Elevation(snap_elev))),
            ),
            (EnvKey::Weather, Ok(None)),
        ];

        let env_a = merge_environment(branches_a);
        let env_b = merge_environment(branches_b);

        assert_eq!(env_a, env_b);
        assert!(env_a.weather.is_none());
        assert!(env_a.geocoding.is_none());
        assert!(env_a.elevation.is_some());
    }
}
