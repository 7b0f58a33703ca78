/// Weather enrichment
///
/// Weather is the one time-sensitive adapter. Three regimes, decided against
/// the wall clock at call time:
/// - target in the future: no data, intentional skip (not an error)
/// - target less than 24 hours old: Google hourly-history source
/// - older: Open-Meteo historical archive
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    enrichment::snapshot::{ApiSnapshot, ProviderInfo},
    error::{CoffeyError, CoffeyResult},
    records::Coordinates,
};

/// Normalized weather summary
///
/// All values are imperial; unit conversions happen at the adapter boundary
/// so downstream consumers never see provider-native units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    // Hourly conditions (near-real-time source)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_feels_f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_daytime: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_inhg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_mph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_gust_mph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_dir_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precip_chance_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precip_quantity_in: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_miles: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_index: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dewpoint_f: Option<f64>,

    // Daily summary (archive source)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_f_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_f_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_f_mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_sum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_mph_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daylight_duration_hours: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_historical: Option<bool>,
}

/// Unified weather seam used by the orchestrator.
///
/// `Ok(None)` means "no data for this timestamp" (future target), which the
/// caller treats as a skip, not a failure.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(
        &self,
        coords: Coordinates,
        target: DateTime<Utc>,
    ) -> CoffeyResult<Option<ApiSnapshot<WeatherSummary>>>;
}

/// Source for the last ~24 hours of hourly conditions
#[async_trait]
pub trait HourlyWeatherSource: Send + Sync {
    async fn fetch_hourly(
        &self,
        coords: Coordinates,
        target: DateTime<Utc>,
    ) -> CoffeyResult<ApiSnapshot<WeatherSummary>>;
}

/// Source for daily archive weather
#[async_trait]
pub trait ArchiveWeatherSource: Send + Sync {
    async fn fetch_archive(
        &self,
        coords: Coordinates,
        date: chrono::NaiveDate,
    ) -> CoffeyResult<ApiSnapshot<WeatherSummary>>;
}

/// Which source a target timestamp routes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherRegime {
    Future,
    Hourly,
    Archive,
}

/// Pure routing decision; the boundary is exactly 24 hours
pub fn select_regime(now: DateTime<Utc>, target: DateTime<Utc>) -> WeatherRegime {
    if target > now {
        WeatherRegime::Future
    } else if now - target < Duration::hours(24) {
        WeatherRegime::Hourly
    } else {
        WeatherRegime::Archive
    }
}

/// Routes between the hourly-history and archive sources
pub struct WeatherService {
    hourly: Arc<dyn HourlyWeatherSource>,
    archive: Arc<dyn ArchiveWeatherSource>,
}

impl WeatherService {
    pub fn new(hourly: Arc<dyn HourlyWeatherSource>, archive: Arc<dyn ArchiveWeatherSource>) -> Self {
        Self { hourly, archive }
    }
}

#[async_trait]
impl WeatherSource for WeatherService {
    async fn fetch(
        &self,
        coords: Coordinates,
        target: DateTime<Utc>,
    ) -> CoffeyResult<Option<ApiSnapshot<WeatherSummary>>> {
        match select_regime(Utc::now(), target) {
            WeatherRegime::Future => Ok(None),
            WeatherRegime::Hourly => Ok(Some(self.hourly.fetch_hourly(coords, target).await?)),
            WeatherRegime::Archive => Ok(Some(
                self.archive.fetch_archive(coords, target.date_naive()).await?,
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit conversions, applied at the adapter boundary
// ---------------------------------------------------------------------------

pub(crate) fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub(crate) fn kilometers_to_miles(km: f64) -> f64 {
    km * 0.621371
}

pub(crate) fn millimeters_to_inches(mm: f64) -> f64 {
    mm * 0.0393701
}

pub(crate) fn millibars_to_inches_hg(mb: f64) -> f64 {
    mb * 0.02953
}

// ---------------------------------------------------------------------------
// Google Weather hourly-history source
// ---------------------------------------------------------------------------

const GOOGLE_WEATHER: &str = "google-weather";

/// Raw response shapes from the Google Weather hourly-history endpoint.
/// All field-name probing stays here; nothing downstream sees these.
#[derive(Debug, Deserialize)]
struct HourlyHistoryResponse {
    #[serde(rename = "historyHours", default)]
    history_hours: Vec<HistoryHour>,
}

#[derive(Debug, Deserialize)]
struct HistoryHour {
    interval: HourInterval,
    temperature: Option<DegreesValue>,
    #[serde(rename = "feelsLikeTemperature")]
    feels_like_temperature: Option<DegreesValue>,
    #[serde(rename = "dewPoint")]
    dew_point: Option<DegreesValue>,
    #[serde(rename = "weatherCondition")]
    weather_condition: Option<WeatherCondition>,
    #[serde(rename = "isDaytime")]
    is_daytime: Option<bool>,
    #[serde(rename = "relativeHumidity")]
    relative_humidity: Option<f64>,
    #[serde(rename = "airPressure")]
    air_pressure: Option<AirPressure>,
    wind: Option<Wind>,
    precipitation: Option<Precipitation>,
    #[serde(rename = "cloudCover")]
    cloud_cover: Option<f64>,
    visibility: Option<Distance>,
    #[serde(rename = "uvIndex")]
    uv_index: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HourInterval {
    #[serde(rename = "startTime")]
    start_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct DegreesValue {
    degrees: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: Option<ConditionDescription>,
    #[serde(rename = "type")]
    condition_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConditionDescription {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirPressure {
    #[serde(rename = "meanSeaLevelMillibars")]
    mean_sea_level_millibars: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: Option<UnitValue>,
    gust: Option<UnitValue>,
    direction: Option<WindDirection>,
}

#[derive(Debug, Deserialize)]
struct UnitValue {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WindDirection {
    degrees: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Precipitation {
    probability: Option<PrecipProbability>,
    qpf: Option<Qpf>,
}

#[derive(Debug, Deserialize)]
struct PrecipProbability {
    percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Qpf {
    quantity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Distance {
    distance: Option<f64>,
}

/// Google Weather hourly-history adapter
pub struct GoogleHourlyWeather {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GoogleHourlyWeather {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl HourlyWeatherSource for GoogleHourlyWeather {
    async fn fetch_hourly(
        &self,
        coords: Coordinates,
        target: DateTime<Utc>,
    ) -> CoffeyResult<ApiSnapshot<WeatherSummary>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("GOOGLE_API_KEY not configured".to_string())
        })?;

        let url = format!(
            "https://weather.googleapis.com/v1/history/hours:lookup?location.latitude={}&location.longitude={}&hours=24&key={}",
            coords.lat, coords.lng, api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(GOOGLE_WEATHER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::provider_status(GOOGLE_WEATHER, status.as_u16(), body));
        }

        let data: HourlyHistoryResponse = response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(GOOGLE_WEATHER, e))?;

        // Pick the hour closest to the target timestamp
        let closest = data
            .history_hours
            .into_iter()
            .min_by_key(|hour| (target - hour.interval.start_time).num_seconds().abs())
            .ok_or_else(|| {
                CoffeyError::provider_status(
                    GOOGLE_WEATHER,
                    status.as_u16(),
                    "No hourly weather data available".to_string(),
                )
            })?;

        let summary = WeatherSummary {
            temp_f: closest
                .temperature
                .and_then(|t| t.degrees)
                .map(celsius_to_fahrenheit),
            temp_feels_f: closest
                .feels_like_temperature
                .and_then(|t| t.degrees)
                .map(celsius_to_fahrenheit),
            dewpoint_f: closest
                .dew_point
                .and_then(|t| t.degrees)
                .map(celsius_to_fahrenheit),
            condition_text: closest
                .weather_condition
                .as_ref()
                .and_then(|c| c.description.as_ref())
                .and_then(|d| d.text.clone()),
            condition_code: closest
                .weather_condition
                .as_ref()
                .and_then(|c| c.condition_type.clone()),
            is_daytime: closest.is_daytime,
            humidity_pct: closest.relative_humidity,
            pressure_inhg: closest
                .air_pressure
                .and_then(|p| p.mean_sea_level_millibars)
                .map(millibars_to_inches_hg),
            wind_speed_mph: closest
                .wind
                .as_ref()
                .and_then(|w| w.speed.as_ref())
                .and_then(|s| s.value)
                .map(kilometers_to_miles),
            wind_gust_mph: closest
                .wind
                .as_ref()
                .and_then(|w| w.gust.as_ref())
                .and_then(|g| g.value)
                .map(kilometers_to_miles),
            wind_dir_deg: closest
                .wind
                .as_ref()
                .and_then(|w| w.direction.as_ref())
                .and_then(|d| d.degrees),
            precip_chance_pct: closest
                .precipitation
                .as_ref()
                .and_then(|p| p.probability.as_ref())
                .and_then(|p| p.percent),
            precip_quantity_in: closest
                .precipitation
                .as_ref()
                .and_then(|p| p.qpf.as_ref())
                .and_then(|q| q.quantity)
                .map(millimeters_to_inches),
            cloud_pct: closest.cloud_cover,
            visibility_miles: closest
                .visibility
                .and_then(|v| v.distance)
                .map(kilometers_to_miles),
            uv_index: closest.uv_index,
            ..Default::default()
        };

        Ok(ApiSnapshot {
            captured_at: closest.interval.start_time,
            provider: ProviderInfo::new("google", "weather_historical", "v1"),
            summary,
        })
    }
}

// ---------------------------------------------------------------------------
// Open-Meteo archive source
// ---------------------------------------------------------------------------

const OPEN_METEO: &str = "open-meteo";

// WMO weather code descriptions (code table 4677)
const WEATHER_CODES: &[(u32, &str)] = &[
    (0, "Clear sky"),
    (1, "Mainly clear"),
    (2, "Partly cloudy"),
    (3, "Overcast"),
    (45, "Fog"),
    (48, "Depositing rime fog"),
    (51, "Light drizzle"),
    (53, "Moderate drizzle"),
    (55, "Dense drizzle"),
    (56, "Light freezing drizzle"),
    (57, "Dense freezing drizzle"),
    (61, "Slight rain"),
    (63, "Moderate rain"),
    (65, "Heavy rain"),
    (66, "Light freezing rain"),
    (67, "Heavy freezing rain"),
    (71, "Slight snow fall"),
    (73, "Moderate snow fall"),
    (75, "Heavy snow fall"),
    (77, "Snow grains"),
    (80, "Slight rain showers"),
    (81, "Moderate rain showers"),
    (82, "Violent rain showers"),
    (85, "Slight snow showers"),
    (86, "Heavy snow showers"),
    (95, "Thunderstorm"),
    (96, "Thunderstorm with slight hail"),
    (99, "Thunderstorm with heavy hail"),
];

fn weather_code_text(code: u32) -> Option<String> {
    WEATHER_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, text)| (*text).to_string())
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: ArchiveDaily,
}

#[derive(Debug, Default, Deserialize)]
struct ArchiveDaily {
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<u32>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    sunrise: Vec<Option<String>>,
    #[serde(default)]
    sunset: Vec<Option<String>>,
    #[serde(default)]
    daylight_duration: Vec<Option<f64>>,
}

fn first<T: Clone>(column: &[Option<T>]) -> Option<T> {
    column.first().cloned().flatten()
}

/// Open-Meteo historical archive adapter
///
/// Open-Meteo is keyless; imperial units are requested directly so no
/// conversion is needed here.
pub struct OpenMeteoArchive {
    client: reqwest::Client,
}

impl OpenMeteoArchive {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveWeatherSource for OpenMeteoArchive {
    async fn fetch_archive(
        &self,
        coords: Coordinates,
        date: chrono::NaiveDate,
    ) -> CoffeyResult<ApiSnapshot<WeatherSummary>> {
        let day = date.format("%Y-%m-%d").to_string();
        let url = format!(
            "https://archive-api.open-meteo.com/v1/archive?latitude={}&longitude={}&start_date={}&end_date={}&temperature_unit=fahrenheit&wind_speed_unit=mph&precipitation_unit=inch&daily={}",
            coords.lat,
            coords.lng,
            day,
            day,
            "temperature_2m_max,temperature_2m_min,temperature_2m_mean,weather_code,precipitation_sum,wind_speed_10m_max,sunrise,sunset,daylight_duration"
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(OPEN_METEO, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::provider_status(OPEN_METEO, status.as_u16(), body));
        }

        let data: ArchiveResponse = response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(OPEN_METEO, e))?;

        let daily = data.daily;
        let weather_code = first(&daily.weather_code);

        let summary = WeatherSummary {
            temp_f_max: first(&daily.temperature_2m_max),
            temp_f_min: first(&daily.temperature_2m_min),
            temp_f_mean: first(&daily.temperature_2m_mean),
            weather_code,
            condition_text: weather_code.and_then(weather_code_text),
            precipitation_sum: first(&daily.precipitation_sum),
            wind_speed_mph_max: first(&daily.wind_speed_10m_max),
            sunrise: first(&daily.sunrise),
            sunset: first(&daily.sunset),
            daylight_duration_hours: first(&daily.daylight_duration).map(|s| s / 3600.0),
            is_historical: Some(true),
            ..Default::default()
        };

        Ok(ApiSnapshot::now(
            ProviderInfo::new("open-meteo", "archive", "v1"),
            summary,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_regime_future_timestamp() {
        let now = Utc::now();
        assert_eq!(
            select_regime(now, now + Duration::hours(1)),
            WeatherRegime::Future
        );
    }

    #[test]
    fn test_regime_24_hour_boundary() {
        let now = Utc::now();
        assert_eq!(
            select_regime(now, now - Duration::hours(23) - Duration::minutes(59)),
            WeatherRegime::Hourly
        );
        assert_eq!(
            select_regime(now, now - Duration::hours(24) - Duration::minutes(1)),
            WeatherRegime::Archive
        );
        // Exactly 24h falls to the archive source
        assert_eq!(
            select_regime(now, now - Duration::hours(24)),
            WeatherRegime::Archive
        );
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert!((kilometers_to_miles(10.0) - 6.21371).abs() < 1e-6);
        assert!((millimeters_to_inches(25.4) - 1.0).abs() < 1e-3);
        assert!((millibars_to_inches_hg(1013.25) - 29.92).abs() < 0.01);
    }

    #[test]
    fn test_weather_code_lookup() {
        assert_eq!(weather_code_text(0).as_deref(), Some("Clear sky"));
        assert_eq!(weather_code_text(95).as_deref(), Some("Thunderstorm"));
        assert_eq!(weather_code_text(42), None);
    }

    struct CountingHourly(AtomicUsize);

    #[async_trait]
    impl HourlyWeatherSource for CountingHourly {
        async fn fetch_hourly(
            &self,
            _coords: Coordinates,
            _target: DateTime<Utc>,
        ) -> CoffeyResult<ApiSnapshot<WeatherSummary>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ApiSnapshot::now(
                ProviderInfo::new("google", "weather_historical", "v1"),
                WeatherSummary::default(),
            ))
        }
    }

    struct CountingArchive(AtomicUsize);

    #[async_trait]
    impl ArchiveWeatherSource for CountingArchive {
        async fn fetch_archive(
            &self,
            _coords: Coordinates,
            _date: chrono::NaiveDate,
        ) -> CoffeyResult<ApiSnapshot<WeatherSummary>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ApiSnapshot::now(
                ProviderInfo::new("open-meteo", "archive", "v1"),
                WeatherSummary {
                    is_historical: Some(true),
                    ..Default::default()
                },
            ))
        }
    }

    fn test_coords() -> Coordinates {
        Coordinates {
            lat: 37.7749,
            lng: -122.4194,
        }
    }

    #[tokio::test]
    async fn test_routing_recent_target_uses_hourly() {
        let hourly = Arc::new(CountingHourly(AtomicUsize::new(0)));
        let archive = Arc::new(CountingArchive(AtomicUsize::new(0)));
        let service = WeatherService::new(hourly.clone(), archive.clone());

        let target = Utc::now() - Duration::hours(23) - Duration::minutes(59);
        let result = service.fetch(test_coords(), target).await.unwrap();

        assert!(result.is_some());
        assert_eq!(hourly.0.load(Ordering::SeqCst), 1);
        assert_eq!(archive.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_routing_old_target_uses_archive() {
        let hourly = Arc::new(CountingHourly(AtomicUsize::new(0)));
        let archive = Arc::new(CountingArchive(AtomicUsize::new(0)));
        let service = WeatherService::new(hourly.clone(), archive.clone());

        let target = Utc::now() - Duration::hours(24) - Duration::minutes(1);
        let result = service.fetch(test_coords(), target).await.unwrap();

        assert_eq!(result.unwrap().summary.is_historical, Some(true));
        assert_eq!(hourly.0.load(Ordering::SeqCst), 0);
        assert_eq!(archive.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_future_target_returns_no_data() {
        let hourly = Arc::new(CountingHourly(AtomicUsize::new(0)));
        let archive = Arc::new(CountingArchive(AtomicUsize::new(0)));
        let service = WeatherService::new(hourly.clone(), archive.clone());

        let target = Utc::now() + Duration::hours(1);
        let result = service.fetch(test_coords(), target).await.unwrap();

        assert!(result.is_none());
        assert_eq!(hourly.0.load(Ordering::SeqCst), 0);
        assert_eq!(archive.0.load(Ordering::SeqCst), 0);
    }
}
