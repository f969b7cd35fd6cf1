/*
 *  weather.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Open-Meteo client, payload normalization and the refresh service
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use log::{debug, error, info, warn};
use reqwest::{Client, header};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

use flate2::read::GzDecoder;
use std::io::Read;

use crate::constants::{OPEN_METEO_URL, STATUS_FAILED, STATUS_FETCHING, USER_AGENT};
use crate::display::components::clock::ClockFormatter;
use crate::display::components::weather::WeatherView;
use crate::display::factory::SharedSurface;
use crate::geoloc::{Geolocator, PositionOptions};
use crate::location::{resolve_coordinates, Coordinates};

// Custom error type for weather API operations.
#[derive(Debug, Error)]
pub enum WeatherApiError {
    #[error("HTTP request error: {0}")]
    HttpRequestError(#[from] reqwest::Error),
    #[error("Weather request failed: {0}")]
    HttpStatus(u16),
    #[error("JSON deserialization error: {0}")]
    DeserializationError(#[from] serde_json::Error),
    #[error("Missing weather data: {0}")]
    MissingData(String),
}

/// Variables requested for both the condensed and the hourly blocks
const CURRENT_VARS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,precipitation,weather_code";
const HOURLY_VARS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,precipitation,precipitation_probability,weather_code";

/// Forecast payload. Aliases cover both generations of the upstream field names.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ForecastResponse {
    pub current: Option<CurrentConditions>,
    pub hourly: Option<HourlySeries>,
    pub current_weather: Option<LegacyCurrentWeather>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CurrentConditions {
    #[serde(alias = "temperature")]
    pub temperature_2m: Option<f64>,
    pub apparent_temperature: Option<f64>,
    #[serde(alias = "relativehumidity_2m")]
    pub relative_humidity_2m: Option<f64>,
    #[serde(alias = "windspeed_10m")]
    pub wind_speed_10m: Option<f64>,
    pub precipitation: Option<f64>,
    pub precipitation_probability: Option<f64>,
    #[serde(alias = "weathercode")]
    pub weather_code: Option<f64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub apparent_temperature: Vec<Option<f64>>,
    #[serde(default, alias = "relativehumidity_2m")]
    pub relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default, alias = "windspeed_10m")]
    pub wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
    #[serde(default, alias = "weathercode")]
    pub weather_code: Vec<Option<f64>>,
}

impl HourlySeries {
    /// Index of the entry for the same local date and hour as `now`
    pub fn index_for(&self, now: &NaiveDateTime) -> Option<usize> {
        self.time.iter().position(|t| {
            parse_hour(t).is_some_and(|ts| ts.date() == now.date() && ts.hour() == now.hour())
        })
    }

    /// Current hour, else the last entry
    pub fn index_for_or_last(&self, now: &NaiveDateTime) -> Option<usize> {
        self.index_for(now).or_else(|| self.time.len().checked_sub(1))
    }
}

/// Older `current_weather=true` block
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LegacyCurrentWeather {
    pub temperature: Option<f64>,
    #[serde(alias = "wind_speed")]
    pub windspeed: Option<f64>,
    #[serde(alias = "weather_code")]
    pub weathercode: Option<f64>,
}

fn parse_hour(t: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn at(series: &[Option<f64>], idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| series.get(i).copied().flatten())
        .filter(|v| v.is_finite())
}

/// One normalized reading, derived per refresh
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed_kmh: i64,
    pub precipitation_mm: f64,
    pub precipitation_probability_pct: Option<f64>,
    pub weather_code: Option<i64>,
    pub description: &'static str,
    pub updated_at: DateTime<Local>,
}

/// Upstream reports m/s; anything above 50 is taken to be km/h already
pub fn wind_kmh(speed: Option<f64>) -> i64 {
    match speed {
        Some(v) if v.is_finite() && v != 0.0 => {
            if v > 50.0 { v.round() as i64 } else { (v * 3.6).round() as i64 }
        }
        _ => 0,
    }
}

/// WMO weather interpretation codes
pub fn describe(code: Option<i64>) -> &'static str {
    match code {
        Some(0) => "Clear sky",
        Some(1) => "Mainly clear",
        Some(2) => "Partly cloudy",
        Some(3) => "Overcast",
        Some(45) => "Foggy",
        Some(48) => "Depositing rime fog",
        Some(51) => "Light drizzle",
        Some(53) => "Moderate drizzle",
        Some(55) => "Dense drizzle",
        Some(56) => "Light freezing drizzle",
        Some(57) => "Dense freezing drizzle",
        Some(61) => "Slight rain",
        Some(63) => "Moderate rain",
        Some(65) => "Heavy rain",
        Some(66) => "Light freezing rain",
        Some(67) => "Heavy freezing rain",
        Some(71) => "Slight snow",
        Some(73) => "Moderate snow",
        Some(75) => "Heavy snow",
        Some(77) => "Snow grains",
        Some(80) => "Slight rain showers",
        Some(81) => "Moderate rain showers",
        Some(82) => "Violent rain showers",
        Some(85) => "Slight snow showers",
        Some(86) => "Heavy snow showers",
        Some(95) => "Thunderstorm",
        Some(96) => "Thunderstorm with slight hail",
        Some(99) => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

fn as_code(v: Option<f64>) -> Option<i64> {
    v.filter(|c| c.is_finite() && c.fract() == 0.0).map(|c| c as i64)
}

/// Reduce a payload to one snapshot.
///
/// The condensed `current` block wins. Without it the reading is taken from
/// the hourly arrays at the current local hour (last entry if no hour
/// matches), then from the legacy `current_weather` block.
pub fn normalize(data: &ForecastResponse, now: DateTime<Local>) -> Result<WeatherSnapshot, WeatherApiError> {
    let local = now.naive_local();
    let hourly = data.hourly.as_ref();
    let legacy = data.current_weather.as_ref();

    // rain chance only ever comes from the exact hour
    let exact = hourly.and_then(|h| h.index_for(&local));
    let hourly_probability = hourly.and_then(|h| at(&h.precipitation_probability, exact));

    let current = match (&data.current, hourly, legacy) {
        (Some(current), _, _) => CurrentConditions {
            precipitation_probability: hourly_probability.or(current.precipitation_probability),
            ..current.clone()
        },
        (None, Some(_), _) | (None, None, Some(_)) => {
            let idx = hourly.and_then(|h| h.index_for_or_last(&local));
            CurrentConditions {
                temperature_2m: hourly.and_then(|h| at(&h.temperature_2m, idx))
                    .or_else(|| legacy.and_then(|l| l.temperature).map(f64::round)),
                apparent_temperature: hourly.and_then(|h| at(&h.apparent_temperature, idx)),
                relative_humidity_2m: hourly.and_then(|h| at(&h.relative_humidity_2m, idx)),
                wind_speed_10m: hourly.and_then(|h| at(&h.wind_speed_10m, idx))
                    .or_else(|| legacy.and_then(|l| l.windspeed).map(f64::round)),
                precipitation: Some(hourly.and_then(|h| at(&h.precipitation, idx)).unwrap_or(0.0)),
                precipitation_probability: hourly_probability,
                weather_code: hourly.and_then(|h| at(&h.weather_code, idx))
                    .or_else(|| legacy.and_then(|l| l.weathercode)),
            }
        }
        (None, None, None) => {
            return Err(WeatherApiError::MissingData("no current conditions in payload".to_string()));
        }
    };

    let finite = |v: Option<f64>| v.filter(|n| n.is_finite());
    let temperature = finite(current.temperature_2m);
    let weather_code = as_code(current.weather_code);
    if temperature.is_none() && weather_code.is_none() {
        return Err(WeatherApiError::MissingData("no temperature or weather code".to_string()));
    }

    Ok(WeatherSnapshot {
        temperature,
        feels_like: finite(current.apparent_temperature),
        humidity: finite(current.relative_humidity_2m),
        wind_speed_kmh: wind_kmh(current.wind_speed_10m),
        precipitation_mm: finite(current.precipitation).unwrap_or(0.0),
        precipitation_probability_pct: finite(current.precipitation_probability),
        weather_code,
        description: describe(weather_code),
        updated_at: now,
    })
}

#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, coords: Coordinates) -> Result<ForecastResponse, WeatherApiError>;
}

pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    max_retries: u8,
}

impl OpenMeteoClient {
    pub fn new(base_url: Option<&str>) -> Result<Self, WeatherApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Accept-Encoding", header::HeaderValue::from_static("deflate, gzip"));
        // every refresh must hit the network
        headers.insert("Cache-Control", header::HeaderValue::from_static("no-cache, no-store"));
        headers.insert("Pragma", header::HeaderValue::from_static("no-cache"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or(OPEN_METEO_URL).to_string(),
            max_retries: 2,
        })
    }

    pub fn query(coords: Coordinates) -> [(&'static str, String); 5] {
        [
            ("latitude", coords.lat.to_string()),
            ("longitude", coords.lon.to_string()),
            ("current", CURRENT_VARS.to_string()),
            ("hourly", HOURLY_VARS.to_string()),
            ("timezone", "auto".to_string()),
        ]
    }

    async fn send_with_retries(&self, coords: Coordinates) -> Result<String, WeatherApiError> {
        let params = Self::query(coords);
        let mut retries = 0;
        loop {
            match self.client.get(&self.base_url).query(&params).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(WeatherApiError::HttpStatus(status.as_u16()));
                    }
                    let raw = response.bytes().await?;

                    // Try to decode as gzip first, fall back to plain text if it fails
                    let mut decoder = GzDecoder::new(&raw[..]);
                    let mut decoded = String::new();
                    let plain = match decoder.read_to_string(&mut decoded) {
                        Ok(_) => decoded,
                        Err(_) => String::from_utf8_lossy(&raw).to_string(),
                    };
                    return Ok(plain);
                }
                Err(e) => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!("Weather request failed ({}), retrying", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoClient {
    async fn fetch(&self, coords: Coordinates) -> Result<ForecastResponse, WeatherApiError> {
        let plain = self.send_with_retries(coords).await?;
        let data: ForecastResponse = serde_json::from_str(&plain)?;
        Ok(data)
    }
}

/// Result of one refresh attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated(WeatherSnapshot),
    Failed,
    /// an earlier refresh was still running
    Skipped,
    /// surface has no weather status region
    Disabled,
}

/// Clears the in-flight flag however the refresh ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Weather subsystem: locate, fetch, normalize, render
pub struct WeatherService {
    locator: Arc<dyn Geolocator>,
    source: Arc<dyn ForecastSource>,
    options: PositionOptions,
    fallback: Coordinates,
    clock: ClockFormatter,
    in_flight: AtomicBool,
}

impl WeatherService {
    pub fn new(locator: Arc<dyn Geolocator>, source: Arc<dyn ForecastSource>, fallback: Coordinates) -> Self {
        Self {
            locator,
            source,
            options: PositionOptions::default(),
            fallback,
            clock: ClockFormatter::default(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_options(mut self, options: PositionOptions) -> Self {
        self.options = options;
        self
    }

    /// Locale for the "Updated" time
    pub fn with_clock(mut self, clock: ClockFormatter) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn fetch_snapshot(&self) -> Result<WeatherSnapshot, WeatherApiError> {
        let location = resolve_coordinates(self.locator.as_ref(), &self.options, self.fallback).await;
        info!("Fetching weather data for {}...", location);
        let data = self.source.fetch(location.coords).await?;
        normalize(&data, Local::now())
    }

    /// Full refresh cycle against the surface. Overlapping calls are skipped.
    pub async fn refresh(&self, surface: &SharedSurface) -> RefreshOutcome {
        {
            let mut surface = surface.lock().await;
            if !WeatherView::supported(surface.as_ref()) {
                return RefreshOutcome::Disabled;
            }
            if self.in_flight.swap(true, Ordering::AcqRel) {
                debug!("Weather refresh already running, skipped");
                return RefreshOutcome::Skipped;
            }
            if let Err(e) = WeatherView::set_status(surface.as_mut(), STATUS_FETCHING).and_then(|_| surface.flush()) {
                error!("Weather status update failed: {}", e);
            }
        }
        let _guard = InFlight(&self.in_flight);

        let result = self.fetch_snapshot().await;

        let mut surface = surface.lock().await;
        let outcome = match result {
            Ok(snapshot) => {
                let view = WeatherView::from_snapshot(&snapshot, &self.clock);
                match view.render(surface.as_mut()).and_then(|_| WeatherView::set_status(surface.as_mut(), "")) {
                    Ok(_) => {
                        info!("Weather data fetched successfully.");
                        RefreshOutcome::Updated(snapshot)
                    }
                    Err(e) => {
                        error!("Weather render failed: {}", e);
                        RefreshOutcome::Failed
                    }
                }
            }
            Err(e) => {
                error!("Weather load failed: {}", e);
                if let Err(e) = WeatherView::set_status(surface.as_mut(), STATUS_FAILED) {
                    error!("Weather status update failed: {}", e);
                }
                RefreshOutcome::Failed
            }
        };
        if let Err(e) = surface.flush() {
            error!("Weather flush failed: {}", e);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 9, h, 20, 0).single().unwrap()
    }

    fn payload(json: &str) -> ForecastResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_wind_conversion() {
        assert_eq!(wind_kmh(Some(10.0)), 36);
        assert_eq!(wind_kmh(Some(60.0)), 60);
        assert_eq!(wind_kmh(Some(50.0)), 180);
        assert_eq!(wind_kmh(Some(12.0)), 43);
        assert_eq!(wind_kmh(None), 0);
        assert_eq!(wind_kmh(Some(0.0)), 0);
    }

    #[test]
    fn test_describe_table() {
        assert_eq!(describe(Some(0)), "Clear sky");
        assert_eq!(describe(Some(48)), "Depositing rime fog");
        assert_eq!(describe(Some(99)), "Thunderstorm with heavy hail");
        assert_eq!(describe(Some(4)), "Unknown");
        assert_eq!(describe(None), "Unknown");
        let known = [0, 1, 2, 3, 45, 48, 51, 53, 55, 56, 57, 61, 63, 65, 66, 67, 71, 73, 75, 77, 80, 81, 82, 85, 86, 95, 96, 99];
        for code in 0..=976 {
            assert_eq!(describe(Some(code)) == "Unknown", !known.contains(&code), "code {}", code);
        }
    }

    #[test]
    fn test_normalize_condensed_current() {
        let data = payload(r#"{"current":{"temperature_2m":18.4,"apparent_temperature":16.2,"relative_humidity_2m":55,"wind_speed_10m":12,"precipitation":0,"weather_code":3}}"#);
        let snap = normalize(&data, at_hour(14)).unwrap();
        assert_eq!(snap.temperature, Some(18.4));
        assert_eq!(snap.feels_like, Some(16.2));
        assert_eq!(snap.humidity, Some(55.0));
        assert_eq!(snap.wind_speed_kmh, 43);
        assert_eq!(snap.precipitation_mm, 0.0);
        assert_eq!(snap.weather_code, Some(3));
        assert_eq!(snap.description, "Overcast");
        assert_eq!(snap.precipitation_probability_pct, None);
    }

    #[test]
    fn test_normalize_legacy_aliases() {
        let data = payload(r#"{"current":{"temperature":5,"relativehumidity_2m":80,"windspeed_10m":72,"weathercode":61}}"#);
        let snap = normalize(&data, at_hour(9)).unwrap();
        assert_eq!(snap.temperature, Some(5.0));
        assert_eq!(snap.humidity, Some(80.0));
        assert_eq!(snap.wind_speed_kmh, 72);
        assert_eq!(snap.description, "Slight rain");
    }

    #[test]
    fn test_hourly_synthesis_at_current_hour() {
        let data = payload(r#"{"hourly":{
            "time":["2025-11-09T13:00","2025-11-09T14:00","2025-11-09T15:00"],
            "temperature_2m":[10.0,11.6,12.0],
            "apparent_temperature":[9.0,10.0,11.0],
            "relativehumidity_2m":[70,65,60],
            "windspeed_10m":[3.0,5.0,7.0],
            "precipitation":[0.0,0.4,0.0],
            "precipitation_probability":[10,30,50],
            "weathercode":[1,2,3]}}"#);
        let snap = normalize(&data, at_hour(14)).unwrap();
        assert_eq!(snap.temperature, Some(11.6));
        assert_eq!(snap.humidity, Some(65.0));
        assert_eq!(snap.wind_speed_kmh, 18);
        assert_eq!(snap.precipitation_mm, 0.4);
        assert_eq!(snap.precipitation_probability_pct, Some(30.0));
        assert_eq!(snap.description, "Partly cloudy");
    }

    #[test]
    fn test_hourly_falls_back_to_last_entry() {
        let data = payload(r#"{"hourly":{
            "time":["2025-11-09T01:00","2025-11-09T02:00"],
            "temperature_2m":[1.0,2.0],
            "precipitation_probability":[5,6],
            "weather_code":[0,45]}}"#);
        let snap = normalize(&data, at_hour(14)).unwrap();
        assert_eq!(snap.temperature, Some(2.0));
        assert_eq!(snap.description, "Foggy");
        // probability only from the exact hour
        assert_eq!(snap.precipitation_probability_pct, None);
    }

    #[test]
    fn test_legacy_current_weather_block() {
        let data = payload(r#"{"current_weather":{"temperature":7.6,"windspeed":9.0,"weathercode":71}}"#);
        let snap = normalize(&data, at_hour(8)).unwrap();
        assert_eq!(snap.temperature, Some(8.0));
        assert_eq!(snap.description, "Slight snow");
        assert_eq!(snap.wind_speed_kmh, 32);
    }

    #[test]
    fn test_missing_data() {
        assert!(matches!(normalize(&payload("{}"), at_hour(8)), Err(WeatherApiError::MissingData(_))));
        let data = payload(r#"{"current":{"relative_humidity_2m":40}}"#);
        assert!(matches!(normalize(&data, at_hour(8)), Err(WeatherApiError::MissingData(_))));
    }

    #[test]
    fn test_query_parameters() {
        let q = OpenMeteoClient::query(Coordinates { lat: 44.4323, lon: 26.1063 });
        assert_eq!(q[0], ("latitude", "44.4323".to_string()));
        assert_eq!(q[1], ("longitude", "26.1063".to_string()));
        assert!(q[3].1.contains("precipitation_probability"));
        assert_eq!(q[4], ("timezone", "auto".to_string()));
    }

    struct SlowSource {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ForecastSource for SlowSource {
        async fn fetch(&self, _coords: Coordinates) -> Result<ForecastResponse, WeatherApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(payload(r#"{"current":{"temperature_2m":11.0,"weather_code":0}}"#))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_refresh_is_skipped() {
        use crate::constants::DEFAULT_COORDS;
        use crate::display::drivers::memory::MemoryDriver;
        use crate::display::factory::share;
        use crate::geoloc::NoGeolocation;

        let source = Arc::new(SlowSource { calls: Default::default() });
        let service = WeatherService::new(Arc::new(NoGeolocation), source.clone(), DEFAULT_COORDS);
        let surface = share(Box::new(MemoryDriver::full()));

        let (first, second) = tokio::join!(service.refresh(&surface), service.refresh(&surface));
        assert!(matches!(first, RefreshOutcome::Updated(_)));
        assert_eq!(second, RefreshOutcome::Skipped);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!service.is_refreshing());

        assert!(matches!(service.refresh(&surface).await, RefreshOutcome::Updated(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
