/*
 *  geoloc.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Position providers - IP lookup, fixed coordinates or none at all
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
use log::debug;
use mini_moka::sync::Cache;
use reqwest::{Client, header};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::constants::{GEOIP_URL, GEOLOCATION_MAX_AGE, GEOLOCATION_TIMEOUT, USER_AGENT};
use crate::location::Coordinates;

/// Lookup options, same knobs a browser position request takes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub timeout: Duration,
    /// a cached position younger than this is returned without a lookup
    pub maximum_age: Duration,
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: GEOLOCATION_TIMEOUT,
            maximum_age: GEOLOCATION_MAX_AGE,
            high_accuracy: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum GeolocationError {
    #[error("geolocation not available")]
    Unavailable,
    #[error("geolocation denied: {0}")]
    Denied(String),
    #[error("geolocation timed out after {0:?}")]
    Timeout(Duration),
    #[error("geolocation lookup failed: {0}")]
    Lookup(#[from] reqwest::Error),
    #[error("geolocation returned invalid position ({0}, {1})")]
    InvalidPosition(f64, f64),
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<Coordinates, GeolocationError>;
}

#[derive(Debug, Deserialize)]
pub struct GeoLocation {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy)]
struct CachedPosition {
    coords: Coordinates,
    at: Instant,
}

/// IP based position lookup
pub struct GeoIpLocator {
    client: Client,
    url: String,
    cache: Arc<Cache<&'static str, CachedPosition>>,
}

const CACHE_KEY: &str = "position";

impl GeoIpLocator {
    pub fn new() -> Result<Self, GeolocationError> {
        Self::with_url(GEOIP_URL)
    }

    pub fn with_url(url: &str) -> Result<Self, GeolocationError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            cache: Arc::new(Cache::new(1)),
        })
    }

    async fn lookup(&self) -> Result<GeoLocation, GeolocationError> {
        let geo = self.client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()? // none 2xx raise
            .json::<GeoLocation>()
            .await?;
        Ok(geo)
    }
}

#[async_trait]
impl Geolocator for GeoIpLocator {
    async fn current_position(&self, options: &PositionOptions) -> Result<Coordinates, GeolocationError> {
        if let Some(cached) = self.cache.get(&CACHE_KEY) {
            if cached.at.elapsed() <= options.maximum_age {
                debug!("Using cached position {}", cached.coords);
                return Ok(cached.coords);
            }
        }

        let geo = tokio::time::timeout(options.timeout, self.lookup())
            .await
            .map_err(|_| GeolocationError::Timeout(options.timeout))??;

        let coords = Coordinates { lat: geo.latitude, lon: geo.longitude };
        if !coords.is_valid() {
            return Err(GeolocationError::InvalidPosition(geo.latitude, geo.longitude));
        }
        debug!(
            "GeoIP position {} ({})",
            coords,
            geo.city.as_deref().unwrap_or("unknown city")
        );
        self.cache.insert(CACHE_KEY, CachedPosition { coords, at: Instant::now() });
        Ok(coords)
    }
}

/// Configured coordinates, always succeeds
pub struct FixedLocator(pub Coordinates);

#[async_trait]
impl Geolocator for FixedLocator {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

/// Host without any position capability
pub struct NoGeolocation;

#[async_trait]
impl Geolocator for NoGeolocation {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unavailable)
    }
}
