/*
 *  location.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *  Location service - coordinates from the position provider, or the fallback pair
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

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geoloc::{Geolocator, PositionOptions};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Source of location data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationSource {
    Provider,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub coords: Coordinates,
    pub source: LocationSource,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.coords,
            match self.source {
                LocationSource::Provider => "provider",
                LocationSource::Fallback => "fallback",
            })
    }
}

/// Ask the provider for a position; any failure resolves to `fallback`.
pub async fn resolve_coordinates(
    locator: &dyn Geolocator,
    options: &PositionOptions,
    fallback: Coordinates,
) -> Location {
    match locator.current_position(options).await {
        Ok(coords) if coords.is_valid() => {
            info!("Using position {}", coords);
            Location { coords, source: LocationSource::Provider }
        }
        Ok(coords) => {
            warn!("Invalid position {}, using fallback {}", coords, fallback);
            Location { coords: fallback, source: LocationSource::Fallback }
        }
        Err(e) => {
            warn!("{}, using fallback {}", e, fallback);
            Location { coords: fallback, source: LocationSource::Fallback }
        }
    }
}
