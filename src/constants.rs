/*
 *  constants.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
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

use std::time::Duration;

use crate::location::Coordinates;

pub const CLOCK_UPDATE: Duration = Duration::from_millis(1000);
pub const SLIDESHOW_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const WEATHER_REFRESH: Duration = Duration::from_secs(15 * 60);
pub const LAYOUT_CYCLE_INTERVAL: Duration = Duration::from_secs(42);

/// Delay between a slide transition and pruning of the older layers
pub const SLIDE_PRUNE_DELAY: Duration = Duration::from_millis(2000);
/// Delay before the swapped layout flips sides, lets the slide-in classes apply
pub const SWAP_FLIP_DELAY: Duration = Duration::from_millis(40);

pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const GEOLOCATION_MAX_AGE: Duration = Duration::from_secs(15 * 60);

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const PICSUM_URL: &str = "https://picsum.photos/1920/1080";
pub const GEOIP_URL: &str = "https://ipapi.co/json/";

/// Bucharest, Romania
pub const DEFAULT_COORDS: Coordinates = Coordinates { lat: 44.4323, lon: 26.1063 };

pub const FALLBACK_IMAGES: [&str; 7] = [
    "Wallpaper/20251109_155809.jpg",
    "Wallpaper/42916480792-cd4b5fcfdf-o.jpg",
    "Wallpaper/52515250436_6ea8fea1ca_o.jpg",
    "Wallpaper/deadpool-pointing-a-gun-meme-cwy6tfv11olwv8mb.jpg",
    "Wallpaper/johnny-sins-wacky-selfie-qkwwxm0y83pqf8jp.jpg",
    "Wallpaper/pexels-mustang-2179483.jpg",
    "Wallpaper/pexels-phil-kallahar-983200.jpg",
];

// weather status line
pub const STATUS_FETCHING: &str = "Fetching weather...";
pub const STATUS_FAILED: &str = "Unable to update weather right now.";

pub const USER_AGENT: &str = concat!("MirrorBoard ", env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));
