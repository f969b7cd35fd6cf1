/*
 *  display/components/weather.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Weather display component
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use crate::display::components::clock::ClockFormatter;
use crate::display::error::DisplayError;
use crate::display::traits::{Slot, Surface};
use crate::weather::WeatherSnapshot;

const DETAIL_SEPARATOR: &str = " · ";

/// Rendered weather panel text, one string per slot
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherView {
    pub location: String,
    pub temperature: String,
    pub description: String,
    pub details: String,
    pub updated: String,
}

impl WeatherView {
    pub fn from_snapshot(snapshot: &WeatherSnapshot, clock: &ClockFormatter) -> Self {
        let temperature = match snapshot.temperature {
            Some(t) => format!("{}°C", t.round() as i64),
            None => "--°".to_string(),
        };

        let mut parts = Vec::with_capacity(5);
        if let Some(feels) = snapshot.feels_like {
            parts.push(format!("Feels like {}°", feels.round() as i64));
        }
        if let Some(humidity) = snapshot.humidity {
            parts.push(format!("Humidity {}%", humidity.round() as i64));
        }
        parts.push(format!("Wind {} km/h", snapshot.wind_speed_kmh));
        if let Some(probability) = snapshot.precipitation_probability_pct {
            parts.push(format!("Rain {}%", probability.round() as i64));
        }
        if snapshot.precipitation_mm > 0.0 {
            parts.push(format!("Precip {} mm", snapshot.precipitation_mm));
        }

        Self {
            location: "Weather".to_string(),
            temperature,
            description: snapshot.description.to_string(),
            details: parts.join(DETAIL_SEPARATOR),
            updated: format!("Updated {}", clock.short_time(&snapshot.updated_at)),
        }
    }

    /// The status region gates the whole weather panel
    pub fn supported(surface: &dyn Surface) -> bool {
        surface.has_slot(Slot::WeatherStatus)
    }

    /// Write every slot the surface has, skip the rest
    pub fn render(&self, surface: &mut dyn Surface) -> Result<(), DisplayError> {
        let slots = [
            (Slot::WeatherLocation, &self.location),
            (Slot::WeatherTemp, &self.temperature),
            (Slot::WeatherDesc, &self.description),
            (Slot::WeatherExtra, &self.details),
            (Slot::WeatherUpdated, &self.updated),
        ];
        for (slot, text) in slots {
            if surface.has_slot(slot) {
                surface.set_text(slot, text)?;
            }
        }
        Ok(())
    }

    pub fn set_status(surface: &mut dyn Surface, status: &str) -> Result<(), DisplayError> {
        surface.set_text(Slot::WeatherStatus, status)
    }
}
