/*
 *  display/components/clock.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Clock display component
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

use chrono::{DateTime, Local, Locale, TimeZone, Utc};
use log::{debug, warn};

use crate::display::error::DisplayError;
use crate::display::traits::{Slot, Surface};

const TIME_FORMAT: &str = "%H:%M";
const DATE_FORMAT: &str = "%A, %B %-d";
const SHORT_TIME_24H: &str = "%H:%M";
const SHORT_TIME_12H: &str = "%-I:%M %p";

/// Turn a POSIX locale string ("de_DE.UTF-8@euro") into a chrono locale
pub fn parse_locale(name: &str) -> Option<Locale> {
    let base = name.split(['.', '@']).next().unwrap_or("").trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Locale::try_from(base.replace('-', "_").as_str()).ok()
}

/// Locale from the first of LC_ALL, LC_TIME, LANG that parses
pub fn host_locale() -> Option<Locale> {
    ["LC_ALL", "LC_TIME", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|v| parse_locale(&v))
}

/// 24-hour time and long-form date in the configured locale
#[derive(Debug, Clone, Copy)]
pub struct ClockFormatter {
    locale: Locale,
}

impl Default for ClockFormatter {
    fn default() -> Self {
        Self { locale: Locale::en_US }
    }
}

impl ClockFormatter {
    /// Configured locale first, then the host environment, then en_US
    pub fn new(locale: Option<&str>) -> Self {
        let configured = locale.and_then(|l| {
            let parsed = parse_locale(l);
            if parsed.is_none() {
                warn!("Unknown locale '{}', using host locale", l);
            }
            parsed
        });
        let locale = configured.or_else(host_locale).unwrap_or(Locale::en_US);
        debug!("Clock locale {:?}", locale);
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        now.format_localized(TIME_FORMAT, self.locale).to_string()
    }

    pub fn date<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        now.format_localized(DATE_FORMAT, self.locale).to_string()
    }

    /// Hours and minutes in the locale's own 12 or 24 hour convention
    pub fn short_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let format = if self.uses_24_hour() { SHORT_TIME_24H } else { SHORT_TIME_12H };
        now.format_localized(format, self.locale).to_string()
    }

    /// The locale time representation of 13:00 tells the hour convention
    fn uses_24_hour(&self) -> bool {
        Utc.with_ymd_and_hms(2000, 1, 1, 13, 0, 0)
            .single()
            .map(|t| t.format_localized("%X", self.locale).to_string().contains("13"))
            .unwrap_or(true)
    }
}

/// Clock display state
#[derive(Debug, Clone, Default)]
pub struct ClockState {
    pub last_time_drawn: String,
    pub last_date_drawn: String,
}

/// Clock display component
pub struct ClockDisplay {
    formatter: ClockFormatter,
    state: ClockState,
    disabled_logged: bool,
}

impl ClockDisplay {
    pub fn new(formatter: ClockFormatter) -> Self {
        Self {
            formatter,
            state: ClockState::default(),
            disabled_logged: false,
        }
    }

    /// Both the time and the date region are required
    pub fn supported(surface: &dyn Surface) -> bool {
        surface.has_slot(Slot::Time) && surface.has_slot(Slot::Date)
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    /// Write the current time and date. Returns false when the clock is disabled.
    pub fn tick(&mut self, surface: &mut dyn Surface, now: &DateTime<Local>) -> Result<bool, DisplayError> {
        if !Self::supported(surface) {
            if !self.disabled_logged {
                warn!("Clock disabled, surface has no time/date region");
                self.disabled_logged = true;
            }
            return Ok(false);
        }

        let time = self.formatter.time(now);
        if time != self.state.last_time_drawn {
            surface.set_text(Slot::Time, &time)?;
            self.state.last_time_drawn = time;
        }
        let date = self.formatter.date(now);
        if date != self.state.last_date_drawn {
            surface.set_text(Slot::Date, &date)?;
            self.state.last_date_drawn = date;
        }
        Ok(true)
    }
}
