/*
 *  display/traits.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for the rendering surface abstraction
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

use std::fmt;

use crate::display::error::DisplayError;
use crate::display::layout_cycler::Corner;

/// Named text regions owned by the subsystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Time,
    Date,
    WeatherLocation,
    WeatherUpdated,
    WeatherTemp,
    WeatherDesc,
    WeatherExtra,
    WeatherStatus,
}

impl Slot {
    pub const ALL: [Slot; 8] = [
        Slot::Time,
        Slot::Date,
        Slot::WeatherLocation,
        Slot::WeatherUpdated,
        Slot::WeatherTemp,
        Slot::WeatherDesc,
        Slot::WeatherExtra,
        Slot::WeatherStatus,
    ];

    /// Stable element id, matches the markup the kiosk page ships with
    pub fn id(&self) -> &'static str {
        match self {
            Slot::Time => "time",
            Slot::Date => "date",
            Slot::WeatherLocation => "weather-location",
            Slot::WeatherUpdated => "weather-updated",
            Slot::WeatherTemp => "weather-temp",
            Slot::WeatherDesc => "weather-desc",
            Slot::WeatherExtra => "weather-extra",
            Slot::WeatherStatus => "weather-status",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Movable blocks the layout cycler repositions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Widget {
    Clock,
    Weather,
    StatusButton,
    /// Container holding clock and weather side by side
    Content,
}

impl Widget {
    pub const ALL: [Widget; 4] = [Widget::Clock, Widget::Weather, Widget::StatusButton, Widget::Content];
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Widget::Clock => "clock",
            Widget::Weather => "weather",
            Widget::StatusButton => "fullscreen-btn",
            Widget::Content => "content",
        })
    }
}

/// Positioning applied to a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Whatever the stylesheet says
    #[default]
    Default,
    /// In normal flow, side by side inside the content container
    Static,
    /// Pinned to a screen corner
    Fixed(Corner),
}

pub type SlideId = u64;

/// One full-screen background layer
#[derive(Debug, Clone, PartialEq)]
pub struct SlideLayer {
    pub id: SlideId,
    pub url: String,
    pub visible: bool,
}

/// What a surface actually provides. Subsystems whose regions are missing
/// stay disabled instead of failing.
#[derive(Debug, Clone)]
pub struct SurfaceCapabilities {
    pub slots: Vec<Slot>,
    pub widgets: Vec<Widget>,
    pub slideshow: bool,
}

impl SurfaceCapabilities {
    /// Everything the kiosk page defines
    pub fn full() -> Self {
        Self {
            slots: Slot::ALL.to_vec(),
            widgets: Widget::ALL.to_vec(),
            slideshow: true,
        }
    }
}

/// Rendering surface - the only place any subsystem writes output to.
///
/// Operations are synchronous and cheap; callers hold the surface lock only
/// for the duration of an update, never across network waits.
pub trait Surface: Send {
    fn capabilities(&self) -> &SurfaceCapabilities;

    fn has_slot(&self, slot: Slot) -> bool {
        self.capabilities().slots.contains(&slot)
    }

    fn has_widget(&self, widget: Widget) -> bool {
        self.capabilities().widgets.contains(&widget)
    }

    /// Replace the text content of a slot
    fn set_text(&mut self, slot: Slot, text: &str) -> Result<(), DisplayError>;

    /// Hide every existing slide layer and append a new visible one on top
    fn push_slide(&mut self, url: &str) -> Result<SlideId, DisplayError>;

    /// Remove all layers stacked below `keep`, returns how many were dropped
    fn prune_slides(&mut self, keep: SlideId) -> Result<usize, DisplayError>;

    fn set_class(&mut self, widget: Widget, class: &'static str, on: bool) -> Result<(), DisplayError>;

    fn has_class(&self, widget: Widget, class: &'static str) -> bool;

    /// Remove and re-add a class so its animation starts over
    fn restart_animation(&mut self, widget: Widget, class: &'static str) -> Result<(), DisplayError> {
        self.set_class(widget, class, false)?;
        self.set_class(widget, class, true)
    }

    fn set_position(&mut self, widget: Widget, position: Position) -> Result<(), DisplayError>;

    /// Present pending changes. Surfaces that render immediately keep the default.
    fn flush(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}
