/*
 *  display/error.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types for the display subsystem
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
use std::error::Error;

use crate::display::traits::{Slot, Widget, SlideId};

/// Unified error type for all surface operations
#[derive(Debug)]
pub enum DisplayError {
    /// Surface does not define this text slot
    MissingSlot(Slot),

    /// Surface does not define this widget
    MissingWidget(Widget),

    /// Surface has no slideshow container
    NoSlideshow,

    /// Layer id not present (already pruned)
    UnknownSlide(SlideId),

    /// Writing a frame out failed
    Io(std::io::Error),

    /// Generic error with message
    Other(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::MissingSlot(slot) =>
                write!(f, "Display slot '{}' not available", slot),
            DisplayError::MissingWidget(widget) =>
                write!(f, "Widget '{}' not available", widget),
            DisplayError::NoSlideshow =>
                write!(f, "Surface has no slideshow container"),
            DisplayError::UnknownSlide(id) =>
                write!(f, "Slide layer {} not found", id),
            DisplayError::Io(err) =>
                write!(f, "Display I/O error: {}", err),
            DisplayError::Other(msg) =>
                write!(f, "{}", msg),
        }
    }
}

impl Error for DisplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DisplayError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(err: std::io::Error) -> Self {
        DisplayError::Io(err)
    }
}
