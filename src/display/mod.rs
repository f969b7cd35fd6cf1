/*
 *  display/mod.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - surface abstraction, drivers and components
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

// Core trait definitions
pub mod traits;
pub mod error;
pub mod factory;

// Surface drivers
pub mod drivers;

// UI components
pub mod components;

// Burn-in avoidance
pub mod layout_cycler;

// Re-exports for convenience
pub use traits::{Position, SlideId, SlideLayer, Slot, Surface, SurfaceCapabilities, Widget};
pub use error::DisplayError;
pub use factory::{share, BoxedSurface, SharedSurface, SurfaceFactory};
pub use layout_cycler::{Corner, CyclePlan, LayoutCycler};
