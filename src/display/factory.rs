/*
 *  display/factory.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Surface factory - builds the configured surface driver
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

use std::sync::Arc;

use log::info;
use tokio::sync::Mutex as TokMutex;

use crate::config::{DisplayConfig, DriverKind};
use crate::display::drivers::console::ConsoleDriver;
use crate::display::drivers::memory::MemoryDriver;
use crate::display::traits::{Surface, SurfaceCapabilities};

/// Type alias for boxed surface trait objects
pub type BoxedSurface = Box<dyn Surface>;

/// Surface shared between the subsystem tasks
pub type SharedSurface = Arc<TokMutex<BoxedSurface>>;

pub fn share(surface: BoxedSurface) -> SharedSurface {
    Arc::new(TokMutex::new(surface))
}

/// Factory for creating surfaces from configuration
pub struct SurfaceFactory;

impl SurfaceFactory {
    pub fn create_from_config(config: &DisplayConfig) -> BoxedSurface {
        let kind = config.driver.clone().unwrap_or_default();
        info!("Creating {:?} surface", kind);
        match kind {
            DriverKind::Console => Box::new(ConsoleDriver::new(
                SurfaceCapabilities::full(),
                config.clear_screen.unwrap_or(true),
            )),
            DriverKind::Memory => Box::new(MemoryDriver::full()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::traits::Slot;

    #[test]
    fn test_default_driver_is_console() {
        let surface = SurfaceFactory::create_from_config(&DisplayConfig::default());
        assert!(surface.has_slot(Slot::Time));
        assert!(surface.capabilities().slideshow);
    }

    #[test]
    fn test_memory_driver_from_config() {
        let config = DisplayConfig { driver: Some(DriverKind::Memory), ..Default::default() };
        let mut surface = SurfaceFactory::create_from_config(&config);
        assert!(surface.set_text(Slot::Date, "Friday").is_ok());
    }
}
