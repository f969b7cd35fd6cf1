/*
 *  display/drivers/memory.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  In-memory surface - headless runs and tests
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

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::display::error::DisplayError;
use crate::display::traits::{
    Position, SlideId, SlideLayer, Slot, Surface, SurfaceCapabilities, Widget,
};

/// In-memory surface
///
/// Keeps the complete surface state (slot text, slide layers, widget classes
/// and positions) and records operation counts. The state is shared so tests
/// can inspect it while a clone of the driver is owned by the dashboard.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    capabilities: SurfaceCapabilities,
    state: Arc<Mutex<MemoryDriverState>>,
}

/// Surface state (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MemoryDriverState {
    pub texts: BTreeMap<Slot, String>,
    pub slides: Vec<SlideLayer>,
    pub classes: BTreeMap<Widget, BTreeSet<&'static str>>,
    pub positions: BTreeMap<Widget, Position>,
    next_slide_id: SlideId,

    /// Number of set_text calls per slot
    pub text_writes: BTreeMap<Slot, usize>,
    /// Number of restarted animations
    pub animation_restarts: usize,
    pub flush_count: usize,

    /// Simulate failures (for error testing)
    pub simulate_failure: bool,
}

impl MemoryDriverState {
    pub fn text(&self, slot: Slot) -> Option<&str> {
        self.texts.get(&slot).map(String::as_str)
    }

    pub fn visible_slides(&self) -> Vec<&SlideLayer> {
        self.slides.iter().filter(|s| s.visible).collect()
    }

    pub fn has_class(&self, widget: Widget, class: &str) -> bool {
        self.classes.get(&widget).is_some_and(|c| c.contains(class))
    }

    pub fn position(&self, widget: Widget) -> Position {
        self.positions.get(&widget).copied().unwrap_or_default()
    }
}

impl MemoryDriver {
    pub fn new(capabilities: SurfaceCapabilities) -> Self {
        Self {
            capabilities,
            state: Arc::new(Mutex::new(MemoryDriverState::default())),
        }
    }

    /// Surface with every slot and widget of the kiosk page
    pub fn full() -> Self {
        Self::new(SurfaceCapabilities::full())
    }

    pub fn state(&self) -> Arc<Mutex<MemoryDriverState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryDriverState>, DisplayError> {
        let state = self
            .state
            .lock()
            .map_err(|_| DisplayError::Other("memory surface state poisoned".to_string()))?;
        if state.simulate_failure {
            return Err(DisplayError::Other("simulated surface failure".to_string()));
        }
        Ok(state)
    }

    fn check_widget(&self, widget: Widget) -> Result<(), DisplayError> {
        if self.has_widget(widget) {
            Ok(())
        } else {
            Err(DisplayError::MissingWidget(widget))
        }
    }
}

impl Surface for MemoryDriver {
    fn capabilities(&self) -> &SurfaceCapabilities {
        &self.capabilities
    }

    fn set_text(&mut self, slot: Slot, text: &str) -> Result<(), DisplayError> {
        if !self.has_slot(slot) {
            return Err(DisplayError::MissingSlot(slot));
        }
        let mut state = self.lock()?;
        *state.text_writes.entry(slot).or_insert(0) += 1;
        state.texts.insert(slot, text.to_string());
        Ok(())
    }

    fn push_slide(&mut self, url: &str) -> Result<SlideId, DisplayError> {
        if !self.capabilities.slideshow {
            return Err(DisplayError::NoSlideshow);
        }
        let mut state = self.lock()?;
        for slide in state.slides.iter_mut() {
            slide.visible = false;
        }
        state.next_slide_id += 1;
        let id = state.next_slide_id;
        state.slides.push(SlideLayer { id, url: url.to_string(), visible: true });
        Ok(id)
    }

    fn prune_slides(&mut self, keep: SlideId) -> Result<usize, DisplayError> {
        let mut state = self.lock()?;
        let pos = state
            .slides
            .iter()
            .position(|s| s.id == keep)
            .ok_or(DisplayError::UnknownSlide(keep))?;
        state.slides.drain(..pos);
        Ok(pos)
    }

    fn set_class(&mut self, widget: Widget, class: &'static str, on: bool) -> Result<(), DisplayError> {
        self.check_widget(widget)?;
        let mut state = self.lock()?;
        let classes = state.classes.entry(widget).or_default();
        if on {
            classes.insert(class);
        } else {
            classes.remove(class);
        }
        Ok(())
    }

    fn has_class(&self, widget: Widget, class: &'static str) -> bool {
        self.state
            .lock()
            .map(|s| s.has_class(widget, class))
            .unwrap_or(false)
    }

    fn restart_animation(&mut self, widget: Widget, class: &'static str) -> Result<(), DisplayError> {
        self.set_class(widget, class, false)?;
        self.set_class(widget, class, true)?;
        self.lock()?.animation_restarts += 1;
        Ok(())
    }

    fn set_position(&mut self, widget: Widget, position: Position) -> Result<(), DisplayError> {
        self.check_widget(widget)?;
        self.lock()?.positions.insert(widget, position);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.lock()?.flush_count += 1;
        Ok(())
    }
}
