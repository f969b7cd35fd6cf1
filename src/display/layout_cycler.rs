/*
 *  display/layout_cycler.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Burn-in avoidance - walks the status button around the screen corners
 *  and swaps the clock/weather arrangement on every other step
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

use log::{debug, error};

use crate::constants::SWAP_FLIP_DELAY;
use crate::display::error::DisplayError;
use crate::display::factory::SharedSurface;
use crate::display::traits::{Position, Surface, Widget};

pub const FLOATING_ANIMATED: &str = "floating-animated";
pub const SWAP_MODE: &str = "swap-mode";
pub const SWAP_REVERSE: &str = "swap-reverse";
pub const SWAP_TRANSITION: &str = "swap-transition";
pub const SWAP_SLIDE_LEFT: &str = "swap-slide-left";
pub const SWAP_SLIDE_RIGHT: &str = "swap-slide-right";
pub const SWAP_PULSE: &str = "swap-pulse";

/// Screen corner, in rotation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopRight = 0,
    BottomRight = 1,
    BottomLeft = 2,
    TopLeft = 3,
}

impl Corner {
    pub fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Corner::TopRight,
            1 => Corner::BottomRight,
            2 => Corner::BottomLeft,
            _ => Corner::TopLeft,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Self {
        Corner::from_index(self.index() + 1)
    }

    /// Odd corners use the swapped clock/weather arrangement
    pub fn is_swapped(self) -> bool {
        self.index() % 2 != 0
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Corner::TopRight => "top-right",
            Corner::BottomRight => "bottom-right",
            Corner::BottomLeft => "bottom-left",
            Corner::TopLeft => "top-left",
        })
    }
}

/// Outcome of one cycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclePlan {
    pub corner: Corner,
    pub swapped: bool,
    /// true: clock on the right after the swap animation
    pub side: bool,
}

/// Corner rotation state machine
#[derive(Debug, Default)]
pub struct LayoutCycler {
    corner_index: u8,
    swap_side: bool,
    cycles: u64,
}

impl LayoutCycler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn corner(&self) -> Corner {
        Corner::from_index(self.corner_index)
    }

    pub fn swap_side(&self) -> bool {
        self.swap_side
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Clock, weather and the status button are all required; content is optional
    pub fn supported(surface: &dyn Surface) -> bool {
        [Widget::Clock, Widget::Weather, Widget::StatusButton]
            .iter()
            .all(|w| surface.has_widget(*w))
    }

    /// Step the state machine. Always moves exactly one corner.
    pub fn advance(&mut self) -> CyclePlan {
        self.corner_index = (self.corner_index + 1) % 4;
        self.cycles += 1;
        let corner = self.corner();
        let swapped = corner.is_swapped();
        self.swap_side = if swapped { !self.swap_side } else { false };
        CyclePlan { corner, swapped, side: self.swap_side }
    }

    /// One-off setup before the first cycle
    pub fn prepare(surface: &mut dyn Surface) -> Result<(), DisplayError> {
        for widget in [Widget::Clock, Widget::Weather, Widget::StatusButton] {
            surface.set_class(widget, FLOATING_ANIMATED, true)?;
        }
        Ok(())
    }

    /// Apply the immediate part of a cycle step
    pub fn apply(plan: &CyclePlan, surface: &mut dyn Surface) -> Result<(), DisplayError> {
        let has_content = surface.has_widget(Widget::Content);

        for widget in [Widget::Clock, Widget::Weather, Widget::StatusButton] {
            surface.set_position(widget, Position::Default)?;
        }

        if plan.swapped {
            if has_content {
                surface.set_class(Widget::Content, SWAP_MODE, true)?;
            }
            surface.set_position(Widget::Weather, Position::Static)?;
            surface.set_position(Widget::Clock, Position::Static)?;
            surface.set_class(Widget::Weather, SWAP_TRANSITION, true)?;
            surface.set_class(Widget::Clock, SWAP_TRANSITION, true)?;

            // start offset the opposite way so clearing the class animates the move
            let (clock_from, weather_from) = if plan.side {
                (SWAP_SLIDE_RIGHT, SWAP_SLIDE_LEFT)
            } else {
                (SWAP_SLIDE_LEFT, SWAP_SLIDE_RIGHT)
            };
            surface.set_class(Widget::Clock, clock_from, true)?;
            surface.set_class(Widget::Weather, weather_from, true)?;
        } else {
            if has_content {
                surface.set_class(Widget::Content, SWAP_MODE, false)?;
                surface.set_class(Widget::Content, SWAP_REVERSE, false)?;
            }
            surface.set_class(Widget::Weather, SWAP_TRANSITION, false)?;
            surface.set_class(Widget::Clock, SWAP_TRANSITION, false)?;
        }

        surface.restart_animation(Widget::Clock, SWAP_PULSE)?;
        surface.restart_animation(Widget::Weather, SWAP_PULSE)?;

        surface.set_position(Widget::StatusButton, Position::Fixed(plan.corner))?;
        Ok(())
    }

    /// Delayed part of a swapped step: flip order and clear the slide offsets
    pub fn finish_swap(plan: &CyclePlan, surface: &mut dyn Surface) -> Result<(), DisplayError> {
        if surface.has_widget(Widget::Content) {
            surface.set_class(Widget::Content, SWAP_REVERSE, plan.side)?;
        }
        for widget in [Widget::Clock, Widget::Weather] {
            surface.set_class(widget, SWAP_SLIDE_LEFT, false)?;
            surface.set_class(widget, SWAP_SLIDE_RIGHT, false)?;
        }
        Ok(())
    }

    /// Full cycle against the shared surface, including the short flip delay
    pub async fn run_cycle(&mut self, surface: &SharedSurface) -> CyclePlan {
        let plan = self.advance();
        debug!("Layout cycle {} -> {} (swapped: {})", self.cycles, plan.corner, plan.swapped);
        {
            let mut surface = surface.lock().await;
            if let Err(e) = Self::apply(&plan, surface.as_mut()).and_then(|_| surface.flush()) {
                error!("Layout cycle failed to apply: {}", e);
            }
        }
        if plan.swapped {
            tokio::time::sleep(SWAP_FLIP_DELAY).await;
            let mut surface = surface.lock().await;
            if let Err(e) = Self::finish_swap(&plan, surface.as_mut()).and_then(|_| surface.flush()) {
                error!("Layout swap failed to complete: {}", e);
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::memory::MemoryDriver;
    use crate::display::factory::share;
    use crate::display::traits::SurfaceCapabilities;

    #[test]
    fn test_corner_rotation_period_four() {
        let mut cycler = LayoutCycler::new();
        assert_eq!(cycler.corner(), Corner::TopRight);

        let corners: Vec<Corner> = (0..4).map(|_| cycler.advance().corner).collect();
        assert_eq!(
            corners,
            vec![Corner::BottomRight, Corner::BottomLeft, Corner::TopLeft, Corner::TopRight]
        );
        assert_eq!(cycler.corner().index(), 0);
    }

    #[test]
    fn test_swap_on_odd_cycles() {
        let mut cycler = LayoutCycler::new();
        for tick in 1..=8u64 {
            let plan = cycler.advance();
            assert_eq!(plan.swapped, tick % 2 == 1, "tick {}", tick);
            assert_eq!(plan.corner.index() as u64, tick % 4);
        }
    }

    #[test]
    fn test_side_resets_on_even_corner() {
        let mut cycler = LayoutCycler::new();
        let first = cycler.advance();
        assert!(first.side);
        let second = cycler.advance();
        assert!(!second.side);
        assert!(!cycler.swap_side());
        let third = cycler.advance();
        assert!(third.side);
    }

    #[test]
    fn test_apply_swapped_and_default() {
        let mut surface = MemoryDriver::full();
        let mut cycler = LayoutCycler::new();

        let plan = cycler.advance();
        LayoutCycler::apply(&plan, &mut surface).unwrap();
        {
            let state = surface.state();
            let state = state.lock().unwrap();
            assert!(state.has_class(Widget::Content, SWAP_MODE));
            assert!(state.has_class(Widget::Clock, SWAP_SLIDE_RIGHT));
            assert!(state.has_class(Widget::Weather, SWAP_SLIDE_LEFT));
            assert_eq!(state.position(Widget::Clock), Position::Static);
            assert_eq!(state.position(Widget::StatusButton), Position::Fixed(Corner::BottomRight));
            assert_eq!(state.animation_restarts, 2);
        }

        LayoutCycler::finish_swap(&plan, &mut surface).unwrap();
        {
            let state = surface.state();
            let state = state.lock().unwrap();
            assert!(state.has_class(Widget::Content, SWAP_REVERSE));
            assert!(!state.has_class(Widget::Clock, SWAP_SLIDE_RIGHT));
            assert!(!state.has_class(Widget::Weather, SWAP_SLIDE_LEFT));
        }

        let plan = cycler.advance();
        LayoutCycler::apply(&plan, &mut surface).unwrap();
        let state = surface.state();
        let state = state.lock().unwrap();
        assert!(!state.has_class(Widget::Content, SWAP_MODE));
        assert!(!state.has_class(Widget::Content, SWAP_REVERSE));
        assert!(!state.has_class(Widget::Clock, SWAP_TRANSITION));
        assert_eq!(state.position(Widget::Clock), Position::Default);
        assert_eq!(state.position(Widget::StatusButton), Position::Fixed(Corner::BottomLeft));
    }

    #[test]
    fn test_supported_requires_core_widgets() {
        let caps = SurfaceCapabilities { slots: vec![], widgets: vec![Widget::Clock, Widget::Weather], slideshow: false };
        assert!(!LayoutCycler::supported(&MemoryDriver::new(caps)));
        assert!(LayoutCycler::supported(&MemoryDriver::full()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cycle_completes_swap() {
        let driver = MemoryDriver::full();
        let state = driver.state();
        let surface = share(Box::new(driver));

        let mut cycler = LayoutCycler::new();
        let plan = cycler.run_cycle(&surface).await;
        assert!(plan.swapped);

        let state = state.lock().unwrap();
        assert!(state.has_class(Widget::Content, SWAP_REVERSE));
        assert!(!state.has_class(Widget::Clock, SWAP_SLIDE_RIGHT));
        assert_eq!(state.flush_count, 2);
    }
}
