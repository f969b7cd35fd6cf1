/*
 *  display/drivers/console.rs
 *
 *  MirrorBoard - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Console surface - renders the dashboard as a text frame on stdout
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

use std::fmt::Write as _;
use std::io::Write;

use crate::display::drivers::memory::{MemoryDriver, MemoryDriverState};
use crate::display::error::DisplayError;
use crate::display::traits::{
    Position, SlideId, Slot, Surface, SurfaceCapabilities, Widget,
};

/// Console surface
///
/// Holds state exactly like the memory driver and, on flush, redraws a
/// compact text frame when anything visible changed.
pub struct ConsoleDriver {
    inner: MemoryDriver,
    out: Box<dyn Write + Send>,
    last_frame: String,
    clear_screen: bool,
}

impl ConsoleDriver {
    pub fn new(capabilities: SurfaceCapabilities, clear_screen: bool) -> Self {
        Self::with_writer(capabilities, clear_screen, Box::new(std::io::stdout()))
    }

    pub fn with_writer(capabilities: SurfaceCapabilities, clear_screen: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: MemoryDriver::new(capabilities),
            out,
            last_frame: String::new(),
            clear_screen,
        }
    }
}

/// Text rendition of the surface state
pub fn render_frame(state: &MemoryDriverState) -> String {
    let text = |slot: Slot| state.text(slot).unwrap_or("");
    let mut frame = String::new();

    let _ = writeln!(frame, "  {}  {}", text(Slot::Time), text(Slot::Date));
    let _ = writeln!(
        frame,
        "  {}: {} {}",
        text(Slot::WeatherLocation),
        text(Slot::WeatherTemp),
        text(Slot::WeatherDesc)
    );
    let _ = writeln!(frame, "  {}", text(Slot::WeatherExtra));
    let _ = writeln!(frame, "  {} {}", text(Slot::WeatherUpdated), text(Slot::WeatherStatus));

    if let Some(slide) = state.visible_slides().last() {
        let _ = writeln!(frame, "  background: {}", slide.url);
    }
    let layout = if state.has_class(Widget::Content, "swap-mode") {
        if state.has_class(Widget::Content, "swap-reverse") { "swapped (reversed)" } else { "swapped" }
    } else {
        "default"
    };
    let button = match state.position(Widget::StatusButton) {
        Position::Fixed(corner) => corner.to_string(),
        _ => "-".to_string(),
    };
    let _ = writeln!(frame, "  layout: {}  button: {}", layout, button);
    frame
}

impl Surface for ConsoleDriver {
    fn capabilities(&self) -> &SurfaceCapabilities {
        self.inner.capabilities()
    }

    fn set_text(&mut self, slot: Slot, text: &str) -> Result<(), DisplayError> {
        self.inner.set_text(slot, text)
    }

    fn push_slide(&mut self, url: &str) -> Result<SlideId, DisplayError> {
        self.inner.push_slide(url)
    }

    fn prune_slides(&mut self, keep: SlideId) -> Result<usize, DisplayError> {
        self.inner.prune_slides(keep)
    }

    fn set_class(&mut self, widget: Widget, class: &'static str, on: bool) -> Result<(), DisplayError> {
        self.inner.set_class(widget, class, on)
    }

    fn has_class(&self, widget: Widget, class: &'static str) -> bool {
        self.inner.has_class(widget, class)
    }

    fn restart_animation(&mut self, widget: Widget, class: &'static str) -> Result<(), DisplayError> {
        self.inner.restart_animation(widget, class)
    }

    fn set_position(&mut self, widget: Widget, position: Position) -> Result<(), DisplayError> {
        self.inner.set_position(widget, position)
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.inner.flush()?;
        let frame = {
            let state = self.inner.state();
            let state = state
                .lock()
                .map_err(|_| DisplayError::Other("console surface state poisoned".to_string()))?;
            render_frame(&state)
        };
        if frame == self.last_frame {
            return Ok(());
        }
        if self.clear_screen {
            // home cursor, clear screen
            self.out.write_all(b"\x1b[H\x1b[2J")?;
        }
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()?;
        self.last_frame = frame;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Writer that appends into a shared buffer
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_flush_writes_only_on_change() {
        let buf = SharedBuf::default();
        let mut driver = ConsoleDriver::with_writer(SurfaceCapabilities::full(), false, Box::new(buf.clone()));

        driver.set_text(Slot::Time, "09:41").unwrap();
        driver.flush().unwrap();
        let first_len = buf.0.lock().unwrap().len();
        assert!(first_len > 0);

        // unchanged frame is not redrawn
        driver.flush().unwrap();
        assert_eq!(buf.0.lock().unwrap().len(), first_len);

        driver.set_text(Slot::Time, "09:42").unwrap();
        driver.flush().unwrap();
        let out = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("09:42"));
    }

    #[test]
    fn test_render_frame_shows_background() {
        let mut driver = MemoryDriver::full();
        driver.push_slide("Wallpaper/a.jpg").unwrap();
        let state = driver.state();
        let frame = render_frame(&state.lock().unwrap());
        assert!(frame.contains("background: Wallpaper/a.jpg"));
        assert!(frame.contains("layout: default"));
    }
}
