/*
 *  fullscreen.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Fullscreen toggle over whichever backends the host provides
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
use log::{debug, error, info};
use std::io::{IsTerminal, Write};

/// One way of going fullscreen. Backends are tried in order.
pub trait FullscreenBackend: Send {
    fn name(&self) -> &'static str;
    fn is_supported(&self) -> bool;
    fn is_active(&self) -> bool;
    fn enter(&mut self) -> std::io::Result<()>;
    fn exit(&mut self) -> std::io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleResult {
    Entered(&'static str),
    Exited(&'static str),
    Unsupported,
    Failed,
}

pub struct Fullscreen {
    backends: Vec<Box<dyn FullscreenBackend>>,
}

impl Fullscreen {
    pub fn new(backends: Vec<Box<dyn FullscreenBackend>>) -> Self {
        Self { backends }
    }

    pub fn is_active(&self) -> bool {
        self.backends.iter().any(|b| b.is_active())
    }

    /// Enter when nothing is fullscreen, otherwise leave
    pub fn toggle(&mut self) -> ToggleResult {
        let active = self.is_active();
        let Some(backend) = self.backends.iter_mut().find(|b| b.is_supported()) else {
            debug!("Fullscreen not supported on this host");
            return ToggleResult::Unsupported;
        };
        let name = backend.name();
        let result = if active { backend.exit() } else { backend.enter() };
        match result {
            Ok(()) if active => {
                info!("Left fullscreen ({})", name);
                ToggleResult::Exited(name)
            }
            Ok(()) => {
                info!("Entered fullscreen ({})", name);
                ToggleResult::Entered(name)
            }
            Err(e) => {
                error!("Fullscreen toggle via {} failed: {}", name, e);
                ToggleResult::Failed
            }
        }
    }

    /// Leave fullscreen on every backend that is still active
    pub fn restore(&mut self) {
        for backend in self.backends.iter_mut().filter(|b| b.is_active()) {
            if let Err(e) = backend.exit() {
                error!("Fullscreen restore via {} failed: {}", backend.name(), e);
            }
        }
    }
}

const ENTER_ALT_SCREEN: &[u8] = b"\x1b[?1049h\x1b[?25l";
const LEAVE_ALT_SCREEN: &[u8] = b"\x1b[?25h\x1b[?1049l";

/// Terminal alternate screen, cursor hidden
pub struct TerminalFullscreen {
    out: Box<dyn Write + Send>,
    supported: bool,
    active: bool,
}

impl TerminalFullscreen {
    pub fn new() -> Self {
        let supported = std::io::stdout().is_terminal();
        Self::with_writer(Box::new(std::io::stdout()), supported)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, supported: bool) -> Self {
        Self { out, supported, active: false }
    }
}

impl Default for TerminalFullscreen {
    fn default() -> Self {
        Self::new()
    }
}

impl FullscreenBackend for TerminalFullscreen {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn enter(&mut self) -> std::io::Result<()> {
        self.out.write_all(ENTER_ALT_SCREEN)?;
        self.out.flush()?;
        self.active = true;
        Ok(())
    }

    fn exit(&mut self) -> std::io::Result<()> {
        self.out.write_all(LEAVE_ALT_SCREEN)?;
        self.out.flush()?;
        self.active = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeBackend {
        supported: bool,
        active: Arc<Mutex<bool>>,
        log: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    }

    impl FullscreenBackend for FakeBackend {
        fn name(&self) -> &'static str { self.name }
        fn is_supported(&self) -> bool { self.supported }
        fn is_active(&self) -> bool { *self.active.lock().unwrap() }
        fn enter(&mut self) -> std::io::Result<()> {
            self.log.lock().unwrap().push("enter");
            *self.active.lock().unwrap() = true;
            Ok(())
        }
        fn exit(&mut self) -> std::io::Result<()> {
            self.log.lock().unwrap().push("exit");
            *self.active.lock().unwrap() = false;
            Ok(())
        }
    }

    #[test]
    fn test_toggle_uses_first_supported_backend() {
        let legacy = FakeBackend { supported: false, name: "legacy", ..Default::default() };
        let standard = FakeBackend { supported: true, name: "standard", ..Default::default() };
        let mut fs = Fullscreen::new(vec![Box::new(legacy.clone()), Box::new(standard.clone())]);

        assert_eq!(fs.toggle(), ToggleResult::Entered("standard"));
        assert!(fs.is_active());
        assert_eq!(fs.toggle(), ToggleResult::Exited("standard"));
        assert!(legacy.log.lock().unwrap().is_empty());
        assert_eq!(*standard.log.lock().unwrap(), vec!["enter", "exit"]);
    }

    #[test]
    fn test_active_on_any_backend_means_exit() {
        let a = FakeBackend { supported: true, name: "a", ..Default::default() };
        let b = FakeBackend { supported: true, name: "b", ..Default::default() };
        *b.active.lock().unwrap() = true;
        let mut fs = Fullscreen::new(vec![Box::new(a), Box::new(b)]);
        assert_eq!(fs.toggle(), ToggleResult::Exited("a"));
    }

    #[test]
    fn test_no_supported_backend_is_noop() {
        let mut fs = Fullscreen::new(vec![Box::new(FakeBackend::default())]);
        assert_eq!(fs.toggle(), ToggleResult::Unsupported);
        let mut none = Fullscreen::new(vec![]);
        assert_eq!(none.toggle(), ToggleResult::Unsupported);
    }

    #[test]
    fn test_terminal_escape_sequences() {
        #[derive(Clone, Default)]
        struct Buf(Arc<Mutex<Vec<u8>>>);
        impl Write for Buf {
            fn write(&mut self, b: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(b);
                Ok(b.len())
            }
            fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
        }

        let buf = Buf::default();
        let mut term = TerminalFullscreen::with_writer(Box::new(buf.clone()), true);
        term.enter().unwrap();
        assert!(term.is_active());
        term.exit().unwrap();
        assert!(!term.is_active());
        let out = buf.0.lock().unwrap().clone();
        assert!(out.starts_with(ENTER_ALT_SCREEN));
        assert!(out.ends_with(LEAVE_ALT_SCREEN));
    }
}
