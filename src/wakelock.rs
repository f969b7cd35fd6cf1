/*
 *  wakelock.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Screen wake lock - keeps the host from blanking while the board is visible
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
use async_trait::async_trait;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum WakeLockError {
    #[error("wake lock refused: {0}")]
    Refused(String),
    #[error("wake lock process error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Held lock. Dropping without release leaves cleanup to the implementation.
#[async_trait]
pub trait WakeLockSentinel: Send {
    async fn release(&mut self) -> Result<(), WakeLockError>;
}

#[async_trait]
pub trait WakeLockProvider: Send + Sync {
    async fn request(&self) -> Result<Box<dyn WakeLockSentinel>, WakeLockError>;
}

const INHIBIT_PROGRAM: &str = "systemd-inhibit";
/// How long a fresh inhibitor must stay up to count as held
const INHIBIT_SETTLE: Duration = Duration::from_millis(500);

/// Wake lock held by a `systemd-inhibit` child for as long as it runs
pub struct InhibitWakeLock {
    program: PathBuf,
}

impl InhibitWakeLock {
    /// None when systemd-inhibit is not on the PATH
    pub fn detect() -> Option<Self> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(INHIBIT_PROGRAM))
            .find(|candidate| candidate.is_file())
            .map(|program| Self { program })
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

struct InhibitSentinel {
    child: Child,
}

#[async_trait]
impl WakeLockSentinel for InhibitSentinel {
    async fn release(&mut self) -> Result<(), WakeLockError> {
        self.child.kill().await?;
        Ok(())
    }
}

#[async_trait]
impl WakeLockProvider for InhibitWakeLock {
    async fn request(&self) -> Result<Box<dyn WakeLockSentinel>, WakeLockError> {
        let mut child = Command::new(&self.program)
            .args([
                "--what=idle:sleep",
                "--who=mirrorboard",
                "--why=Always-on wall display",
                "--mode=block",
                "sleep",
                "infinity",
            ])
            .kill_on_drop(true)
            .spawn()?;

        // the inhibitor runs until killed, exiting inside the settle window means refused
        let settled = timeout(INHIBIT_SETTLE, child.wait()).await;
        match settled {
            Ok(status) => {
                let status = status?;
                Err(WakeLockError::Refused(format!("{} exited with {}", self.program.display(), status)))
            }
            Err(_) => Ok(Box::new(InhibitSentinel { child })),
        }
    }
}

/// Holds at most one wake lock, following page visibility
pub struct WakeLockController {
    provider: Option<Arc<dyn WakeLockProvider>>,
    held: Option<Box<dyn WakeLockSentinel>>,
}

impl WakeLockController {
    pub fn new(provider: Option<Arc<dyn WakeLockProvider>>) -> Self {
        Self { provider, held: None }
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Failures are logged, never retried
    pub async fn request(&mut self) {
        let Some(provider) = self.provider.as_ref() else {
            warn!("Wake lock is not supported on this host");
            return;
        };
        match provider.request().await {
            Ok(sentinel) => {
                self.held = Some(sentinel);
                info!("Wake lock is active");
            }
            Err(e) => error!("Failed to activate wake lock: {}", e),
        }
    }

    pub async fn release(&mut self) {
        if let Some(mut sentinel) = self.held.take() {
            match sentinel.release().await {
                Ok(()) => info!("Wake lock released"),
                Err(e) => error!("Wake lock release failed: {}", e),
            }
        }
    }

    pub async fn on_visibility(&mut self, visibility: Visibility) {
        match visibility {
            Visibility::Visible if self.held.is_none() => self.request().await,
            Visibility::Hidden if self.held.is_some() => self.release().await,
            _ => {}
        }
    }
}
