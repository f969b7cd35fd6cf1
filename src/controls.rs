/*
 *  controls.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Manual triggers - console commands and user signals
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
use log::{debug, info, warn};
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::wakelock::Visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RefreshWeather,
    CycleLayout,
    ToggleFullscreen,
    Visibility(Visibility),
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refresh" | "r" => Ok(Command::RefreshWeather),
            "cycle" | "c" => Ok(Command::CycleLayout),
            "fullscreen" | "f" => Ok(Command::ToggleFullscreen),
            "hide" => Ok(Command::Visibility(Visibility::Hidden)),
            "show" => Ok(Command::Visibility(Visibility::Visible)),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Read commands line by line until EOF or the receiver goes away
pub fn spawn_line_reader<R>(input: R, tx: mpsc::Sender<Command>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(cmd) => {
                        debug!("Console command {:?}", cmd);
                        if tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{} (try refresh, cycle, fullscreen, hide, show, quit)", e),
                },
                Ok(None) => {
                    debug!("Command input closed");
                    break;
                }
                Err(e) => {
                    warn!("Command input failed: {}", e);
                    break;
                }
            }
        }
    })
}

pub fn spawn_stdin_reader(tx: mpsc::Sender<Command>) -> JoinHandle<()> {
    spawn_line_reader(tokio::io::stdin(), tx)
}

/// SIGUSR1 refreshes the weather, SIGUSR2 cycles the layout
#[cfg(unix)]
pub fn spawn_signal_listener(tx: mpsc::Sender<Command>) -> std::io::Result<JoinHandle<()>> {
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;

    Ok(tokio::spawn(async move {
        loop {
            let cmd = tokio::select! {
                Some(_) = usr1.recv() => {
                    info!("SIGUSR1 received, refreshing weather.");
                    Command::RefreshWeather
                }
                Some(_) = usr2.recv() => {
                    info!("SIGUSR2 received, cycling layout.");
                    Command::CycleLayout
                }
                else => break,
            };
            if tx.send(cmd).await.is_err() {
                break;
            }
        }
    }))
}
