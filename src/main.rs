/*
 *  main.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
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

use log::{info, warn};
use env_logger::Env;

#[cfg(unix)] // Only compile this block on Unix-like systems
use tokio::signal::unix::{signal, SignalKind}; // Import specific Unix signals

use mirrorboard::config;
use mirrorboard::controls;
use mirrorboard::dashboard::{Collaborators, Dashboard};
use mirrorboard::display::{share, SurfaceFactory};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
#[cfg(unix)]
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, cli) = config::load()?;

    let level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    // Initialize the logger with the appropriate level based on debug flag
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);
    if let Some(path) = cli.config.as_ref() {
        info!("Config file {}", path.display());
    }

    let surface = share(SurfaceFactory::create_from_config(&config.display.clone().unwrap_or_default()));
    let collaborators = Collaborators::from_config(&config)?;
    let dashboard = Dashboard::start(&config, surface, collaborators).await;

    let _stdin = controls::spawn_stdin_reader(dashboard.commands());
    #[cfg(unix)]
    match controls::spawn_signal_listener(dashboard.commands()) {
        Ok(_) => info!("SIGUSR1 refreshes weather, SIGUSR2 cycles the layout"),
        Err(e) => warn!("User signals unavailable: {}", e),
    }

    // Main application loop
    tokio::select! {
        res = signal_handler() => {
            if let Err(e) = res {
                warn!("Signal handling failed: {}", e);
            }
        }
        _ = dashboard.quit_requested() => {
            info!("Quit requested. Initiating graceful shutdown.");
        }
    }

    dashboard.shutdown().await;
    info!("{} stopped", env!("CARGO_PKG_NAME"));
    // a pending blocking stdin read would hold up runtime teardown
    std::process::exit(0);
}
