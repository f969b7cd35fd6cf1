/*
 *  dashboard.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Wires the clock, slideshow, weather and layout pollers to one surface
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
use chrono::Local;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{Config, GeolocationMode};
use crate::controls::Command;
use crate::display::components::clock::{ClockDisplay, ClockFormatter};
use crate::display::factory::SharedSurface;
use crate::display::layout_cycler::LayoutCycler;
use crate::fullscreen::{Fullscreen, FullscreenBackend, TerminalFullscreen};
use crate::geoloc::{FixedLocator, GeoIpLocator, Geolocator, NoGeolocation};
use crate::image_loader::{HttpImageLoader, ImageLoader};
use crate::slideshow::Slideshow;
use crate::wakelock::{InhibitWakeLock, WakeLockController, WakeLockProvider};
use crate::weather::{ForecastSource, OpenMeteoClient, WeatherService};

/// Everything the subsystems talk to outside the surface
pub struct Collaborators {
    pub geolocator: Arc<dyn Geolocator>,
    pub forecast: Arc<dyn ForecastSource>,
    pub images: Arc<dyn ImageLoader>,
    pub wake_lock: Option<Arc<dyn WakeLockProvider>>,
    pub fullscreen: Vec<Box<dyn FullscreenBackend>>,
}

impl Collaborators {
    /// Real network, process and terminal backed collaborators
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let geolocator: Arc<dyn Geolocator> = match config.geolocation_mode() {
            GeolocationMode::Geoip => Arc::new(GeoIpLocator::new()?),
            GeolocationMode::Fixed => Arc::new(FixedLocator(config.configured_coordinates())),
            GeolocationMode::None => Arc::new(NoGeolocation),
        };
        let wake_lock: Option<Arc<dyn WakeLockProvider>> = if config.wake_lock_enabled() {
            InhibitWakeLock::detect().map(|w| Arc::new(w) as Arc<dyn WakeLockProvider>)
        } else {
            None
        };
        let fullscreen: Vec<Box<dyn FullscreenBackend>> = if config.fullscreen_enabled() {
            vec![Box::new(TerminalFullscreen::new())]
        } else {
            Vec::new()
        };

        Ok(Self {
            geolocator,
            forecast: Arc::new(OpenMeteoClient::new(Some(&config.weather_api_url()))?),
            images: Arc::new(HttpImageLoader::new(".")?),
            wake_lock,
            fullscreen,
        })
    }
}

/// Polling periods, one per subsystem
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub clock: Duration,
    pub slideshow: Duration,
    pub weather: Duration,
    pub layout: Duration,
}

impl From<&Config> for Schedule {
    fn from(config: &Config) -> Self {
        Self {
            clock: config.clock_interval(),
            slideshow: config.slideshow_interval(),
            weather: config.weather_refresh(),
            layout: config.layout_interval(),
        }
    }
}

pub struct Dashboard {
    shutdown_tx: watch::Sender<bool>,
    commands: mpsc::Sender<Command>,
    quit: Arc<Notify>,
    handles: Vec<JoinHandle<()>>,
    weather: Arc<WeatherService>,
    slideshow: Arc<Slideshow>,
}

impl Dashboard {
    /// Spawn every subsystem poller; each ticks once immediately
    pub async fn start(config: &Config, surface: SharedSurface, collab: Collaborators) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (commands, command_rx) = mpsc::channel(16);
        let (layout_tx, layout_rx) = mpsc::channel(4);
        let quit = Arc::new(Notify::new());
        let schedule = Schedule::from(config);

        let formatter = ClockFormatter::new(config.locale.as_deref());
        let weather = Arc::new(
            WeatherService::new(collab.geolocator, collab.forecast, config.configured_coordinates())
                .with_clock(formatter),
        );
        let slideshow = Arc::new(Slideshow::new(
            collab.images,
            config.remote_image_url(),
            &config.fallback_images(),
        ));

        let mut handles = Vec::new();

        handles.push(spawn_clock(formatter, schedule.clock, surface.clone(), shutdown_tx.subscribe()));

        handles.push(spawn_slideshow(
            Arc::clone(&slideshow),
            schedule.slideshow,
            surface.clone(),
            shutdown_tx.subscribe(),
        ));

        handles.push(spawn_weather(
            Arc::clone(&weather),
            schedule.weather,
            surface.clone(),
            shutdown_tx.subscribe(),
        ));

        let layout_supported = LayoutCycler::supported(surface.lock().await.as_ref());
        if layout_supported {
            handles.push(spawn_layout(schedule.layout, layout_rx, surface.clone(), shutdown_tx.subscribe()));
        } else {
            info!("Layout cycling disabled, surface lacks the movable widgets");
        }

        let dispatcher = Dispatcher {
            weather: Arc::clone(&weather),
            surface,
            layout_tx: layout_supported.then_some(layout_tx),
            fullscreen: Fullscreen::new(collab.fullscreen),
            wake_lock: WakeLockController::new(collab.wake_lock),
            quit: Arc::clone(&quit),
        };
        handles.push(dispatcher.spawn(command_rx, shutdown_tx.subscribe()));

        info!("Dashboard started");
        Self { shutdown_tx, commands, quit, handles, weather, slideshow }
    }

    /// Sender for manual triggers (console, signals)
    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Resolves once a quit command arrives
    pub async fn quit_requested(&self) {
        self.quit.notified().await
    }

    pub fn weather(&self) -> &WeatherService {
        &self.weather
    }

    pub fn slideshow(&self) -> &Slideshow {
        &self.slideshow
    }

    /// Signal every poller and wait for them to finish
    pub async fn shutdown(self) {
        if self.shutdown_tx.send(true).is_err() {
            debug!("All pollers already stopped");
        }
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Dashboard task failed to join: {}", e);
            }
        }
        info!("Dashboard stopped");
    }
}

fn spawn_clock(
    formatter: ClockFormatter,
    period: Duration,
    surface: SharedSurface,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut clock = ClockDisplay::new(formatter);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut surface = surface.lock().await;
                    match clock.tick(surface.as_mut(), &Local::now()) {
                        Ok(true) => {
                            if let Err(e) = surface.flush() {
                                error!("Clock flush failed: {}", e);
                            }
                        }
                        Ok(false) => break,
                        Err(e) => error!("Clock update failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Clock polling received stop signal. Exiting.");
                    break;
                }
            }
        }
    })
}

fn spawn_slideshow(
    slideshow: Arc<Slideshow>,
    period: Duration,
    surface: SharedSurface,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // loads run detached so a slow one overlaps the next tick and gets skipped
                    let slideshow = Arc::clone(&slideshow);
                    let surface = surface.clone();
                    tokio::spawn(async move {
                        let outcome = slideshow.show_next(&surface).await;
                        debug!("Slideshow cycle: {:?}", outcome);
                    });
                }
                _ = shutdown.changed() => {
                    info!("Slideshow polling received stop signal. Exiting.");
                    break;
                }
            }
        }
    })
}

fn spawn_weather_refresh(weather: &Arc<WeatherService>, surface: &SharedSurface) {
    let weather = Arc::clone(weather);
    let surface = surface.clone();
    tokio::spawn(async move {
        let outcome = weather.refresh(&surface).await;
        debug!("Weather refresh: {:?}", outcome);
    });
}

fn spawn_weather(
    weather: Arc<WeatherService>,
    period: Duration,
    surface: SharedSurface,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => spawn_weather_refresh(&weather, &surface),
                _ = shutdown.changed() => {
                    info!("Weather polling received stop signal. Exiting.");
                    break;
                }
            }
        }
    })
}

fn spawn_layout(
    period: Duration,
    mut manual: mpsc::Receiver<()>,
    surface: SharedSurface,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cycler = LayoutCycler::new();
        {
            let mut surface = surface.lock().await;
            if let Err(e) = LayoutCycler::prepare(surface.as_mut()) {
                error!("Layout setup failed: {}", e);
            }
        }
        let mut ticker = interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cycler.run_cycle(&surface).await;
                }
                Some(()) = manual.recv() => {
                    cycler.run_cycle(&surface).await;
                }
                _ = shutdown.changed() => {
                    info!("Layout polling received stop signal. Exiting.");
                    break;
                }
            }
        }
    })
}

/// Owns the host-capability wrappers and routes manual commands
struct Dispatcher {
    weather: Arc<WeatherService>,
    surface: SharedSurface,
    layout_tx: Option<mpsc::Sender<()>>,
    fullscreen: Fullscreen,
    wake_lock: WakeLockController,
    quit: Arc<Notify>,
}

impl Dispatcher {
    fn spawn(mut self, mut commands: mpsc::Receiver<Command>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.wake_lock.request().await;
            loop {
                tokio::select! {
                    Some(cmd) = commands.recv() => self.handle(cmd).await,
                    _ = shutdown.changed() => break,
                }
            }
            self.fullscreen.restore();
            self.wake_lock.release().await;
        })
    }

    async fn handle(&mut self, cmd: Command) {
        debug!("Command {:?}", cmd);
        match cmd {
            Command::RefreshWeather => spawn_weather_refresh(&self.weather, &self.surface),
            Command::CycleLayout => match &self.layout_tx {
                Some(tx) => {
                    if tx.try_send(()).is_err() {
                        debug!("Layout cycle already queued");
                    }
                }
                None => debug!("Layout cycling disabled"),
            },
            Command::ToggleFullscreen => {
                self.fullscreen.toggle();
            }
            Command::Visibility(visibility) => self.wake_lock.on_visibility(visibility).await,
            Command::Quit => self.quit.notify_one(),
        }
    }
}
