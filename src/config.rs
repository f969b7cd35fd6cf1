use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::constants::{
    CLOCK_UPDATE, DEFAULT_COORDS, FALLBACK_IMAGES, LAYOUT_CYCLE_INTERVAL, OPEN_METEO_URL,
    PICSUM_URL, SLIDESHOW_INTERVAL, WEATHER_REFRESH,
};
use crate::location::Coordinates;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// POSIX locale for date/time text, e.g. "de_DE"; host locale when unset
    pub locale: Option<String>,
    pub display: Option<DisplayConfig>,
    pub clock: Option<ClockConfig>,
    pub slideshow: Option<SlideshowConfig>,
    pub weather: Option<WeatherConfig>,
    pub layout: Option<LayoutCycleConfig>,
    /// hold a wake lock while the dashboard is visible
    pub wake_lock: Option<bool>,
    /// allow fullscreen toggling on the terminal
    pub fullscreen: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub driver: Option<DriverKind>,
    /// console driver: clear the terminal before each frame
    pub clear_screen: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClockConfig {
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SlideshowConfig {
    /// random-image endpoint, cache-busted per request
    pub remote_url: Option<String>,
    /// start in remote mode; false goes straight to the local list
    pub remote: Option<bool>,
    pub fallback_images: Option<Vec<String>>,
    pub interval_mins: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeatherConfig {
    pub api_url: Option<String>,
    pub geolocation: Option<GeolocationMode>,
    /// used by `geolocation: fixed`, and as the fallback position otherwise
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub refresh_mins: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LayoutCycleConfig {
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Console,
    Memory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationMode {
    /// IP based lookup
    #[default]
    Geoip,
    /// configured latitude/longitude
    Fixed,
    /// no position capability, always the fallback coordinates
    None,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "mirrorboard", version, about = "MirrorBoard always-on wall display", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(short = 'c', long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Enable debug log level
    #[arg(short = 'v', long, alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub locale: Option<String>,
    #[arg(long, value_enum)]
    pub display_driver: Option<DriverKind>,
    #[arg(long, value_enum)]
    pub geolocation: Option<GeolocationMode>,
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,
    /// skip the random-image service, use the local wallpaper list only
    #[arg(long, action = ArgAction::SetTrue)]
    pub local_images: bool,
    #[arg(long, action = ArgAction::Set)]
    pub wake_lock: Option<bool>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<(Config, Cli), ConfigError> {
    let cli = Cli::parse();
    let cfg = load_with(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok((cfg, cli))
}

/// Layering without touching the process arguments
pub fn load_with(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/mirrorboard/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/mirrorboard/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/mirrorboard.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["mirrorboard.yaml", "config/mirrorboard.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    if src.locale.is_some()         { dst.locale = src.locale; }
    if src.wake_lock.is_some()      { dst.wake_lock = src.wake_lock; }
    if src.fullscreen.is_some()     { dst.fullscreen = src.fullscreen; }
    if src.clock.is_some()          { dst.clock = src.clock; }
    if src.layout.is_some()         { dst.layout = src.layout; }
    // display
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => {
            if s.driver.is_some()       { d.driver = s.driver; }
            if s.clear_screen.is_some() { d.clear_screen = s.clear_screen; }
        }
        _ => {}
    }
    // slideshow
    match (&mut dst.slideshow, src.slideshow) {
        (None, Some(c)) => dst.slideshow = Some(c),
        (Some(d), Some(s)) => merge_slideshow(d, s),
        _ => {}
    }
    // weather
    match (&mut dst.weather, src.weather) {
        (None, Some(c)) => dst.weather = Some(c),
        (Some(d), Some(s)) => merge_weather(d, s),
        _ => {}
    }
}

fn merge_slideshow(dst: &mut SlideshowConfig, src: SlideshowConfig) {
    if src.remote_url.is_some()      { dst.remote_url = src.remote_url; }
    if src.remote.is_some()          { dst.remote = src.remote; }
    if src.fallback_images.is_some() { dst.fallback_images = src.fallback_images; }
    if src.interval_mins.is_some()   { dst.interval_mins = src.interval_mins; }
}

fn merge_weather(dst: &mut WeatherConfig, src: WeatherConfig) {
    if src.api_url.is_some()      { dst.api_url = src.api_url; }
    if src.geolocation.is_some()  { dst.geolocation = src.geolocation; }
    if src.latitude.is_some()     { dst.latitude = src.latitude; }
    if src.longitude.is_some()    { dst.longitude = src.longitude; }
    if src.refresh_mins.is_some() { dst.refresh_mins = src.refresh_mins; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.debug                     { cfg.log_level = Some("debug".to_string()); }
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    if cli.locale.is_some()          { cfg.locale = cli.locale.clone(); }
    if cli.wake_lock.is_some()       { cfg.wake_lock = cli.wake_lock; }

    if cli.display_driver.is_some() {
        cfg.display.get_or_insert_with(DisplayConfig::default).driver = cli.display_driver.clone();
    }

    if cli.local_images {
        cfg.slideshow.get_or_insert_with(SlideshowConfig::default).remote = Some(false);
    }

    let any_weather = cli.geolocation.is_some()
        || cli.latitude.is_some()
        || cli.longitude.is_some();
    if any_weather {
        let weather = cfg.weather.get_or_insert_with(WeatherConfig::default);
        if cli.geolocation.is_some() { weather.geolocation = cli.geolocation; }
        if cli.latitude.is_some()    { weather.latitude = cli.latitude; }
        if cli.longitude.is_some()   { weather.longitude = cli.longitude; }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let positive = |v: Option<u64>, what: &str| -> Result<(), ConfigError> {
        match v {
            Some(0) => Err(ConfigError::Validation(format!("{what} must be > 0"))),
            _ => Ok(()),
        }
    };
    positive(cfg.clock.as_ref().and_then(|c| c.interval_ms), "clock interval_ms")?;
    positive(cfg.slideshow.as_ref().and_then(|s| s.interval_mins), "slideshow interval_mins")?;
    positive(cfg.weather.as_ref().and_then(|w| w.refresh_mins), "weather refresh_mins")?;
    positive(cfg.layout.as_ref().and_then(|l| l.interval_secs), "layout interval_secs")?;

    if let Some(weather) = cfg.weather.as_ref() {
        if let Some(lat) = weather.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ConfigError::Validation("weather latitude must be -90..=90".into()));
            }
        }
        if let Some(lon) = weather.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(ConfigError::Validation("weather longitude must be -180..=180".into()));
            }
        }
        if weather.geolocation == Some(GeolocationMode::Fixed)
            && (weather.latitude.is_none() || weather.longitude.is_none())
        {
            return Err(ConfigError::Validation(
                "geolocation 'fixed' needs weather latitude and longitude".into(),
            ));
        }
    }
    Ok(())
}

// Effective values, defaults applied
impl Config {
    pub fn clock_interval(&self) -> Duration {
        self.clock
            .as_ref()
            .and_then(|c| c.interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(CLOCK_UPDATE)
    }

    pub fn slideshow_interval(&self) -> Duration {
        self.slideshow
            .as_ref()
            .and_then(|s| s.interval_mins)
            .map(|m| Duration::from_secs(m.saturating_mul(60)))
            .unwrap_or(SLIDESHOW_INTERVAL)
    }

    pub fn weather_refresh(&self) -> Duration {
        self.weather
            .as_ref()
            .and_then(|w| w.refresh_mins)
            .map(|m| Duration::from_secs(m.saturating_mul(60)))
            .unwrap_or(WEATHER_REFRESH)
    }

    pub fn layout_interval(&self) -> Duration {
        self.layout
            .as_ref()
            .and_then(|l| l.interval_secs)
            .map(Duration::from_secs)
            .unwrap_or(LAYOUT_CYCLE_INTERVAL)
    }

    pub fn remote_image_url(&self) -> Option<String> {
        let slideshow = self.slideshow.as_ref();
        if slideshow.and_then(|s| s.remote) == Some(false) {
            return None;
        }
        Some(
            slideshow
                .and_then(|s| s.remote_url.clone())
                .unwrap_or_else(|| PICSUM_URL.to_string()),
        )
    }

    pub fn fallback_images(&self) -> Vec<String> {
        self.slideshow
            .as_ref()
            .and_then(|s| s.fallback_images.clone())
            .unwrap_or_else(|| FALLBACK_IMAGES.iter().map(|s| s.to_string()).collect())
    }

    pub fn weather_api_url(&self) -> String {
        self.weather
            .as_ref()
            .and_then(|w| w.api_url.clone())
            .unwrap_or_else(|| OPEN_METEO_URL.to_string())
    }

    pub fn geolocation_mode(&self) -> GeolocationMode {
        self.weather.as_ref().and_then(|w| w.geolocation).unwrap_or_default()
    }

    /// Configured coordinates, else the built-in default pair
    pub fn configured_coordinates(&self) -> Coordinates {
        match self.weather.as_ref().map(|w| (w.latitude, w.longitude)) {
            Some((Some(lat), Some(lon))) => Coordinates { lat, lon },
            _ => DEFAULT_COORDS,
        }
    }

    pub fn driver(&self) -> DriverKind {
        self.display.as_ref().and_then(|d| d.driver.clone()).unwrap_or_default()
    }

    pub fn wake_lock_enabled(&self) -> bool {
        self.wake_lock.unwrap_or(true)
    }

    pub fn fullscreen_enabled(&self) -> bool {
        self.fullscreen.unwrap_or(true)
    }
}
