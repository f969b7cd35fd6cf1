//! Integration tests for the dashboard
//!
//! Drive the library end to end against the in-memory surface with fake
//! network collaborators and a paused clock.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mirrorboard::config::{Config, SlideshowConfig};
use mirrorboard::constants::{DEFAULT_COORDS, STATUS_FAILED};
use mirrorboard::controls::Command;
use mirrorboard::dashboard::{Collaborators, Dashboard};
use mirrorboard::display::drivers::memory::MemoryDriver;
use mirrorboard::display::{share, Corner, Position, Slot, Widget};
use mirrorboard::geoloc::{GeolocationError, Geolocator, NoGeolocation, PositionOptions};
use mirrorboard::image_loader::{CrossOrigin, ImageLoadError, ImageLoader};
use mirrorboard::location::Coordinates;
use mirrorboard::slideshow::{SlideOutcome, Slideshow};
use mirrorboard::weather::{ForecastResponse, ForecastSource, RefreshOutcome, WeatherApiError, WeatherService};

const PAYLOAD: &str = r#"{
    "current": {
        "temperature_2m": 18.4,
        "apparent_temperature": 16.2,
        "relative_humidity_2m": 55,
        "wind_speed_10m": 12,
        "precipitation": 0,
        "weather_code": 3
    }
}"#;

/// Forecast source that records the coordinates it was asked for
#[derive(Default)]
struct FakeForecast {
    fail: bool,
    asked: Mutex<Vec<Coordinates>>,
}

#[async_trait]
impl ForecastSource for FakeForecast {
    async fn fetch(&self, coords: Coordinates) -> Result<ForecastResponse, WeatherApiError> {
        self.asked.lock().unwrap().push(coords);
        if self.fail {
            return Err(WeatherApiError::HttpStatus(503));
        }
        Ok(serde_json::from_str(PAYLOAD)?)
    }
}

struct DeniedGeolocation;

#[async_trait]
impl Geolocator for DeniedGeolocation {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Denied("user declined".to_string()))
    }
}

/// Remote images always fail, local files always load
#[derive(Default)]
struct FakeImages {
    remote_attempts: Mutex<usize>,
}

#[async_trait]
impl ImageLoader for FakeImages {
    async fn load(&self, url: &str, _cross_origin: CrossOrigin) -> Result<(), ImageLoadError> {
        if url.starts_with("http") {
            *self.remote_attempts.lock().unwrap() += 1;
            return Err(ImageLoadError::Status(500));
        }
        Ok(())
    }
}

fn wallpapers() -> Vec<String> {
    vec!["Wallpaper/a.jpg".to_string(), "Wallpaper/b.jpg".to_string()]
}

fn local_config() -> Config {
    Config {
        locale: Some("en_US".to_string()),
        wake_lock: Some(false),
        fullscreen: Some(false),
        slideshow: Some(SlideshowConfig {
            remote: Some(false),
            fallback_images: Some(wallpapers()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn weather_payload_renders_expected_text() {
    let driver = MemoryDriver::full();
    let state = driver.state();
    let surface = share(Box::new(driver));
    let forecast = Arc::new(FakeForecast::default());
    let service = WeatherService::new(Arc::new(NoGeolocation), forecast.clone(), DEFAULT_COORDS);

    let outcome = service.refresh(&surface).await;
    assert!(matches!(outcome, RefreshOutcome::Updated(_)));

    let state = state.lock().unwrap();
    assert_eq!(state.text(Slot::WeatherLocation), Some("Weather"));
    assert_eq!(state.text(Slot::WeatherTemp), Some("18°C"));
    assert_eq!(state.text(Slot::WeatherDesc), Some("Overcast"));
    let extra = state.text(Slot::WeatherExtra).unwrap();
    assert!(extra.contains("Feels like 16°"));
    assert!(extra.contains("Humidity 55%"));
    assert!(extra.contains("Wind 43 km/h"));
    assert!(!extra.contains("Precip"));
    assert!(state.text(Slot::WeatherUpdated).unwrap().starts_with("Updated "));
    assert_eq!(state.text(Slot::WeatherStatus), Some(""));
}

#[tokio::test]
async fn denied_geolocation_uses_default_coordinates() {
    let surface = share(Box::new(MemoryDriver::full()));
    let forecast = Arc::new(FakeForecast::default());
    let service = WeatherService::new(Arc::new(DeniedGeolocation), forecast.clone(), DEFAULT_COORDS);

    service.refresh(&surface).await;
    assert_eq!(*forecast.asked.lock().unwrap(), vec![Coordinates { lat: 44.4323, lon: 26.1063 }]);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_content() {
    let driver = MemoryDriver::full();
    let state = driver.state();
    let surface = share(Box::new(driver));

    let good = WeatherService::new(Arc::new(NoGeolocation), Arc::new(FakeForecast::default()), DEFAULT_COORDS);
    good.refresh(&surface).await;

    let failing = Arc::new(FakeForecast { fail: true, ..Default::default() });
    let bad = WeatherService::new(Arc::new(NoGeolocation), failing, DEFAULT_COORDS);
    assert_eq!(bad.refresh(&surface).await, RefreshOutcome::Failed);

    let state = state.lock().unwrap();
    assert_eq!(state.text(Slot::WeatherStatus), Some(STATUS_FAILED));
    assert_eq!(state.text(Slot::WeatherTemp), Some("18°C"));
}

#[tokio::test(start_paused = true)]
async fn remote_failures_switch_slideshow_to_local_for_the_session() {
    let images = Arc::new(FakeImages::default());
    let show = Slideshow::new(images.clone(), Some("https://picsum.photos/1920/1080".to_string()), &wallpapers());
    let surface = share(Box::new(MemoryDriver::full()));

    for _ in 0..4 {
        assert!(matches!(show.show_next(&surface).await, SlideOutcome::Local(_)));
    }
    // one cross-origin attempt and one plain retry, then never again
    assert_eq!(*images.remote_attempts.lock().unwrap(), 2);
    assert!(!show.using_remote());
}

#[tokio::test(start_paused = true)]
async fn dashboard_runs_every_subsystem() {
    let driver = MemoryDriver::full();
    let state = driver.state();
    let surface = share(Box::new(driver));
    let forecast = Arc::new(FakeForecast::default());

    let collaborators = Collaborators {
        geolocator: Arc::new(NoGeolocation),
        forecast: forecast.clone(),
        images: Arc::new(FakeImages::default()),
        wake_lock: None,
        fullscreen: Vec::new(),
    };
    let dashboard = Dashboard::start(&local_config(), surface, collaborators).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    {
        let state = state.lock().unwrap();
        assert!(state.text(Slot::Time).is_some());
        assert!(state.text(Slot::Date).is_some());
        assert_eq!(state.text(Slot::WeatherTemp), Some("18°C"));
        assert_eq!(state.visible_slides().len(), 1);
        assert!(wallpapers().contains(&state.visible_slides()[0].url));
        // first layout tick runs at startup
        assert_eq!(state.position(Widget::StatusButton), Position::Fixed(Corner::BottomRight));
        assert!(state.has_class(Widget::Clock, "floating-animated"));
    }

    tokio::time::sleep(Duration::from_secs(42)).await;
    assert_eq!(
        state.lock().unwrap().position(Widget::StatusButton),
        Position::Fixed(Corner::BottomLeft)
    );

    // manual triggers
    dashboard.commands().send(Command::CycleLayout).await.unwrap();
    dashboard.commands().send(Command::RefreshWeather).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        state.lock().unwrap().position(Widget::StatusButton),
        Position::Fixed(Corner::TopLeft)
    );
    assert_eq!(forecast.asked.lock().unwrap().len(), 2);

    dashboard.commands().send(Command::Quit).await.unwrap();
    dashboard.quit_requested().await;
    dashboard.shutdown().await;
}
