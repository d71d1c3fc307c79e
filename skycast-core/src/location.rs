//! Geolocation seam: a typed single-fix request plus a cancellable watch
//! over whatever positioning capability the host offers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::model::Coordinates;

/// Environment variable holding a fixed "lat,lon" position for hosts
/// without a positioning service.
pub const LOCATION_ENV: &str = "SKYCAST_LOCATION";

/// How often a watch polls the source for a fresh fix.
const WATCH_INTERVAL: Duration = Duration::from_secs(60);

/// Options mirrored after platform positioning APIs.
#[derive(Debug, Clone, Copy)]
pub struct LocatorOptions {
    pub high_accuracy: bool,
    /// A single fix must arrive within this window.
    pub timeout: Duration,
    /// A cached fix younger than this is served without touching the source.
    pub max_fix_age: Duration,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(15),
            max_fix_age: Duration::from_secs(5 * 60),
        }
    }
}

/// Positioning failures, with the platform's numeric codes preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Geolocation is not supported on this host")]
    Unsupported,
    #[error("Location access denied. Please enable location services or search for a city.")]
    PermissionDenied,
    #[error("Location information is unavailable. Please search for a city.")]
    Unavailable,
    #[error("Location request timed out. Please try again or search for a city.")]
    Timeout,
}

impl LocationError {
    /// Numeric code: 0 unsupported, 1 permission denied, 2 unavailable,
    /// 3 timeout.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Unsupported => 0,
            Self::PermissionDenied => 1,
            Self::Unavailable => 2,
            Self::Timeout => 3,
        }
    }
}

/// The host's positioning capability. Requesting a position may trigger a
/// platform permission prompt on first use.
#[async_trait]
pub trait PositionSource: Send + Sync {
    fn supported(&self) -> bool {
        true
    }

    async fn position(&self, options: &LocatorOptions) -> Result<Coordinates, LocationError>;
}

/// Source for hosts without any positioning capability.
#[derive(Debug)]
pub struct UnsupportedSource;

#[async_trait]
impl PositionSource for UnsupportedSource {
    fn supported(&self) -> bool {
        false
    }

    async fn position(&self, _options: &LocatorOptions) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// Fixed coordinates supplied by the user, e.g. through `SKYCAST_LOCATION`.
#[derive(Debug)]
pub struct StaticPositionSource {
    coordinates: Coordinates,
}

impl StaticPositionSource {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }

    /// Read a "lat,lon" pair from the environment, if present and valid.
    pub fn from_env() -> Option<Self> {
        let raw = std::env::var(LOCATION_ENV).ok()?;
        let coordinates = parse_coordinates(&raw)?;
        Some(Self::new(coordinates))
    }
}

#[async_trait]
impl PositionSource for StaticPositionSource {
    async fn position(&self, _options: &LocatorOptions) -> Result<Coordinates, LocationError> {
        Ok(self.coordinates)
    }
}

fn parse_coordinates(raw: &str) -> Option<Coordinates> {
    let (lat, lon) = raw.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some(Coordinates { lat, lon })
}

/// Single-fix requests and continuous watches over a [`PositionSource`],
/// with timeout enforcement and short-lived fix caching.
pub struct Geolocator {
    source: Arc<dyn PositionSource>,
    options: LocatorOptions,
    last_fix: Mutex<Option<(Instant, Coordinates)>>,
}

impl Geolocator {
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self::with_options(source, LocatorOptions::default())
    }

    pub fn with_options(source: Arc<dyn PositionSource>, options: LocatorOptions) -> Self {
        Self {
            source,
            options,
            last_fix: Mutex::new(None),
        }
    }

    /// Pick the best source this host offers: a fixed position from the
    /// environment, or nothing.
    pub fn detect() -> Self {
        match StaticPositionSource::from_env() {
            Some(source) => Self::new(Arc::new(source)),
            None => Self::new(Arc::new(UnsupportedSource)),
        }
    }

    /// One coordinate fix. Serves a cached fix younger than
    /// `options.max_fix_age`; otherwise asks the source, bounded by
    /// `options.timeout`.
    pub async fn request_location(&self) -> Result<Coordinates, LocationError> {
        if !self.source.supported() {
            return Err(LocationError::Unsupported);
        }

        if let Some(fix) = self.cached_fix() {
            tracing::debug!(lat = fix.lat, lon = fix.lon, "serving cached position fix");
            return Ok(fix);
        }

        let coordinates =
            tokio::time::timeout(self.options.timeout, self.source.position(&self.options))
                .await
                .map_err(|_| LocationError::Timeout)??;

        self.remember_fix(coordinates);
        Ok(coordinates)
    }

    /// Deliver position updates at a fixed interval until the returned
    /// handle is cancelled or dropped.
    pub fn watch<F>(&self, mut on_update: F) -> LocationWatch
    where
        F: FnMut(Result<Coordinates, LocationError>) + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let options = self.options;

        let task = tokio::spawn(async move {
            if !source.supported() {
                on_update(Err(LocationError::Unsupported));
                return;
            }

            let mut ticker = tokio::time::interval(WATCH_INTERVAL);
            loop {
                ticker.tick().await;
                let update =
                    match tokio::time::timeout(options.timeout, source.position(&options)).await {
                        Ok(result) => result,
                        Err(_) => Err(LocationError::Timeout),
                    };
                on_update(update);
            }
        });

        LocationWatch { task }
    }

    fn cached_fix(&self) -> Option<Coordinates> {
        let guard = self.last_fix.lock().ok()?;
        guard
            .as_ref()
            .and_then(|(at, fix)| (at.elapsed() <= self.options.max_fix_age).then_some(*fix))
    }

    fn remember_fix(&self, coordinates: Coordinates) {
        if let Ok(mut guard) = self.last_fix.lock() {
            *guard = Some((Instant::now(), coordinates));
        }
    }
}

/// Subscription handle for a continuous watch. Cancelling (or dropping)
/// stops the updates.
pub struct LocationWatch {
    task: tokio::task::JoinHandle<()>,
}

impl LocationWatch {
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for LocationWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
