//! Fetch-state coordination: owns the latest weather/forecast result and
//! the loading/error flags, and orchestrates geolocation + API calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::location::Geolocator;
use crate::model::{Coordinates, ForecastEntry, WeatherSnapshot};
use crate::provider::WeatherProvider;
use crate::store::Store;

/// The coordinator's observable state. On failure the previous loaded data
/// is retained for display; only `error` and `loading` change.
#[derive(Debug, Clone, Default)]
pub struct WeatherState {
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Option<Vec<ForecastEntry>>,
    pub location: Option<Coordinates>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Orchestrates fetches and owns the session's transient weather state.
///
/// Failure is terminal per call; there is no retry or backoff. A fetch
/// issued while another is in flight supersedes it: each call takes a
/// ticket from a monotonic counter and only the newest ticket may write
/// its outcome.
pub struct Coordinator {
    provider: Arc<dyn WeatherProvider>,
    geolocator: Geolocator,
    store: Arc<Store>,
    state: Mutex<WeatherState>,
    ticket: AtomicU64,
    activated: AtomicBool,
}

impl Coordinator {
    pub fn new(provider: Arc<dyn WeatherProvider>, geolocator: Geolocator, store: Arc<Store>) -> Self {
        Self {
            provider,
            geolocator,
            store,
            state: Mutex::new(WeatherState::default()),
            ticket: AtomicU64::new(0),
            activated: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> WeatherState {
        self.state.lock().await.clone()
    }

    /// One-time activation: when the stored auto-location preference is on,
    /// trigger an initial fetch from the user's position. Subsequent calls
    /// are no-ops.
    pub async fn activate(&self) {
        if self.activated.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.store.preferences().auto_location {
            tracing::debug!("auto-location enabled, fetching initial weather");
            self.fetch_by_user_location().await;
        }
    }

    /// Request current conditions and the forecast concurrently; the first
    /// failure short-circuits the other call.
    pub async fn fetch_by_coordinates(&self, lat: f64, lon: f64) {
        let ticket = self.begin_fetch().await;

        let result = tokio::try_join!(
            self.provider.current_weather(lat, lon),
            self.provider.forecast(lat, lon),
        );

        match result {
            Ok((weather, forecast)) => self.complete(ticket, lat, lon, weather, forecast).await,
            Err(err) => self.fail(ticket, err.to_string()).await,
        }
    }

    /// Resolve the user's position, then fetch for it.
    pub async fn fetch_by_user_location(&self) {
        let ticket = self.begin_fetch().await;

        match self.geolocator.request_location().await {
            Ok(fix) => self.fetch_by_coordinates(fix.lat, fix.lon).await,
            Err(err) => self.fail(ticket, err.to_string()).await,
        }
    }

    /// Re-fetch the last known location, or fall back to the user's
    /// position when none is known yet.
    pub async fn refresh(&self) {
        let location = self.state.lock().await.location;
        match location {
            Some(fix) => self.fetch_by_coordinates(fix.lat, fix.lon).await,
            None => self.fetch_by_user_location().await,
        }
    }

    async fn begin_fetch(&self) -> u64 {
        let ticket = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock().await;
        state.loading = true;
        state.error = None;
        ticket
    }

    async fn complete(
        &self,
        ticket: u64,
        lat: f64,
        lon: f64,
        weather: WeatherSnapshot,
        forecast: Vec<ForecastEntry>,
    ) {
        if self.ticket.load(Ordering::SeqCst) != ticket {
            tracing::debug!(ticket, "dropping superseded fetch result");
            return;
        }
        let mut state = self.state.lock().await;
        state.weather = Some(weather);
        state.forecast = Some(forecast);
        state.location = Some(Coordinates { lat, lon });
        state.loading = false;
        state.error = None;
    }

    async fn fail(&self, ticket: u64, message: String) {
        if self.ticket.load(Ordering::SeqCst) != ticket {
            tracing::debug!(ticket, "dropping superseded fetch error");
            return;
        }
        tracing::warn!("fetch failed: {message}");
        let mut state = self.state.lock().await;
        state.error = Some(message);
        state.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{PositionSource, StaticPositionSource, UnsupportedSource};
    use crate::model::{LocationCandidate, PreferencesPatch, WeatherCondition};
    use crate::provider::WeatherError;
    use crate::store::MemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn snapshot(lat: f64, lon: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            name: format!("city-{lat}"),
            country: "XX".to_string(),
            lat,
            lon,
            temp: 12.5,
            feels_like: 11.0,
            temp_min: 9.0,
            temp_max: 14.0,
            humidity: 70,
            pressure: 1013,
            visibility: 10_000,
            wind_speed: 3.1,
            wind_deg: 180,
            clouds: 40,
            condition: WeatherCondition::default(),
            sunrise: 1_700_000_000,
            sunset: 1_700_040_000,
            timezone_offset: 0,
            observed_at: 1_700_020_000,
        }
    }

    fn entry(at: i64) -> ForecastEntry {
        ForecastEntry {
            forecast_at: at,
            temp: 10.0,
            feels_like: 9.0,
            temp_min: 8.0,
            temp_max: 11.0,
            humidity: 65,
            condition: WeatherCondition::default(),
            wind_speed: 2.0,
            precipitation_probability: 0.2,
        }
    }

    /// Provider with script-controlled failures; lat 1.0 answers slowly.
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        fail_current: AtomicBool,
        fail_forecast: AtomicBool,
        current_calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn current_weather(
            &self,
            lat: f64,
            lon: f64,
        ) -> Result<WeatherSnapshot, WeatherError> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            if lat == 1.0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.fail_current.load(Ordering::SeqCst) {
                return Err(WeatherError::Unavailable("current conditions failed".into()));
            }
            Ok(snapshot(lat, lon))
        }

        async fn forecast(&self, lat: f64, _lon: f64) -> Result<Vec<ForecastEntry>, WeatherError> {
            if lat == 1.0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if self.fail_forecast.load(Ordering::SeqCst) {
                return Err(WeatherError::Unavailable("forecast failed".into()));
            }
            Ok(vec![entry(1_700_000_000), entry(1_700_010_800)])
        }

        async fn search_locations(
            &self,
            _query: &str,
        ) -> Result<Vec<LocationCandidate>, WeatherError> {
            Ok(Vec::new())
        }

        async fn reverse_geocode(&self, lat: f64, lon: f64) -> LocationCandidate {
            LocationCandidate {
                name: "Unknown Location".to_string(),
                country: "Unknown".to_string(),
                lat,
                lon,
                state: None,
            }
        }
    }

    fn coordinator_with(
        provider: Arc<ScriptedProvider>,
        source: Arc<dyn PositionSource>,
    ) -> Coordinator {
        Coordinator::new(
            provider,
            Geolocator::new(source),
            Arc::new(Store::new(Box::new(MemoryBackend::default()))),
        )
    }

    fn fixed_source(lat: f64, lon: f64) -> Arc<dyn PositionSource> {
        Arc::new(StaticPositionSource::new(Coordinates { lat, lon }))
    }

    #[tokio::test]
    async fn fetch_by_coordinates_loads_weather_and_forecast() {
        let coordinator = coordinator_with(
            Arc::new(ScriptedProvider::default()),
            Arc::new(UnsupportedSource),
        );

        coordinator.fetch_by_coordinates(40.7, -74.0).await;

        let state = coordinator.state().await;
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.weather.as_ref().map(|w| w.lat), Some(40.7));
        assert_eq!(state.forecast.as_ref().map(Vec::len), Some(2));
        let location = state.location.expect("location recorded");
        assert_eq!(location.lat, 40.7);
        assert_eq!(location.lon, -74.0);
    }

    #[tokio::test]
    async fn forecast_failure_fails_the_whole_fetch() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.fail_forecast.store(true, Ordering::SeqCst);
        let coordinator = coordinator_with(provider, Arc::new(UnsupportedSource));

        coordinator.fetch_by_coordinates(40.7, -74.0).await;

        let state = coordinator.state().await;
        assert!(!state.loading);
        assert!(state.error.as_deref().unwrap().contains("forecast failed"));
        // Nothing from the failed call is kept.
        assert!(state.weather.is_none());
        assert!(state.forecast.is_none());
        assert!(state.location.is_none());
    }

    #[tokio::test]
    async fn failure_retains_previously_loaded_data() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator_with(provider.clone(), Arc::new(UnsupportedSource));

        coordinator.fetch_by_coordinates(40.7, -74.0).await;
        provider.fail_current.store(true, Ordering::SeqCst);
        coordinator.fetch_by_coordinates(59.91, 10.75).await;

        let state = coordinator.state().await;
        assert!(state.error.as_deref().unwrap().contains("current conditions failed"));
        // The old data stays visible until overwritten.
        assert_eq!(state.weather.as_ref().map(|w| w.lat), Some(40.7));
        assert_eq!(state.forecast.as_ref().map(Vec::len), Some(2));
        assert_eq!(state.location.map(|l| l.lat), Some(40.7));
    }

    #[tokio::test]
    async fn geolocation_failure_surfaces_adapter_message() {
        let coordinator = coordinator_with(
            Arc::new(ScriptedProvider::default()),
            Arc::new(UnsupportedSource),
        );

        coordinator.fetch_by_user_location().await;

        let state = coordinator.state().await;
        assert!(!state.loading);
        assert!(state.error.as_deref().unwrap().contains("not supported"));
        assert!(state.weather.is_none());
    }

    #[tokio::test]
    async fn fetch_by_user_location_uses_position_fix() {
        let coordinator = coordinator_with(
            Arc::new(ScriptedProvider::default()),
            fixed_source(38.72, -9.14),
        );

        coordinator.fetch_by_user_location().await;

        let state = coordinator.state().await;
        let location = state.location.expect("location from fix");
        assert_eq!(location.lat, 38.72);
        assert_eq!(location.lon, -9.14);
    }

    #[tokio::test]
    async fn refresh_reuses_last_location() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator_with(provider.clone(), Arc::new(UnsupportedSource));

        coordinator.fetch_by_coordinates(40.7, -74.0).await;
        coordinator.refresh().await;

        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 2);
        let state = coordinator.state().await;
        assert_eq!(state.location.map(|l| l.lat), Some(40.7));
    }

    #[tokio::test]
    async fn refresh_without_location_falls_back_to_user_position() {
        let coordinator = coordinator_with(
            Arc::new(ScriptedProvider::default()),
            fixed_source(59.91, 10.75),
        );

        coordinator.refresh().await;

        let state = coordinator.state().await;
        assert_eq!(state.location.map(|l| l.lat), Some(59.91));
    }

    #[tokio::test]
    async fn activate_fetches_once_when_auto_location_enabled() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator_with(provider.clone(), fixed_source(38.72, -9.14));

        coordinator.activate().await;
        coordinator.activate().await;

        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn activate_honors_disabled_auto_location() {
        let provider = Arc::new(ScriptedProvider::default());
        let store = Arc::new(Store::new(Box::new(MemoryBackend::default())));
        store.update_preferences(PreferencesPatch {
            auto_location: Some(false),
            ..Default::default()
        });
        let coordinator = Coordinator::new(
            provider.clone(),
            Geolocator::new(fixed_source(38.72, -9.14)),
            store,
        );

        coordinator.activate().await;

        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fetch_result_is_dropped() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = Arc::new(coordinator_with(provider, Arc::new(UnsupportedSource)));

        // lat 1.0 answers after 5 s; the second fetch completes first.
        let slow = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.fetch_by_coordinates(1.0, 0.0).await })
        };
        tokio::task::yield_now().await;

        coordinator.fetch_by_coordinates(2.0, 0.0).await;
        slow.await.expect("slow fetch finishes");

        let state = coordinator.state().await;
        assert_eq!(state.weather.as_ref().map(|w| w.lat), Some(2.0));
        assert_eq!(state.location.map(|l| l.lat), Some(2.0));
        assert!(state.error.is_none());
        assert!(!state.loading);
    }
}
