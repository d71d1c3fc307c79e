use crate::{
    Config,
    model::{ForecastEntry, LocationCandidate, WeatherSnapshot},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Errors produced by weather providers.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// The API credential is missing; no request was sent.
    #[error(
        "OpenWeatherMap API key is not configured. \
         Set OPENWEATHER_API_KEY or run `skycast configure`."
    )]
    MissingApiKey,

    /// The service answered with a non-success HTTP status.
    #[error("request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Transport-level failure or an unreadable body, re-wrapped with the
    /// original message.
    #[error("weather service unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Abstraction over the remote weather service.
///
/// `reverse_geocode` is deliberately infallible: lookup failures of any kind
/// degrade to a fallback candidate at the input coordinates, while the other
/// three operations surface typed errors.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, WeatherError>;

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastEntry>, WeatherError>;

    /// Forward geocoding by free-text name, at most 5 results.
    async fn search_locations(&self, query: &str) -> Result<Vec<LocationCandidate>, WeatherError>;

    /// Coordinates to place name, never fails.
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> LocationCandidate;
}

/// Construct the provider from config.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn WeatherProvider>, WeatherError> {
    let api_key = config.resolved_api_key().ok_or(WeatherError::MissingApiKey)?;
    Ok(Arc::new(OpenWeatherProvider::new(api_key)))
}
