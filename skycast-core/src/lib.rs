//! Core library for the skycast weather dashboard.
//!
//! This crate defines:
//! - Configuration & credential handling
//! - The OpenWeatherMap client and its normalized record types
//! - Durable favorites, recent searches and user preferences
//! - Geolocation and fetch-state coordination
//!
//! It is used by `skycast-cli`, but can also be reused by other binaries or
//! services.

pub mod config;
pub mod coordinator;
pub mod location;
pub mod model;
pub mod provider;
pub mod store;
pub mod units;

pub use config::Config;
pub use coordinator::{Coordinator, WeatherState};
pub use location::{
    Geolocator, LocationError, LocationWatch, LocatorOptions, PositionSource,
    StaticPositionSource, UnsupportedSource,
};
pub use model::{
    Coordinates, ForecastEntry, LocationCandidate, PreferencesPatch, StoredLocation,
    TemperatureUnit, Theme, UserPreferences, WeatherCondition, WeatherSnapshot,
};
pub use provider::{WeatherError, WeatherProvider, provider_from_config};
pub use store::{StorageBackend, Store};
