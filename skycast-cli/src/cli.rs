use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use skycast_core::{
    Config, Coordinator, Geolocator, LocationCandidate, PreferencesPatch, Store, StoredLocation,
    TemperatureUnit, Theme, WeatherProvider, WeatherSnapshot, provider_from_config, units,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Weather dashboard CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeatherMap API key.
    Configure,

    /// Show current conditions. Geolocates when PLACE is absent.
    Now {
        /// Place name, e.g. "Lisbon" or "Springfield,US".
        place: Option<String>,
    },

    /// Show the 5-day forecast in 3-hour steps.
    Forecast {
        place: Option<String>,
    },

    /// Search for places by name.
    Search { query: String },

    /// Manage pinned locations.
    Favorites {
        #[command(subcommand)]
        command: FavoritesCommand,
    },

    /// Show recent searches, newest first.
    Recent,

    /// Show or update preferences.
    Prefs {
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,

        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,

        #[arg(long)]
        notifications: Option<bool>,

        #[arg(long)]
        auto_location: Option<bool>,
    },
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    /// List saved favorites.
    List,

    /// Search for a place and pin the best match.
    Add { place: String },

    /// Remove the favorite at the exact coordinates.
    Remove { lat: f64, lon: f64 },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum UnitArg {
    Celsius,
    Fahrenheit,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::Celsius => TemperatureUnit::Celsius,
            UnitArg::Fahrenheit => TemperatureUnit::Fahrenheit,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Auto,
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Now { place } => show_now(place).await,
            Command::Forecast { place } => show_forecast(place).await,
            Command::Search { query } => search(&query).await,
            Command::Favorites { command } => favorites(command).await,
            Command::Recent => recent(),
            Command::Prefs {
                unit,
                theme,
                notifications,
                auto_location,
            } => prefs(unit, theme, notifications, auto_location),
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeatherMap API key:")
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    config.set_api_key(api_key.trim().to_string());
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

fn load_services() -> Result<(Arc<dyn WeatherProvider>, Arc<Store>)> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;
    Ok((provider, Arc::new(Store::open_default())))
}

/// Resolve a free-text place to its best geocoding match, recording it as a
/// recent search.
async fn resolve_place(
    provider: &dyn WeatherProvider,
    store: &Store,
    place: &str,
) -> Result<LocationCandidate> {
    let matches = provider.search_locations(place).await?;
    let Some(candidate) = matches.into_iter().next() else {
        bail!("No places match '{place}'. Try a different spelling.");
    };
    store.add_recent_search(candidate.clone());
    Ok(candidate)
}

async fn fetch_into_coordinator(
    place: Option<String>,
) -> Result<(Coordinator, TemperatureUnit)> {
    let (provider, store) = load_services()?;
    let unit = store.preferences().temperature_unit;
    let coordinator = Coordinator::new(provider.clone(), Geolocator::detect(), store.clone());

    match place {
        Some(place) => {
            let candidate = resolve_place(provider.as_ref(), &store, &place).await?;
            println!("{}", describe(&candidate));
            coordinator
                .fetch_by_coordinates(candidate.lat, candidate.lon)
                .await;
        }
        None => {
            coordinator.activate().await;
            let state = coordinator.state().await;
            // Auto-location may be disabled; the user asked explicitly.
            if state.weather.is_none() && state.error.is_none() {
                coordinator.fetch_by_user_location().await;
            }
        }
    }

    Ok((coordinator, unit))
}

async fn show_now(place: Option<String>) -> Result<()> {
    let (coordinator, unit) = fetch_into_coordinator(place).await?;

    let state = coordinator.state().await;
    if let Some(error) = state.error {
        bail!(error);
    }
    let weather = state.weather.context("No weather data received")?;
    print_current(&weather, unit);
    Ok(())
}

async fn show_forecast(place: Option<String>) -> Result<()> {
    let (coordinator, unit) = fetch_into_coordinator(place).await?;

    let state = coordinator.state().await;
    if let Some(error) = state.error {
        bail!(error);
    }
    let entries = state.forecast.context("No forecast data received")?;
    if entries.is_empty() {
        println!("The service returned no forecast for this location.");
        return Ok(());
    }

    let tz_offset = state.weather.map(|w| w.timezone_offset).unwrap_or(0);
    let mut current_day = String::new();
    for entry in &entries {
        let day = units::format_date(entry.forecast_at);
        if day != current_day {
            println!("{day}");
            current_day = day;
        }
        println!(
            "  {}  {:>5}  {:<24} {:>3.0}% rain",
            units::format_time(entry.forecast_at, tz_offset),
            units::format_temperature(entry.temp, unit),
            entry.condition.description,
            entry.precipitation_probability * 100.0,
        );
    }
    Ok(())
}

async fn search(query: &str) -> Result<()> {
    let (provider, _store) = load_services()?;

    let matches = provider.search_locations(query).await?;
    if matches.is_empty() {
        println!("No places match '{query}'.");
        return Ok(());
    }

    for candidate in &matches {
        println!(
            "{:<32} {:>8.3}, {:>8.3}",
            describe(candidate),
            candidate.lat,
            candidate.lon
        );
    }
    Ok(())
}

async fn favorites(command: FavoritesCommand) -> Result<()> {
    match command {
        FavoritesCommand::List => {
            let store = Store::open_default();
            let favorites = store.favorites();
            if favorites.is_empty() {
                println!("No favorites saved yet. Pin one with `skycast favorites add <place>`.");
                return Ok(());
            }
            for fav in &favorites {
                print_stored(fav);
            }
        }
        FavoritesCommand::Add { place } => {
            let (provider, store) = load_services()?;
            let candidate = resolve_place(provider.as_ref(), &store, &place).await?;
            println!("Pinned {}", describe(&candidate));
            store.add_favorite(candidate);
        }
        FavoritesCommand::Remove { lat, lon } => {
            let store = Store::open_default();
            store.remove_favorite(lat, lon);
            println!("Removed favorite at {lat}, {lon} (if it existed).");
        }
    }
    Ok(())
}

fn recent() -> Result<()> {
    let store = Store::open_default();
    let recent = store.recent_searches();
    if recent.is_empty() {
        println!("No recent searches.");
        return Ok(());
    }
    for item in &recent {
        print_stored(item);
    }
    Ok(())
}

fn prefs(
    unit: Option<UnitArg>,
    theme: Option<ThemeArg>,
    notifications: Option<bool>,
    auto_location: Option<bool>,
) -> Result<()> {
    let store = Store::open_default();

    let no_changes =
        unit.is_none() && theme.is_none() && notifications.is_none() && auto_location.is_none();
    let preferences = if no_changes {
        store.preferences()
    } else {
        store.update_preferences(PreferencesPatch {
            temperature_unit: unit.map(TemperatureUnit::from),
            theme: theme.map(Theme::from),
            notifications,
            auto_location,
        })
    };

    println!("Temperature unit: {:?}", preferences.temperature_unit);
    println!("Theme:            {:?}", preferences.theme);
    println!("Notifications:    {}", preferences.notifications);
    println!("Auto location:    {}", preferences.auto_location);
    Ok(())
}

fn describe(candidate: &LocationCandidate) -> String {
    match &candidate.state {
        Some(state) => format!("{}, {}, {}", candidate.name, state, candidate.country),
        None => format!("{}, {}", candidate.name, candidate.country),
    }
}

fn print_stored(item: &StoredLocation) {
    let when = chrono::DateTime::from_timestamp_millis(item.timestamp)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    println!(
        "{:<28} {:>8.3}, {:>8.3}   {}",
        item.name, item.lat, item.lon, when
    );
}

fn print_current(weather: &WeatherSnapshot, unit: TemperatureUnit) {
    println!("{}, {}", weather.name, weather.country);
    println!(
        "  {}  {}",
        units::format_temperature(weather.temp, unit),
        weather.condition.description
    );
    println!(
        "  Feels like {}  (low {} / high {})",
        units::format_temperature(weather.feels_like, unit),
        units::format_temperature(weather.temp_min, unit),
        units::format_temperature(weather.temp_max, unit),
    );
    println!(
        "  Humidity {}%   Pressure {}   Clouds {}%",
        weather.humidity,
        units::format_pressure(weather.pressure),
        weather.clouds,
    );
    println!(
        "  Wind {} {}   Visibility {}",
        units::format_wind_speed(weather.wind_speed),
        units::wind_direction(weather.wind_deg),
        units::format_visibility(weather.visibility),
    );
    println!(
        "  Sunrise {}   Sunset {}",
        units::format_time(weather.sunrise, weather.timezone_offset),
        units::format_time(weather.sunset, weather.timezone_offset),
    );
    println!(
        "  Updated {} {}",
        units::format_date(weather.observed_at),
        units::format_time(weather.observed_at, weather.timezone_offset),
    );
}
