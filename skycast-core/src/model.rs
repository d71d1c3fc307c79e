use serde::{Deserialize, Serialize};

/// Geographic coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Temperature unit preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

/// UI theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

/// Condition summary as reported upstream: group, free-text description and
/// an icon code such as "01d".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Default for WeatherCondition {
    fn default() -> Self {
        Self {
            main: "Clear".to_string(),
            description: "Clear sky".to_string(),
            icon: "01d".to_string(),
        }
    }
}

/// One current-conditions observation. Every field is populated; upstream
/// omissions are replaced by deterministic defaults during decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    /// Temperature in °C.
    pub temp: f64,
    /// Apparent temperature in °C.
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Relative humidity, 0–100.
    pub humidity: u8,
    /// Pressure in hPa.
    pub pressure: u32,
    /// Visibility in meters.
    pub visibility: u32,
    /// Wind speed in m/s.
    pub wind_speed: f64,
    /// Wind direction in degrees, 0–359.
    pub wind_deg: u16,
    /// Cloud cover, 0–100.
    pub clouds: u8,
    pub condition: WeatherCondition,
    /// Unix seconds.
    pub sunrise: i64,
    pub sunset: i64,
    /// Offset of the observed location from UTC, seconds.
    pub timezone_offset: i32,
    /// When the observation was taken, unix seconds.
    pub observed_at: i64,
}

/// One time-bucketed forecast point (3-hour steps as delivered upstream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Forecasted instant, unix seconds.
    pub forecast_at: i64,
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub condition: WeatherCondition,
    pub wind_speed: f64,
    /// Probability of precipitation, 0.0–1.0.
    pub precipitation_probability: f64,
}

/// A place returned by forward or reverse geocoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// A location kept in the store, used for both favorites and recent
/// searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLocation {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// When the entry was saved or searched, unix milliseconds.
    pub timestamp: i64,
}

impl StoredLocation {
    pub fn stamped(candidate: LocationCandidate, timestamp: i64) -> Self {
        Self {
            name: candidate.name,
            country: candidate.country,
            lat: candidate.lat,
            lon: candidate.lon,
            state: candidate.state,
            timestamp,
        }
    }
}

/// Process-wide user preferences. Missing fields deserialize to the
/// defaults, so values stored by older versions stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub temperature_unit: TemperatureUnit,
    pub theme: Theme,
    pub notifications: bool,
    pub auto_location: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            temperature_unit: TemperatureUnit::Celsius,
            theme: Theme::Auto,
            notifications: false,
            auto_location: true,
        }
    }
}

/// Partial update for [`UserPreferences`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesPatch {
    pub temperature_unit: Option<TemperatureUnit>,
    pub theme: Option<Theme>,
    pub notifications: Option<bool>,
    pub auto_location: Option<bool>,
}

impl UserPreferences {
    /// Shallow-merge a patch into these preferences.
    pub fn apply(&mut self, patch: PreferencesPatch) {
        if let Some(unit) = patch.temperature_unit {
            self.temperature_unit = unit;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(notifications) = patch.notifications {
            self.notifications = notifications;
        }
        if let Some(auto_location) = patch.auto_location {
            self.auto_location = auto_location;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_default_values() {
        let prefs = UserPreferences::default();
        assert_eq!(prefs.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(prefs.theme, Theme::Auto);
        assert!(!prefs.notifications);
        assert!(prefs.auto_location);
    }

    #[test]
    fn preferences_patch_merges_only_present_fields() {
        let mut prefs = UserPreferences::default();
        prefs.apply(PreferencesPatch {
            temperature_unit: Some(TemperatureUnit::Fahrenheit),
            notifications: Some(true),
            ..Default::default()
        });

        assert_eq!(prefs.temperature_unit, TemperatureUnit::Fahrenheit);
        assert!(prefs.notifications);
        assert_eq!(prefs.theme, Theme::Auto);
        assert!(prefs.auto_location);
    }

    #[test]
    fn preferences_deserialize_fills_missing_fields() {
        let prefs: UserPreferences =
            serde_json::from_str(r#"{"temperature_unit":"fahrenheit"}"#).expect("valid json");
        assert_eq!(prefs.temperature_unit, TemperatureUnit::Fahrenheit);
        assert!(prefs.auto_location);
    }

    #[test]
    fn stored_location_keeps_candidate_fields() {
        let candidate = LocationCandidate {
            name: "Lisbon".to_string(),
            country: "PT".to_string(),
            lat: 38.72,
            lon: -9.14,
            state: None,
        };
        let stored = StoredLocation::stamped(candidate, 1_700_000_000_000);
        assert_eq!(stored.name, "Lisbon");
        assert_eq!(stored.timestamp, 1_700_000_000_000);
    }
}
