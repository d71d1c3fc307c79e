use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::model::{ForecastEntry, LocationCandidate, WeatherCondition, WeatherSnapshot};

use super::{WeatherError, WeatherProvider};

const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const OPENWEATHER_GEO_URL: &str = "https://api.openweathermap.org/geo/1.0";

/// Client for the OpenWeatherMap data and geocoding APIs.
///
/// Responses are decoded leniently: any recognized field is extracted, and
/// everything the service omits is replaced by a fixed default so callers
/// always receive fully-populated records.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
    base_url: String,
    geo_url: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
            base_url: OPENWEATHER_BASE_URL.to_string(),
            geo_url: OPENWEATHER_GEO_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_urls(api_key: &str, base_url: &str, geo_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: Client::new(),
            base_url: base_url.to_string(),
            geo_url: geo_url.to_string(),
        }
    }

    fn api_key(&self) -> Result<&str, WeatherError> {
        if self.api_key.is_empty() {
            Err(WeatherError::MissingApiKey)
        } else {
            Ok(&self.api_key)
        }
    }

    /// One GET round-trip: transport errors become `Unavailable`, non-success
    /// statuses become `Status`, and the body must at least be JSON.
    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, WeatherError> {
        let res = self.http.get(url).query(query).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(WeatherError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| WeatherError::Unavailable(format!("unreadable response body: {e}")))
    }

    async fn lookup_place(&self, lat: f64, lon: f64) -> Result<LocationCandidate, WeatherError> {
        let key = self.api_key()?;
        let url = format!("{}/reverse", self.geo_url);

        let value = self
            .get_json(
                &url,
                &[
                    ("lat", lat.to_string().as_str()),
                    ("lon", lon.to_string().as_str()),
                    ("limit", "1"),
                    ("appid", key),
                ],
            )
            .await?;

        let Some(items) = value.as_array() else {
            return Ok(fallback_candidate(lat, lon));
        };
        let Some(item) = items.first() else {
            return Ok(fallback_candidate(lat, lon));
        };

        let raw: OwGeoItem = serde_json::from_value(item.clone()).unwrap_or_default();
        Ok(LocationCandidate {
            name: raw.name.unwrap_or_else(|| "Unknown Location".to_string()),
            country: raw.country.unwrap_or_else(|| "Unknown".to_string()),
            lat: raw.lat.unwrap_or(lat),
            lon: raw.lon.unwrap_or(lon),
            state: raw.state,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, WeatherError> {
        let key = self.api_key()?;
        let url = format!("{}/weather", self.base_url);
        tracing::debug!(lat, lon, "fetching current weather");

        let value = self
            .get_json(
                &url,
                &[
                    ("lat", lat.to_string().as_str()),
                    ("lon", lon.to_string().as_str()),
                    ("appid", key),
                    ("units", "metric"),
                ],
            )
            .await?;

        // An unexpected top-level shape degrades to an all-defaults record.
        let raw: OwCurrentResponse = serde_json::from_value(value).unwrap_or_default();

        Ok(WeatherSnapshot {
            name: raw.name.unwrap_or_else(|| "Unknown Location".to_string()),
            country: raw.sys.country.unwrap_or_else(|| "Unknown".to_string()),
            lat,
            lon,
            temp: raw.main.temp.unwrap_or(0.0),
            feels_like: raw.main.feels_like.unwrap_or(0.0),
            temp_min: raw.main.temp_min.unwrap_or(0.0),
            temp_max: raw.main.temp_max.unwrap_or(0.0),
            humidity: raw.main.humidity.unwrap_or(0.0) as u8,
            pressure: raw.main.pressure.unwrap_or(0.0) as u32,
            visibility: raw.visibility.unwrap_or(10_000.0) as u32,
            wind_speed: raw.wind.speed.unwrap_or(0.0),
            wind_deg: raw.wind.deg.unwrap_or(0.0).rem_euclid(360.0) as u16,
            clouds: raw.clouds.all.unwrap_or(0.0) as u8,
            condition: condition_from(raw.weather),
            sunrise: raw.sys.sunrise.unwrap_or(0),
            sunset: raw.sys.sunset.unwrap_or(0),
            timezone_offset: raw.timezone.unwrap_or(0) as i32,
            observed_at: raw.dt.unwrap_or_else(|| Utc::now().timestamp()),
        })
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastEntry>, WeatherError> {
        let key = self.api_key()?;
        let url = format!("{}/forecast", self.base_url);
        tracing::debug!(lat, lon, "fetching forecast");

        let value = self
            .get_json(
                &url,
                &[
                    ("lat", lat.to_string().as_str()),
                    ("lon", lon.to_string().as_str()),
                    ("appid", key),
                    ("units", "metric"),
                ],
            )
            .await?;

        let Some(list) = value.get("list").and_then(Value::as_array) else {
            tracing::warn!("forecast response carries no list, returning empty forecast");
            return Ok(Vec::new());
        };

        Ok(list
            .iter()
            .map(|item| {
                let raw: OwForecastItem = serde_json::from_value(item.clone()).unwrap_or_default();
                ForecastEntry {
                    forecast_at: raw.dt.unwrap_or(0),
                    temp: raw.main.temp.unwrap_or(0.0),
                    feels_like: raw.main.feels_like.unwrap_or(0.0),
                    temp_min: raw.main.temp_min.unwrap_or(0.0),
                    temp_max: raw.main.temp_max.unwrap_or(0.0),
                    humidity: raw.main.humidity.unwrap_or(0.0) as u8,
                    condition: condition_from(raw.weather),
                    wind_speed: raw.wind.speed.unwrap_or(0.0),
                    precipitation_probability: raw.pop.unwrap_or(0.0),
                }
            })
            .collect())
    }

    async fn search_locations(&self, query: &str) -> Result<Vec<LocationCandidate>, WeatherError> {
        let key = self.api_key()?;
        let url = format!("{}/direct", self.geo_url);
        tracing::debug!(query, "searching locations");

        let value = self
            .get_json(&url, &[("q", query), ("limit", "5"), ("appid", key)])
            .await?;

        let Some(items) = value.as_array() else {
            tracing::warn!("search response is not an array, returning no matches");
            return Ok(Vec::new());
        };

        Ok(items
            .iter()
            .map(|item| {
                let raw: OwGeoItem = serde_json::from_value(item.clone()).unwrap_or_default();
                LocationCandidate {
                    name: raw.name.unwrap_or_else(|| "Unknown".to_string()),
                    country: raw.country.unwrap_or_else(|| "Unknown".to_string()),
                    lat: raw.lat.unwrap_or(0.0),
                    lon: raw.lon.unwrap_or(0.0),
                    state: raw.state,
                }
            })
            .collect())
    }

    async fn reverse_geocode(&self, lat: f64, lon: f64) -> LocationCandidate {
        match self.lookup_place(lat, lon).await {
            Ok(candidate) => candidate,
            Err(err) => {
                tracing::warn!("reverse geocoding failed, using fallback: {err}");
                fallback_candidate(lat, lon)
            }
        }
    }
}

fn condition_from(weather: Vec<OwWeatherItem>) -> WeatherCondition {
    weather
        .into_iter()
        .next()
        .map(|w| WeatherCondition {
            main: w.main.unwrap_or_else(|| "Clear".to_string()),
            description: w.description.unwrap_or_else(|| "Clear sky".to_string()),
            icon: w.icon.unwrap_or_else(|| "01d".to_string()),
        })
        .unwrap_or_default()
}

fn fallback_candidate(lat: f64, lon: f64) -> LocationCandidate {
    LocationCandidate {
        name: "Unknown Location".to_string(),
        country: "Unknown".to_string(),
        lat,
        lon,
        state: None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwWeatherItem {
    main: Option<String>,
    description: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwClouds {
    all: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwCurrentResponse {
    name: Option<String>,
    #[serde(default)]
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeatherItem>,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    clouds: OwClouds,
    #[serde(default)]
    sys: OwSys,
    visibility: Option<f64>,
    timezone: Option<i64>,
    dt: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwForecastItem {
    dt: Option<i64>,
    #[serde(default)]
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeatherItem>,
    #[serde(default)]
    wind: OwWind,
    pop: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwGeoItem {
    name: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    state: Option<String>,
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
