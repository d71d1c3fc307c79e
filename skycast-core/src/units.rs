//! Pure unit conversion and display formatting helpers.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::model::TemperatureUnit;

const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Format a °C temperature in the requested unit, rounded to the nearest
/// whole degree, e.g. `21°C` or `70°F`.
pub fn format_temperature(temp_c: f64, unit: TemperatureUnit) -> String {
    let (value, suffix) = match unit {
        TemperatureUnit::Celsius => (temp_c, "°C"),
        TemperatureUnit::Fahrenheit => (celsius_to_fahrenheit(temp_c), "°F"),
    };
    format!("{}{}", value.round() as i64, suffix)
}

/// Clock time (HH:MM) at the given UTC offset.
pub fn format_time(epoch_seconds: i64, tz_offset_seconds: i32) -> String {
    let offset = FixedOffset::east_opt(tz_offset_seconds).unwrap_or_else(|| Utc.fix());
    match DateTime::<Utc>::from_timestamp(epoch_seconds, 0) {
        Some(utc) => utc.with_timezone(&offset).format("%H:%M").to_string(),
        None => String::new(),
    }
}

/// Abbreviated weekday, month and day, e.g. `Mon, Jan 5`.
pub fn format_date(epoch_seconds: i64) -> String {
    match DateTime::<Utc>::from_timestamp(epoch_seconds, 0) {
        Some(utc) => utc.format("%a, %b %-d").to_string(),
        None => String::new(),
    }
}

/// Map wind degrees to one of 8 compass points; buckets are 45° wide and
/// centered on each point.
pub fn wind_direction(degrees: u16) -> &'static str {
    let bucket = (f64::from(degrees) / 45.0).round() as usize % 8;
    COMPASS_POINTS[bucket]
}

pub fn format_wind_speed(speed_mps: f64) -> String {
    format!("{speed_mps:.1} m/s")
}

pub fn format_pressure(pressure_hpa: u32) -> String {
    format!("{pressure_hpa} hPa")
}

pub fn format_visibility(visibility_m: u32) -> String {
    format!("{:.1} km", f64::from(visibility_m) / 1000.0)
}
