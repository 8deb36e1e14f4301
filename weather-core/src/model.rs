use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const KELVIN_OFFSET: f64 = 273.15;

/// One weather reading for one location at one instant.
///
/// Field names on disk follow the layout of existing `weather_data.json`
/// files (`city`, `temperature`, `utc_timestamp`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "city")]
    pub location: String,
    /// Degrees Celsius, two decimals.
    #[serde(rename = "temperature")]
    pub temperature_c: f64,
    pub description: String,
    pub humidity: u8,
    #[serde(rename = "utc_timestamp")]
    pub observed_at_utc: DateTime<Utc>,
    #[serde(rename = "local_timestamp")]
    pub observed_at_local: NaiveDateTime,
}

impl Observation {
    /// Build an observation from a provider reading taken at `observed_at`.
    pub fn from_reading(reading: ProviderReading, observed_at: DateTime<Utc>) -> Self {
        Self {
            location: reading.location_name,
            temperature_c: kelvin_to_celsius(reading.temperature_k),
            description: reading.description,
            humidity: reading.humidity,
            observed_at_utc: observed_at,
            observed_at_local: observed_at.with_timezone(&Local).naive_local(),
        }
    }

    pub fn location_key(&self) -> String {
        location_key(&self.location)
    }

    pub fn is_location(&self, location: &str) -> bool {
        self.location_key() == location_key(location)
    }
}

/// Raw current conditions as reported by a provider, before timestamping.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReading {
    /// Provider's canonical spelling of the location.
    pub location_name: String,
    pub temperature_k: f64,
    pub description: String,
    pub humidity: u8,
}

/// Normalized form used for every location comparison and grouping.
pub fn location_key(location: &str) -> String {
    location.trim().to_lowercase()
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    round2(kelvin - KELVIN_OFFSET)
}

pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
