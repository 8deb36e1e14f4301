use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{FetchError, ProviderReading};

use super::{WeatherProvider, http_client, truncate_body};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// OpenWeather "current weather" endpoint. Temperatures come back in Kelvin
/// because no `units` parameter is sent.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> reqwest::Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> reqwest::Result<Self> {
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    weather: Vec<OwWeather>,
}

impl TryFrom<OwCurrentResponse> for ProviderReading {
    type Error = FetchError;

    fn try_from(parsed: OwCurrentResponse) -> Result<Self, Self::Error> {
        let description = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| FetchError::Malformed("OpenWeather response has no conditions".into()))?;

        if parsed.main.humidity > 100 {
            return Err(FetchError::Malformed(format!(
                "OpenWeather humidity out of range: {}",
                parsed.main.humidity
            )));
        }

        Ok(ProviderReading {
            location_name: parsed.name,
            temperature_k: parsed.main.temp,
            description,
            humidity: parsed.main.humidity,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, location: &str) -> Result<ProviderReading, FetchError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        debug!(location, "requesting OpenWeather current conditions");

        let res = self
            .http
            .get(&url)
            .query(&[("q", location), ("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status { status, body: truncate_body(&body) });
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;
        ProviderReading::try_from(parsed)
    }
}
