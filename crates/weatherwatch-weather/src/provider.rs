//! OpenWeather current-conditions client.

use crate::types::{kelvin_to_celsius, DetailedConditions, Reading, PLAUSIBLE_CELSIUS};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use weatherwatch_core::{FetchError, ProviderConfig, ReqwestErrorExt};

/// Source of current readings for a city.
///
/// Implementations never retry; the next poll cycle is the retry.
#[async_trait]
pub trait ReadingFetcher: Send + Sync {
    /// Fetch the current reading for `city`.
    async fn fetch(&self, city: &str) -> Result<Reading, FetchError>;

    /// Fetch a richer snapshot of current conditions. Not persisted.
    async fn fetch_detailed(&self, city: &str) -> Result<DetailedConditions, FetchError>;
}

#[derive(Debug, Deserialize)]
struct OwResponse {
    name: Option<String>,
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: Option<f64>,
    temp_max: Option<f64>,
    humidity: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, FetchError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn get_current(&self, city: &str) -> Result<OwResponse, FetchError> {
        if city.is_empty() {
            return Err(FetchError::NotFound("empty city name".to_string()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_fetch_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(city.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!(
                "provider returned status {status} for {city}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(ReqwestErrorExt::into_fetch_error)?;

        serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedResponse(format!("{city}: {e}")))
    }
}

fn plausible(city: &str, field: &str, celsius: f64) -> Result<f64, FetchError> {
    if PLAUSIBLE_CELSIUS.contains(&celsius) {
        Ok(celsius)
    } else {
        Err(FetchError::MalformedResponse(format!(
            "{city}: implausible {field} {celsius} °C"
        )))
    }
}

fn first_condition<'a>(city: &str, body: &'a OwResponse) -> Result<&'a OwWeather, FetchError> {
    body.weather
        .first()
        .ok_or_else(|| FetchError::MalformedResponse(format!("{city}: no weather conditions")))
}

#[async_trait]
impl ReadingFetcher for OpenWeatherProvider {
    async fn fetch(&self, city: &str) -> Result<Reading, FetchError> {
        let body = self.get_current(city).await?;
        let condition = first_condition(city, &body)?;

        let reading = Reading {
            city: city.to_string(),
            condition: condition.main.clone(),
            temperature_c: plausible(city, "temp", kelvin_to_celsius(body.main.temp))?,
            feels_like_c: plausible(city, "feels_like", kelvin_to_celsius(body.main.feels_like))?,
            observed_at: body.dt,
        };

        tracing::debug!(
            city = %reading.city,
            temp = reading.temperature_c,
            condition = %reading.condition,
            "Fetched reading"
        );
        Ok(reading)
    }

    async fn fetch_detailed(&self, city: &str) -> Result<DetailedConditions, FetchError> {
        let body = self.get_current(city).await?;
        let condition = first_condition(city, &body)?;

        let missing = |field: &str| FetchError::MalformedResponse(format!("{city}: missing {field}"));
        let temp = plausible(city, "temp", kelvin_to_celsius(body.main.temp))?;
        let temp_max = body.main.temp_max.ok_or_else(|| missing("main.temp_max"))?;
        let temp_min = body.main.temp_min.ok_or_else(|| missing("main.temp_min"))?;
        let humidity = body.main.humidity.ok_or_else(|| missing("main.humidity"))?;
        let wind = body.wind.as_ref().ok_or_else(|| missing("wind"))?;

        Ok(DetailedConditions {
            city: body.name.clone().unwrap_or_else(|| city.to_string()),
            temperature_c: temp,
            max_temperature_c: plausible(city, "temp_max", kelvin_to_celsius(temp_max))?,
            min_temperature_c: plausible(city, "temp_min", kelvin_to_celsius(temp_min))?,
            humidity_pct: humidity,
            wind_speed_mps: wind.speed,
            dominant_condition: condition.main.clone(),
            condition_reason: condition.description.clone(),
        })
    }
}
