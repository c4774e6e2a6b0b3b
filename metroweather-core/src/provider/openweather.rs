use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{City, Reading, Wind},
};

use super::WeatherProvider;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    api_url: String,
    units: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, api_url: String, units: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { api_key, api_url, units, http })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_key.clone(),
            config.api_url.clone(),
            config.units.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    async fn fetch_current(&self, city: &City) -> anyhow::Result<Reading> {
        let res = self
            .http
            .get(&self.api_url)
            .query(&[
                ("id", city.id.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .send()
            .await
            .context("Failed to send request to OpenWeather")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read OpenWeather response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: OwCurrentResponse =
            serde_json::from_str(&body).context("Failed to parse OpenWeather JSON")?;

        Ok(parsed.into_reading(city, Utc::now()))
    }
}

// Every member is optional; absent values become sentinels instead of failing the fetch.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWeather {
    main: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWind {
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwCurrentResponse {
    name: Option<String>,
    dt: Option<i64>,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
}

impl OwCurrentResponse {
    fn into_reading(self, city: &City, fetched_at: DateTime<Utc>) -> Reading {
        let weather = self.weather.into_iter().next().unwrap_or_default();

        Reading {
            city: self.name.filter(|n| !n.is_empty()).unwrap_or_else(|| city.name.clone()),
            city_id: city.id.clone(),
            temperature: self.main.temp.unwrap_or(0.0),
            feels_like: self.main.feels_like.unwrap_or(0.0),
            condition: weather.main.unwrap_or_else(|| "Unknown".to_string()),
            icon: weather.icon.unwrap_or_else(|| "default-icon".to_string()),
            humidity: self.main.humidity.unwrap_or(0.0),
            pressure: self.main.pressure.unwrap_or(0.0),
            wind: self.wind.map(|w| Wind {
                speed: w.speed.unwrap_or(0.0),
                deg: w.deg.unwrap_or(0.0),
            }),
            dt: self.dt.and_then(unix_to_utc).unwrap_or(fetched_at),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self), fields(city_id = %city.id))]
    async fn fetch(&self, city: &City) -> Result<Reading> {
        let reading = self
            .fetch_current(city)
            .await
            .map_err(|e| Error::upstream(&city.id, e))?;
        debug!(temperature = reading.temperature, condition = %reading.condition, "fetched reading");
        Ok(reading)
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
