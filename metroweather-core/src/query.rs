//! Read-only accessors for the outer API layer.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::{Error, Result},
    hourly::HourlyAggregator,
    model::{City, DailySummary, HourlyBucket, Reading},
    store::{ReadingStore, SummaryStore},
};

/// Latest reading for one city, or for every tracked city.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Current {
    One(Reading),
    All(Vec<Reading>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum History {
    Hourly(Vec<HourlyBucket>),
    Daily(Vec<DailySummary>),
}

#[derive(Debug, Clone)]
pub struct WeatherQuery {
    cities: Vec<City>,
    readings: Arc<dyn ReadingStore>,
    summaries: Arc<dyn SummaryStore>,
    hourly: HourlyAggregator,
}

impl WeatherQuery {
    pub fn new(
        cities: Vec<City>,
        readings: Arc<dyn ReadingStore>,
        summaries: Arc<dyn SummaryStore>,
    ) -> Self {
        let hourly = HourlyAggregator::new(readings.clone());
        Self { cities, readings, summaries, hourly }
    }

    /// With a city id, that city's latest reading (NotFound if none).
    /// Without, the latest reading of each tracked city that has one.
    pub async fn current(&self, city_id: Option<&str>) -> Result<Current> {
        match city_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => self
                .readings
                .latest_reading(id)
                .await?
                .map(Current::One)
                .ok_or_else(|| Error::NotFound(format!("weather data for city {id}"))),
            None => {
                let mut all = Vec::with_capacity(self.cities.len());
                for city in &self.cities {
                    if let Some(reading) = self.readings.latest_reading(&city.id).await? {
                        all.push(reading);
                    }
                }
                Ok(Current::All(all))
            }
        }
    }

    /// History lookup with the loose parameters an HTTP query string gives.
    /// Hours take precedence when both are present.
    pub async fn history(
        &self,
        city_id: Option<&str>,
        hours: Option<u32>,
        days: Option<u32>,
    ) -> Result<History> {
        let city_id = city_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::validation("missing required parameter: city_id"))?;

        match (hours, days) {
            (Some(h), _) => Ok(History::Hourly(self.history_by_hours(city_id, h).await?)),
            (None, Some(d)) => Ok(History::Daily(self.history_by_days(city_id, d).await?)),
            (None, None) => Err(Error::validation("one of hours or days is required")),
        }
    }

    pub async fn history_by_hours(&self, city_id: &str, hours: u32) -> Result<Vec<HourlyBucket>> {
        self.hourly.compute(city_id, hours).await
    }

    /// Most recent `days` summaries, newest first.
    pub async fn history_by_days(&self, city_id: &str, days: u32) -> Result<Vec<DailySummary>> {
        if city_id.trim().is_empty() {
            return Err(Error::validation("city_id must not be empty"));
        }
        if days == 0 {
            return Err(Error::validation("days must be a positive integer"));
        }
        self.summaries.recent_summaries(city_id, days as usize).await
    }
}
