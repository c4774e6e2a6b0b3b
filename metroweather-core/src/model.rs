use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A tracked city, identified by its provider city id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
}

impl City {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub deg: f64,
}

/// One raw weather sample for one city at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub city: String,
    pub city_id: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub condition: String,
    pub icon: String,
    pub humidity: f64,
    pub pressure: f64,
    pub wind: Option<Wind>,
    pub dt: DateTime<Utc>,
}

/// Aggregated statistics for one city over one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub city_id: String,
    pub city: String,
    pub date: NaiveDate,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub most_frequent_condition: String,
}

impl DailySummary {
    /// Uniqueness key in the summary store.
    pub fn key(&self) -> (&str, NaiveDate) {
        (self.city_id.as_str(), self.date)
    }
}

/// Statistics for all samples sharing an hour-of-day within a lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    /// Hour of day, 0-23 (UTC).
    pub hour: u32,
    pub city_id: String,
    pub count: usize,
    pub avg_temp: f64,
    pub avg_feels_like: f64,
    pub avg_humidity: f64,
    pub avg_pressure: f64,
}
