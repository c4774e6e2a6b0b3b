//! Hour-of-day statistics over a trailing lookback window.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::debug;

use crate::{
    error::{Error, Result},
    model::{HourlyBucket, Reading},
    stats::Summary,
    store::{ReadingStore, TimeRange},
};

/// Groups a city's readings by hour of day.
///
/// Samples from different days that share an hour of day land in the same
/// bucket, so the result describes a "typical hour" over the window rather
/// than sequential hourly slots.
#[derive(Debug, Clone)]
pub struct HourlyAggregator {
    readings: Arc<dyn ReadingStore>,
}

impl HourlyAggregator {
    pub fn new(readings: Arc<dyn ReadingStore>) -> Self {
        Self { readings }
    }

    /// Buckets over `[now - lookback_hours, now]`.
    pub async fn compute(&self, city_id: &str, lookback_hours: u32) -> Result<Vec<HourlyBucket>> {
        self.compute_at(city_id, lookback_hours, Utc::now()).await
    }

    pub async fn compute_at(
        &self,
        city_id: &str,
        lookback_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<HourlyBucket>> {
        if city_id.trim().is_empty() {
            return Err(Error::validation("city_id must not be empty"));
        }
        if lookback_hours == 0 {
            return Err(Error::validation("lookback hours must be a positive integer"));
        }

        let range = TimeRange::closed(window_start(now, lookback_hours), now);
        let readings = self.readings.find_range(city_id, range).await?;
        debug!(city_id, lookback_hours, samples = readings.len(), "computing hourly buckets");

        Ok(bucket_by_hour(city_id, &readings))
    }
}

/// `now - lookback_hours`, clamped to the earliest representable instant.
fn window_start(now: DateTime<Utc>, lookback_hours: u32) -> DateTime<Utc> {
    Duration::try_hours(i64::from(lookback_hours))
        .and_then(|lookback| now.checked_sub_signed(lookback))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Default)]
struct HourAccumulator {
    temp: Summary,
    feels_like: Summary,
    humidity: Summary,
    pressure: Summary,
}

/// Group readings by UTC hour of day, ascending by hour.
pub fn bucket_by_hour(city_id: &str, readings: &[Reading]) -> Vec<HourlyBucket> {
    let mut hours: BTreeMap<u32, HourAccumulator> = BTreeMap::new();
    for r in readings {
        let acc = hours.entry(r.dt.hour()).or_default();
        acc.temp.push(r.temperature);
        acc.feels_like.push(r.feels_like);
        acc.humidity.push(r.humidity);
        acc.pressure.push(r.pressure);
    }

    hours
        .into_iter()
        .map(|(hour, acc)| HourlyBucket {
            hour,
            city_id: city_id.to_string(),
            count: acc.temp.count(),
            avg_temp: acc.temp.mean().unwrap_or_default(),
            avg_feels_like: acc.feels_like.mean().unwrap_or_default(),
            avg_humidity: acc.humidity.mean().unwrap_or_default(),
            avg_pressure: acc.pressure.mean().unwrap_or_default(),
        })
        .collect()
}
