use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::{
    error::Result,
    model::{DailySummary, Reading},
};

use super::{ReadingStore, SummaryStore, TimeRange};

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
    summaries: RwLock<BTreeMap<(String, NaiveDate), DailySummary>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(readings: Vec<Reading>, summaries: Vec<DailySummary>) -> Self {
        let summaries = summaries
            .into_iter()
            .map(|s| ((s.city_id.clone(), s.date), s))
            .collect();
        Self { readings: RwLock::new(readings), summaries: RwLock::new(summaries) }
    }

    pub async fn reading_count(&self) -> usize {
        self.readings.read().await.len()
    }

    pub async fn summary_count(&self) -> usize {
        self.summaries.read().await.len()
    }

    pub(crate) async fn all_readings(&self) -> Vec<Reading> {
        self.readings.read().await.clone()
    }

    pub(crate) async fn all_summaries(&self) -> Vec<DailySummary> {
        self.summaries.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: Reading) -> Result<()> {
        self.readings.write().await.push(reading);
        Ok(())
    }

    async fn find_range(&self, city_id: &str, range: TimeRange) -> Result<Vec<Reading>> {
        let mut found: Vec<Reading> = self
            .readings
            .read()
            .await
            .iter()
            .filter(|r| r.city_id == city_id && range.contains(r.dt))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.dt);
        Ok(found)
    }

    async fn latest_reading(&self, city_id: &str) -> Result<Option<Reading>> {
        Ok(self
            .readings
            .read()
            .await
            .iter()
            .filter(|r| r.city_id == city_id)
            .max_by_key(|r| r.dt)
            .cloned())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut readings = self.readings.write().await;
        let before = readings.len();
        readings.retain(|r| r.dt >= cutoff);
        Ok(before - readings.len())
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn upsert(&self, summary: DailySummary) -> Result<()> {
        let (city_id, date) = summary.key();
        let key = (city_id.to_string(), date);
        self.summaries.write().await.insert(key, summary);
        Ok(())
    }

    async fn recent_summaries(&self, city_id: &str, limit: usize) -> Result<Vec<DailySummary>> {
        Ok(self
            .summaries
            .read()
            .await
            .values()
            .rev()
            .filter(|s| s.city_id == city_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    pub(crate) fn reading(city_id: &str, dt: DateTime<Utc>, temperature: f64, condition: &str) -> Reading {
        Reading {
            city: format!("City {city_id}"),
            city_id: city_id.to_string(),
            temperature,
            feels_like: temperature - 1.0,
            condition: condition.to_string(),
            icon: "01d".to_string(),
            humidity: 50.0,
            pressure: 1010.0,
            wind: None,
            dt,
        }
    }

    pub(crate) fn summary(city_id: &str, date: NaiveDate, avg_temp: f64) -> DailySummary {
        DailySummary {
            city_id: city_id.to_string(),
            city: format!("City {city_id}"),
            date,
            avg_temp,
            max_temp: avg_temp + 5.0,
            min_temp: avg_temp - 5.0,
            most_frequent_condition: "Clear".to_string(),
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn find_range_filters_city_and_orders_by_time() {
        let store = MemoryStore::new();
        store.insert(reading("a", at(10), 1.0, "Clear")).await.unwrap();
        store.insert(reading("a", at(8), 2.0, "Clear")).await.unwrap();
        store.insert(reading("b", at(9), 3.0, "Clear")).await.unwrap();
        store.insert(reading("a", at(20), 4.0, "Clear")).await.unwrap();

        let found = store.find_range("a", TimeRange::closed(at(8), at(10))).await.unwrap();
        let temps: Vec<f64> = found.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![2.0, 1.0]);
    }

    #[tokio::test]
    async fn latest_reading_is_newest_by_timestamp() {
        let store = MemoryStore::new();
        assert!(store.latest_reading("a").await.unwrap().is_none());

        store.insert(reading("a", at(12), 1.0, "Clear")).await.unwrap();
        store.insert(reading("a", at(9), 2.0, "Clear")).await.unwrap();

        let latest = store.latest_reading("a").await.unwrap().expect("has reading");
        assert_eq!(latest.dt, at(12));
    }

    #[tokio::test]
    async fn prune_removes_only_older_readings() {
        let store = MemoryStore::new();
        store.insert(reading("a", at(1), 1.0, "Clear")).await.unwrap();
        store.insert(reading("a", at(5), 1.0, "Clear")).await.unwrap();
        store.insert(reading("b", at(7), 1.0, "Clear")).await.unwrap();

        let removed = store.prune_before(at(5)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.reading_count().await, 2);
    }

    #[tokio::test]
    async fn upsert_keeps_one_summary_per_city_and_date() {
        let store = MemoryStore::new();
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        store.upsert(summary("a", day, 10.0)).await.unwrap();
        store.upsert(summary("a", day, 12.0)).await.unwrap();
        store.upsert(summary("b", day, 30.0)).await.unwrap();

        assert_eq!(store.summary_count().await, 2);
        let recent = store.recent_summaries("a", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].avg_temp, 12.0);
    }

    #[tokio::test]
    async fn recent_summaries_are_newest_first_and_limited() {
        let store = MemoryStore::new();
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for offset in [2, 0, 4, 1, 3] {
            store.upsert(summary("a", first + Duration::days(offset), offset as f64)).await.unwrap();
        }

        let recent = store.recent_summaries("a", 3).await.unwrap();
        let dates: Vec<NaiveDate> = recent.iter().map(|s| s.date).collect();
        assert_eq!(
            dates,
            vec![first + Duration::days(4), first + Duration::days(3), first + Duration::days(2)]
        );
    }
}
