//! Once-a-day summary records per tracked city.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{error, info};

use crate::{
    error::Result,
    model::{City, DailySummary, Reading},
    stats::{Summary, mode},
    store::{ReadingStore, SummaryStore, TimeRange},
};

/// Outcome of one rollup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupReport {
    pub date: NaiveDate,
    /// City ids that got a summary.
    pub written: Vec<String>,
    /// City ids with no readings for the day.
    pub skipped: Vec<String>,
    /// City ids whose rollup failed.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DailyRollup {
    cities: Vec<City>,
    readings: Arc<dyn ReadingStore>,
    summaries: Arc<dyn SummaryStore>,
}

/// `[date 00:00 UTC, next day 00:00 UTC)`
pub fn day_window(date: NaiveDate) -> TimeRange {
    let start: DateTime<Utc> = date.and_time(chrono::NaiveTime::MIN).and_utc();
    TimeRange::half_open(start, start + Duration::days(1))
}

/// Aggregate one city's readings for a day. `None` when there are no readings.
pub fn summarize_day(city: &City, date: NaiveDate, readings: &[Reading]) -> Option<DailySummary> {
    let temps: Summary = readings.iter().map(|r| r.temperature).collect();
    let condition = mode(readings.iter().map(|r| r.condition.as_str()))?;

    Some(DailySummary {
        city_id: city.id.clone(),
        city: city.name.clone(),
        date,
        avg_temp: temps.mean()?,
        max_temp: temps.max()?,
        min_temp: temps.min()?,
        most_frequent_condition: condition.to_string(),
    })
}

impl DailyRollup {
    pub fn new(
        cities: Vec<City>,
        readings: Arc<dyn ReadingStore>,
        summaries: Arc<dyn SummaryStore>,
    ) -> Self {
        Self { cities, readings, summaries }
    }

    /// Summarize `date` for every tracked city.
    ///
    /// A failing city is logged and recorded in the report; the remaining
    /// cities are still processed.
    pub async fn run(&self, date: NaiveDate) -> RollupReport {
        let window = day_window(date);
        let mut report = RollupReport {
            date,
            written: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };

        for city in &self.cities {
            match self.run_city(city, date, window).await {
                Ok(true) => {
                    info!(city = %city.name, %date, "daily summary saved");
                    report.written.push(city.id.clone());
                }
                Ok(false) => {
                    info!(city = %city.name, %date, "no weather data for day, skipping summary");
                    report.skipped.push(city.id.clone());
                }
                Err(e) => {
                    error!(city = %city.name, %date, error = %e, "daily summary failed");
                    report.failed.push(city.id.clone());
                }
            }
        }

        report
    }

    /// Rollup for the UTC day before `now`.
    pub async fn run_previous_day(&self, now: DateTime<Utc>) -> RollupReport {
        self.run(now.date_naive() - Duration::days(1)).await
    }

    async fn run_city(&self, city: &City, date: NaiveDate, window: TimeRange) -> Result<bool> {
        let readings = self.readings.find_range(&city.id, window).await?;
        match summarize_day(city, date, &readings) {
            Some(summary) => {
                self.summaries.upsert(summary).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        store::{MemoryStore, memory::tests::reading},
    };
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
    }

    fn cities() -> Vec<City> {
        vec![City::new("a", "Alpha"), City::new("b", "Bravo"), City::new("c", "Charlie")]
    }

    fn rollup(store: &Arc<MemoryStore>) -> DailyRollup {
        DailyRollup::new(cities(), store.clone(), store.clone())
    }

    #[test]
    fn day_window_covers_exactly_one_day() {
        let w = day_window(day());
        assert_eq!(w.start, ts(15, 0, 0));
        assert_eq!(w.end, ts(16, 0, 0));
        assert!(w.contains(ts(15, 23, 59)));
        assert!(!w.contains(ts(16, 0, 0)));
        assert!(!w.contains(ts(14, 23, 59)));
    }

    #[test]
    fn summarize_day_aggregates_temperatures_and_condition() {
        let readings = vec![
            reading("a", ts(15, 1, 0), 10.0, "Rain"),
            reading("a", ts(15, 2, 0), 20.0, "Rain"),
            reading("a", ts(15, 3, 0), 30.0, "Clear"),
        ];
        let s = summarize_day(&City::new("a", "Alpha"), day(), &readings).expect("has data");

        assert_eq!(s.city, "Alpha");
        assert_eq!(s.avg_temp, 20.0);
        assert_eq!(s.min_temp, 10.0);
        assert_eq!(s.max_temp, 30.0);
        assert_eq!(s.most_frequent_condition, "Rain");
        assert!(s.min_temp <= s.avg_temp && s.avg_temp <= s.max_temp);
    }

    #[test]
    fn summarize_day_of_nothing_is_none() {
        assert!(summarize_day(&City::new("a", "Alpha"), day(), &[]).is_none());
    }

    #[tokio::test]
    async fn only_readings_inside_the_day_count() {
        let store = Arc::new(MemoryStore::new());
        store.insert(reading("a", ts(14, 23, 59), 100.0, "Storm")).await.unwrap();
        store.insert(reading("a", ts(15, 0, 0), 10.0, "Clear")).await.unwrap();
        store.insert(reading("a", ts(15, 23, 59), 20.0, "Clear")).await.unwrap();
        store.insert(reading("a", ts(16, 0, 0), -100.0, "Storm")).await.unwrap();

        rollup(&store).run(day()).await;

        let s = &store.recent_summaries("a", 1).await.unwrap()[0];
        assert_eq!(s.date, day());
        assert_eq!(s.avg_temp, 15.0);
        assert_eq!(s.most_frequent_condition, "Clear");
    }

    #[tokio::test]
    async fn cities_without_data_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        store.insert(reading("b", ts(15, 12, 0), 25.0, "Clear")).await.unwrap();

        let report = rollup(&store).run(day()).await;

        assert_eq!(report.written, vec!["b".to_string()]);
        assert_eq!(report.skipped, vec!["a".to_string(), "c".to_string()]);
        assert!(report.failed.is_empty());
        assert!(store.recent_summaries("a", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rerunning_a_day_keeps_one_summary() {
        let store = Arc::new(MemoryStore::new());
        store.insert(reading("a", ts(15, 6, 0), 12.0, "Mist")).await.unwrap();
        store.insert(reading("a", ts(15, 18, 0), 16.0, "Mist")).await.unwrap();

        let rollup = rollup(&store);
        rollup.run(day()).await;
        rollup.run(day()).await;

        let summaries = store.recent_summaries("a", 10).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].avg_temp, 14.0);
        assert_eq!(store.summary_count().await, 1);
    }

    #[tokio::test]
    async fn previous_day_is_derived_from_now() {
        let store = Arc::new(MemoryStore::new());
        store.insert(reading("a", ts(15, 9, 0), 9.0, "Clear")).await.unwrap();

        let report = rollup(&store).run_previous_day(ts(16, 0, 1)).await;
        assert_eq!(report.date, day());
        assert_eq!(report.written, vec!["a".to_string()]);
    }

    /// Reading store that fails for one city.
    #[derive(Debug)]
    struct FlakyReadings {
        inner: MemoryStore,
        broken_city: &'static str,
    }

    #[async_trait]
    impl ReadingStore for FlakyReadings {
        async fn insert(&self, reading: Reading) -> Result<()> {
            self.inner.insert(reading).await
        }

        async fn find_range(&self, city_id: &str, range: TimeRange) -> Result<Vec<Reading>> {
            if city_id == self.broken_city {
                return Err(Error::Io(std::io::Error::other("connection reset")));
            }
            self.inner.find_range(city_id, range).await
        }

        async fn latest_reading(&self, city_id: &str) -> Result<Option<Reading>> {
            self.inner.latest_reading(city_id).await
        }

        async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
            self.inner.prune_before(cutoff).await
        }
    }

    #[tokio::test]
    async fn a_failing_city_does_not_stop_the_others() {
        let readings = Arc::new(FlakyReadings { inner: MemoryStore::new(), broken_city: "b" });
        for id in ["a", "b", "c"] {
            readings.insert(reading(id, ts(15, 10, 0), 20.0, "Clear")).await.unwrap();
        }
        let summaries = Arc::new(MemoryStore::new());

        let report = DailyRollup::new(cities(), readings, summaries.clone()).run(day()).await;

        assert_eq!(report.written, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(report.failed, vec!["b".to_string()]);
        assert_eq!(summaries.summary_count().await, 2);
        assert!(summaries.recent_summaries("b", 1).await.unwrap().is_empty());
    }
}
