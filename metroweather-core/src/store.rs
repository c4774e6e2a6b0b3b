//! Persistence seams for raw readings and daily summaries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use crate::{
    error::Result,
    model::{DailySummary, Reading},
};

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// A span of time whose start is always inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub end_inclusive: bool,
}

impl TimeRange {
    /// `[start, end]`
    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end, end_inclusive: true }
    }

    /// `[start, end)`
    pub fn half_open(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end, end_inclusive: false }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && if self.end_inclusive { t <= self.end } else { t < self.end }
    }
}

/// Append-only store of raw readings.
#[async_trait]
pub trait ReadingStore: Send + Sync + Debug {
    async fn insert(&self, reading: Reading) -> Result<()>;

    /// Readings for `city_id` inside `range`, ordered by timestamp ascending.
    async fn find_range(&self, city_id: &str, range: TimeRange) -> Result<Vec<Reading>>;

    /// The most recent reading for `city_id`, if any.
    async fn latest_reading(&self, city_id: &str) -> Result<Option<Reading>>;

    /// Delete readings older than `cutoff`; returns how many were removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Store of daily summaries, unique per `(city_id, date)`.
#[async_trait]
pub trait SummaryStore: Send + Sync + Debug {
    /// Insert or replace the summary with the same `(city_id, date)`.
    async fn upsert(&self, summary: DailySummary) -> Result<()>;

    /// Up to `limit` summaries for `city_id`, newest date first.
    async fn recent_summaries(&self, city_id: &str, limit: usize) -> Result<Vec<DailySummary>>;
}
