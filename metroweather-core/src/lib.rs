//! Core library for the `metroweather` poller.
//!
//! This crate defines:
//! - Configuration loading
//! - The provider client and the reading/summary stores
//! - Hourly bucketing and the daily rollup over stored readings
//! - Ingestion, the query façade and the periodic scheduler
//!
//! It is used by `metroweather-cli`, but can also be embedded in an HTTP service.

pub mod config;
pub mod error;
pub mod hourly;
pub mod ingest;
pub mod model;
pub mod provider;
pub mod query;
pub mod rollup;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use hourly::HourlyAggregator;
pub use ingest::{IngestReport, Ingestor};
pub use model::{City, DailySummary, HourlyBucket, Reading, Wind};
pub use provider::{OpenWeatherProvider, WeatherProvider};
pub use query::{Current, History, WeatherQuery};
pub use rollup::{DailyRollup, RollupReport};
pub use scheduler::Scheduler;
pub use store::{JsonFileStore, MemoryStore, ReadingStore, SummaryStore, TimeRange};
