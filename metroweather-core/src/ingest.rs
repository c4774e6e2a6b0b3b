//! Polls the provider for every tracked city and stores the readings.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{error, info};

use crate::{
    error::{Error, Result},
    model::{City, Reading},
    provider::WeatherProvider,
    store::ReadingStore,
};

/// Per-city outcome of one ingestion pass.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub stored: Vec<Reading>,
    pub failures: Vec<(String, Error)>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Ingestor {
    cities: Vec<City>,
    provider: Arc<dyn WeatherProvider>,
    readings: Arc<dyn ReadingStore>,
}

impl Ingestor {
    pub fn new(
        cities: Vec<City>,
        provider: Arc<dyn WeatherProvider>,
        readings: Arc<dyn ReadingStore>,
    ) -> Self {
        Self { cities, provider, readings }
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// Fetch all cities concurrently. One city failing never discards the
    /// others' readings; failures are collected in the report.
    pub async fn ingest_all(&self) -> IngestReport {
        let results = join_all(self.cities.iter().map(|city| self.fetch_and_store(city))).await;

        let mut report = IngestReport::default();
        for (city, result) in self.cities.iter().zip(results) {
            match result {
                Ok(reading) => report.stored.push(reading),
                Err(e) => {
                    error!(city = %city.name, error = %e, "ingestion failed");
                    report.failures.push((city.id.clone(), e));
                }
            }
        }

        info!(
            stored = report.stored.len(),
            failed = report.failures.len(),
            "ingestion pass finished"
        );
        report
    }

    /// Refresh a single tracked city.
    pub async fn ingest_city(&self, city_id: &str) -> Result<Reading> {
        if city_id.trim().is_empty() {
            return Err(Error::validation("city_id is required"));
        }
        let city = self
            .cities
            .iter()
            .find(|c| c.id == city_id)
            .ok_or_else(|| Error::validation(format!("city {city_id} is not tracked")))?;

        self.fetch_and_store(city).await
    }

    async fn fetch_and_store(&self, city: &City) -> Result<Reading> {
        let reading = self.provider.fetch(city).await?;
        self.readings.insert(reading.clone()).await?;
        Ok(reading)
    }
}
