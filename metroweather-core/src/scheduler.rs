//! Periodic driver for ingestion, the daily rollup and reading retention.

use std::{future::Future, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    config::{Config, MAX_INTERVAL_MINUTES},
    ingest::Ingestor,
    rollup::DailyRollup,
    store::ReadingStore,
};

#[derive(Debug, Clone)]
pub struct Scheduler {
    ingestor: Ingestor,
    rollup: DailyRollup,
    readings: Arc<dyn ReadingStore>,
    interval: StdDuration,
    rollup_at: NaiveTime,
    retention_days: u32,
}

/// First instant strictly after `now` whose UTC time of day is `at`.
pub fn next_rollup_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now { today } else { today + Duration::days(1) }
}

impl Scheduler {
    pub fn new(
        ingestor: Ingestor,
        rollup: DailyRollup,
        readings: Arc<dyn ReadingStore>,
        interval: StdDuration,
        rollup_at: NaiveTime,
        retention_days: u32,
    ) -> Self {
        Self { ingestor, rollup, readings, interval, rollup_at, retention_days }
    }

    pub fn from_config(
        config: &Config,
        ingestor: Ingestor,
        rollup: DailyRollup,
        readings: Arc<dyn ReadingStore>,
    ) -> anyhow::Result<Self> {
        let minutes = config.interval_minutes.clamp(1, MAX_INTERVAL_MINUTES);
        Ok(Self::new(
            ingestor,
            rollup,
            readings,
            StdDuration::from_secs(minutes.saturating_mul(60)),
            config.rollup_time()?,
            config.retention_days,
        ))
    }

    /// Run until `shutdown` resolves. Ingests immediately, then every interval.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut next_rollup = next_rollup_after(Utc::now(), self.rollup_at);
        info!(
            interval_secs = self.interval.as_secs(),
            next_rollup = %next_rollup,
            cities = self.ingestor.cities().len(),
            "scheduler started"
        );

        loop {
            let rollup_sleep = tokio::time::sleep_until(instant_for(next_rollup));

            tokio::select! {
                _ = &mut shutdown => {
                    info!("scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.ingestor.ingest_all().await;
                    if !report.is_complete() {
                        warn!(failed = report.failures.len(), "some cities were not refreshed");
                    }
                }
                _ = rollup_sleep => {
                    let now = Utc::now();
                    self.daily(now).await;
                    next_rollup = next_rollup_after(now, self.rollup_at);
                }
            }
        }
    }

    /// Yesterday's rollup followed by retention pruning.
    pub async fn daily(&self, now: DateTime<Utc>) {
        let report = self.rollup.run_previous_day(now).await;
        info!(
            written = report.written.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "daily rollup finished"
        );

        if self.retention_days == 0 {
            return;
        }
        let cutoff = now - Duration::days(i64::from(self.retention_days));
        match self.readings.prune_before(cutoff).await {
            Ok(removed) => info!(removed, %cutoff, "pruned old readings"),
            Err(e) => warn!(error = %e, "pruning old readings failed"),
        }
    }
}

fn instant_for(at: DateTime<Utc>) -> Instant {
    let wait = (at - Utc::now()).to_std().unwrap_or_default();
    Instant::now() + wait
}
