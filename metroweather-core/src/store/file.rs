use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{debug, warn};

use crate::{
    error::Result,
    model::{DailySummary, Reading},
};

use super::{MemoryStore, ReadingStore, SummaryStore, TimeRange};

const READINGS_FILE: &str = "readings.jsonl";
const SUMMARIES_FILE: &str = "summaries.json";

/// Store persisted as JSON files in a data directory.
///
/// Readings are appended to `readings.jsonl`, one JSON object per line.
/// Summaries live in `summaries.json` and the whole file is rewritten on upsert.
/// Queries are answered from an in-memory copy loaded at open.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    cache: MemoryStore,
    // Serializes file writes so appends and rewrites never interleave.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let (readings, torn_tail) = load_readings(&dir.join(READINGS_FILE)).await?;
        let summaries = load_summaries(&dir.join(SUMMARIES_FILE)).await?;
        debug!(
            dir = %dir.display(),
            readings = readings.len(),
            summaries = summaries.len(),
            "opened JSON store"
        );

        // Appends after a line without its newline would be glued onto it.
        if torn_tail {
            warn!(dir = %dir.display(), "rewriting readings file with a torn final line");
            write_readings(&dir, &readings).await?;
        }

        Ok(Self {
            dir,
            cache: MemoryStore::from_parts(readings, summaries),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

async fn write_readings(dir: &Path, readings: &[Reading]) -> Result<()> {
    let mut out = String::new();
    for reading in readings {
        out.push_str(&serde_json::to_string(reading)?);
        out.push('\n');
    }
    write_atomic(&dir.join(READINGS_FILE), out.as_bytes()).await
}

/// Parsed readings, and whether the file ends without a newline.
async fn load_readings(path: &Path) -> Result<(Vec<Reading>, bool)> {
    if !fs::try_exists(path).await? {
        return Ok((Vec::new(), false));
    }
    let contents = fs::read_to_string(path).await?;
    let torn_tail = !contents.is_empty() && !contents.ends_with('\n');
    let mut readings = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(reading) => readings.push(reading),
            Err(e) => warn!(path = %path.display(), line = lineno + 1, error = %e, "skipping bad reading line"),
        }
    }
    Ok((readings, torn_tail))
}

async fn load_summaries(path: &Path) -> Result<Vec<DailySummary>> {
    if !fs::try_exists(path).await? {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).await?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl ReadingStore for JsonFileStore {
    async fn insert(&self, reading: Reading) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut line = serde_json::to_string(&reading)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(READINGS_FILE))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.cache.insert(reading).await
    }

    async fn find_range(&self, city_id: &str, range: TimeRange) -> Result<Vec<Reading>> {
        self.cache.find_range(city_id, range).await
    }

    async fn latest_reading(&self, city_id: &str) -> Result<Option<Reading>> {
        self.cache.latest_reading(city_id).await
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let all = self.cache.all_readings().await;
        let kept: Vec<Reading> = all.iter().filter(|r| r.dt >= cutoff).cloned().collect();
        let removed = all.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        // File first, cache second.
        write_readings(&self.dir, &kept).await?;
        self.cache.prune_before(cutoff).await
    }
}

#[async_trait]
impl SummaryStore for JsonFileStore {
    async fn upsert(&self, summary: DailySummary) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut all = self.cache.all_summaries().await;
        all.retain(|s| s.key() != summary.key());
        all.push(summary.clone());

        let json = serde_json::to_vec_pretty(&all)?;
        write_atomic(&self.dir.join(SUMMARIES_FILE), &json).await?;
        self.cache.upsert(summary).await
    }

    async fn recent_summaries(&self, city_id: &str, limit: usize) -> Result<Vec<DailySummary>> {
        self.cache.recent_summaries(city_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::tests::{reading, summary};
    use chrono::{NaiveDate, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn readings_and_summaries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.insert(reading("a", at(8), 20.0, "Rain")).await.unwrap();
            store.insert(reading("a", at(9), 21.0, "Rain")).await.unwrap();
            store.upsert(summary("a", day, 10.0)).await.unwrap();
            store.upsert(summary("a", day, 11.0)).await.unwrap();
        }

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let found = store.find_range("a", TimeRange::closed(at(0), at(23))).await.unwrap();
        assert_eq!(found.len(), 2);

        let summaries = store.recent_summaries("a", 5).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].avg_temp, 11.0);
    }

    #[tokio::test]
    async fn prune_rewrites_reading_file() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.insert(reading("a", at(1), 1.0, "Clear")).await.unwrap();
            store.insert(reading("a", at(10), 2.0, "Clear")).await.unwrap();
            assert_eq!(store.prune_before(at(5)).await.unwrap(), 1);
        }

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let latest = store.latest_reading("a").await.unwrap().expect("one left");
        assert_eq!(latest.dt, at(10));
        assert_eq!(store.find_range("a", TimeRange::closed(at(0), at(23))).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn torn_reading_line_is_skipped_and_later_inserts_survive() {
        let dir = tempfile::tempdir().unwrap();
        let good = serde_json::to_string(&reading("a", at(3), 5.0, "Clear")).unwrap();
        std::fs::write(dir.path().join(READINGS_FILE), format!("{good}\n{{\"city\": \"tr")).unwrap();

        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            assert!(store.latest_reading("a").await.unwrap().is_some());
            store.insert(reading("a", at(4), 6.0, "Clear")).await.unwrap();
        }

        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let found = store.find_range("a", TimeRange::closed(at(0), at(23))).await.unwrap();
        let temps: Vec<f64> = found.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![5.0, 6.0]);
    }

    #[tokio::test]
    async fn failed_summary_write_leaves_reads_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.upsert(summary("a", day, 10.0)).await.unwrap();

        // A directory where the temp file should go makes the rewrite fail.
        std::fs::create_dir(dir.path().join("summaries.tmp")).unwrap();

        assert!(store.upsert(summary("a", day, 99.0)).await.is_err());
        assert!(store.upsert(summary("b", day, 1.0)).await.is_err());

        let a = store.recent_summaries("a", 5).await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].avg_temp, 10.0);
        assert!(store.recent_summaries("b", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_prune_keeps_readings_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        store.insert(reading("a", at(1), 1.0, "Clear")).await.unwrap();
        store.insert(reading("a", at(10), 2.0, "Clear")).await.unwrap();

        std::fs::create_dir(dir.path().join("readings.tmp")).unwrap();

        assert!(store.prune_before(at(5)).await.is_err());
        assert_eq!(store.find_range("a", TimeRange::closed(at(0), at(23))).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn corrupt_summary_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SUMMARIES_FILE), "not json").unwrap();

        let err = JsonFileStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, crate::Error::Json(_)));
    }
}
