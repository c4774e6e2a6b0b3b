use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::model::City;

pub const DEFAULT_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// One week.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// interval_minutes = 5
///
/// [[cities]]
/// id = "1273294"
/// name = "Delhi"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    /// Unit system passed to the provider, e.g. "metric".
    pub units: String,
    /// Minutes between two ingestion passes.
    pub interval_minutes: u64,
    /// UTC wall-clock time of the daily rollup, "HH:MM".
    pub rollup_at: String,
    /// Readings older than this are pruned after each rollup. 0 keeps everything.
    pub retention_days: u32,
    pub request_timeout_secs: u64,
    /// Overrides the platform data directory for the JSON store.
    pub data_dir: Option<PathBuf>,
    pub cities: Vec<City>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            units: "metric".to_string(),
            interval_minutes: 5,
            rollup_at: "00:01".to_string(),
            retention_days: 30,
            request_timeout_secs: 10,
            data_dir: None,
            cities: default_cities(),
        }
    }
}

pub fn default_cities() -> Vec<City> {
    [
        ("1273294", "Delhi"),
        ("1275339", "Mumbai"),
        ("1264527", "Chennai"),
        ("1277333", "Bengaluru"),
        ("1275004", "Kolkata"),
        ("1269843", "Hyderabad"),
    ]
    .into_iter()
    .map(|(id, name)| City::new(id, name))
    .collect()
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `OPENWEATHER_API_KEY` and `API_CALL_INTERVAL` overrides.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENWEATHER_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = key;
        }
        if let Some(interval) = lookup("API_CALL_INTERVAL") {
            self.interval_minutes = interval
                .trim()
                .parse()
                .with_context(|| format!("API_CALL_INTERVAL is not a number: {interval}"))?;
        }
        Ok(())
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "metroweather", "metroweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding the JSON reading and summary files.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    pub fn rollup_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.rollup_at, "%H:%M")
            .with_context(|| format!("rollup_at must be HH:MM, got '{}'", self.rollup_at))
    }

    /// Check the settings needed for scheduled polling.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow!(
                "No API key configured.\n\
                 Hint: run `metroweather configure` or set OPENWEATHER_API_KEY."
            ));
        }
        if !(1..=MAX_INTERVAL_MINUTES).contains(&self.interval_minutes) {
            return Err(anyhow!(
                "interval_minutes must be between 1 and {MAX_INTERVAL_MINUTES}, got {}",
                self.interval_minutes
            ));
        }
        if self.cities.is_empty() {
            return Err(anyhow!("No cities configured"));
        }
        self.rollup_time()?;
        Ok(())
    }
}
