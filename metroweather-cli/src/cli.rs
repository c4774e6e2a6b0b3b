use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode};
use metroweather_core::{
    Config, DailyRollup, Error, History, Ingestor, JsonFileStore, OpenWeatherProvider, Scheduler,
    WeatherQuery,
};
use tracing::info;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "metroweather", version, about = "Metro city weather poller")]
pub struct Cli {
    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the OpenWeather API key and polling interval.
    Configure,

    /// Fetch and store one reading per tracked city (or just one city).
    Fetch {
        #[arg(long)]
        city: Option<String>,
    },

    /// Show the latest stored reading(s).
    Current {
        /// City id; all tracked cities if absent.
        #[arg(long)]
        city: Option<String>,
    },

    /// Show hourly buckets or daily summaries for a city.
    History {
        #[arg(long)]
        city: Option<String>,

        /// Lookback window in hours.
        #[arg(long)]
        hours: Option<u32>,

        /// Number of most recent daily summaries.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Compute daily summaries for a date (default: yesterday, UTC).
    Rollup {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Poll on the configured interval and roll up daily until Ctrl-C.
    Run,
}

struct App {
    config: Config,
    store: Arc<JsonFileStore>,
}

impl App {
    async fn open() -> Result<Self> {
        let config = Config::load()?;
        let dir = config.data_dir()?;
        let store = JsonFileStore::open(&dir)
            .await
            .with_context(|| format!("Failed to open data directory: {}", dir.display()))?;
        Ok(Self { config, store: Arc::new(store) })
    }

    fn ingestor(&self) -> Result<Ingestor> {
        self.config.validate()?;
        let provider = OpenWeatherProvider::from_config(&self.config)?;
        Ok(Ingestor::new(self.config.cities.clone(), Arc::new(provider), self.store.clone()))
    }

    fn rollup(&self) -> DailyRollup {
        DailyRollup::new(self.config.cities.clone(), self.store.clone(), self.store.clone())
    }

    fn query(&self) -> WeatherQuery {
        WeatherQuery::new(self.config.cities.clone(), self.store.clone(), self.store.clone())
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let json = self.json;

        match self.command {
            Command::Configure => configure()?,
            Command::Fetch { city } => {
                let app = App::open().await?;
                let ingestor = app.ingestor()?;
                match city {
                    Some(id) => {
                        let reading = ingestor.ingest_city(&id).await?;
                        output::readings(std::slice::from_ref(&reading), json)?;
                    }
                    None => {
                        let report = ingestor.ingest_all().await;
                        output::ingest_report(&report, json)?;
                        if !report.is_complete() {
                            return Err(anyhow!(
                                "{} of {} cities failed to refresh",
                                report.failures.len(),
                                ingestor.cities().len()
                            ));
                        }
                    }
                }
            }
            Command::Current { city } => {
                let app = App::open().await?;
                let current = app.query().current(city.as_deref()).await.map_err(client_hint)?;
                output::current(&current, json)?;
            }
            Command::History { city, hours, days } => {
                let app = App::open().await?;
                let history = app
                    .query()
                    .history(city.as_deref(), hours, days)
                    .await
                    .map_err(client_hint)?;
                match &history {
                    History::Hourly(buckets) => output::hourly(buckets, json)?,
                    History::Daily(summaries) => output::daily(summaries, json)?,
                }
            }
            Command::Rollup { date } => {
                let app = App::open().await?;
                let date = date.unwrap_or_else(|| Utc::now().date_naive() - Duration::days(1));
                let report = app.rollup().run(date).await;
                output::rollup_report(&report, json)?;
            }
            Command::Run => {
                let app = App::open().await?;
                let scheduler = Scheduler::from_config(
                    &app.config,
                    app.ingestor()?,
                    app.rollup(),
                    app.store.clone(),
                )?;
                info!(data_dir = %app.store.dir().display(), "starting scheduler");
                scheduler
                    .run(async {
                        // If the signal handler cannot be installed, run until killed.
                        if tokio::signal::ctrl_c().await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    })
                    .await;
            }
        }

        Ok(())
    }
}

/// Turn client errors into a message that points at the flag to fix.
fn client_hint(err: Error) -> anyhow::Error {
    if !err.is_client_error() {
        return err.into();
    }
    let hint = match &err {
        Error::Validation(msg) if msg.contains("city_id") => Some("pass --city <ID>"),
        Error::Validation(msg) if msg.contains("hours or days") => {
            Some("pass --hours <N> or --days <N>")
        }
        _ => None,
    };

    match hint {
        Some(hint) => anyhow!("{err}\nHint: {hint}."),
        None => err.into(),
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.api_key = api_key.trim().to_string();
    }

    config.interval_minutes = CustomType::<u64>::new("Polling interval (minutes):")
        .with_default(config.interval_minutes)
        .with_error_message("Please enter a whole number of minutes")
        .prompt()
        .context("Failed to read polling interval")?;

    config.validate()?;
    config.save()?;

    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}
