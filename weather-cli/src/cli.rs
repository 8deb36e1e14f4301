use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode};
use weather_core::{
    Config, Ingestor, JsonFileStore, ProviderId, QueryEngine, SystemClock, WeatherProvider,
    provider::{default_provider_from_config, provider_from_config, provider_with_key},
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather logger and analyzer")]
pub struct Cli {
    /// Observation log to use instead of the configured one.
    #[arg(long, global = true, value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// API key, overriding the configured one.
    #[arg(long, global = true, env = "WEATHER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Provider short name; defaults to the configured default provider.
    #[arg(long, global = true)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,
    },

    /// Fetch current weather for locations and log it.
    Fetch {
        /// Location names; comma-separated lists are accepted too.
        #[arg(required = true, num_args = 1..)]
        locations: Vec<String>,
    },

    /// Show all logged observations, newest first.
    Logs,

    /// Show the average temperature per location.
    Averages,

    /// Show the hottest and coldest observations.
    Extremes {
        /// Only consider the last N hours.
        #[arg(long, value_name = "N", conflicts_with = "last_24h")]
        window_hours: Option<u32>,

        /// Only consider the last 24 hours.
        #[arg(long)]
        last_24h: bool,
    },

    /// Show the temperature trend for one location.
    Trend {
        /// Location name (case-insensitive).
        location: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match &self.command {
            Command::Configure { provider } => configure(config, provider),
            Command::Fetch { locations } => {
                let provider = self.resolve_provider(&config)?;
                let store = self.store(&config)?;
                let clock = SystemClock;

                let locations = split_locations(locations);
                println!("Fetching weather data for {} location(s)...", locations.len());

                let result = Ingestor::new(&*provider, &store, &clock)
                    .with_policy(config.dedup_policy())
                    .with_limits(config.fetch_limits())
                    .fetch_and_log(locations.as_slice())
                    .await;

                match result {
                    Ok(report) => {
                        print!("{}", render::ingest_report(&report));
                        Ok(())
                    }
                    Err(err) => {
                        print!("{}", render::ingest_report(&err.report));
                        Err(err).with_context(|| {
                            format!("Failed to log weather to {}", store.path().display())
                        })
                    }
                }
            }
            Command::Logs => {
                let store = self.store(&config)?;
                let logs = QueryEngine::new(&store, &SystemClock).all_sorted_desc()?;

                if logs.is_empty() {
                    println!("No weather data logged yet.");
                } else {
                    print!("{}", render::logs_table(&logs));
                }
                Ok(())
            }
            Command::Averages => {
                let store = self.store(&config)?;
                let averages = QueryEngine::new(&store, &SystemClock).average_by_location()?;

                if averages.is_empty() {
                    println!("No data available for temperature averages.");
                } else {
                    print!("{}", render::averages(&averages));
                }
                Ok(())
            }
            Command::Extremes { window_hours, last_24h } => {
                let hours = if *last_24h { Some(24) } else { *window_hours };
                let window = hours.map(|h| chrono::Duration::hours(i64::from(h)));

                let store = self.store(&config)?;
                match QueryEngine::new(&store, &SystemClock).extremes(window)? {
                    Some(extremes) => print!("{}", render::extremes(&extremes, hours)),
                    None => match hours {
                        Some(h) => println!("No data available for the last {h} hours."),
                        None => println!("No data available."),
                    },
                }
                Ok(())
            }
            Command::Trend { location } => {
                let store = self.store(&config)?;
                let series = QueryEngine::new(&store, &SystemClock).series_for_location(location)?;

                if series.is_empty() {
                    println!("No data found for location: {location}");
                } else {
                    print!("{}", render::trend(&series));
                }
                Ok(())
            }
        }
    }

    fn store(&self, config: &Config) -> anyhow::Result<JsonFileStore> {
        let path = match &self.data_file {
            Some(path) => path.clone(),
            None => config.data_file_path()?,
        };
        Ok(JsonFileStore::new(path))
    }

    /// Pick the provider from `--provider`, then the config default, then OpenWeather.
    fn resolve_provider(&self, config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
        let id = match (&self.provider, &self.api_key) {
            (None, None) => return default_provider_from_config(config),
            (Some(name), _) => ProviderId::try_from(name.as_str())?,
            (None, Some(_)) if config.default_provider.is_none() => ProviderId::OpenWeather,
            (None, Some(_)) => config.default_provider_id()?,
        };

        match &self.api_key {
            Some(key) => provider_with_key(id, key.clone()),
            None => provider_from_config(id, config),
        }
    }
}

fn configure(mut config: Config, provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.trim().to_string());

    if config.default_provider_id().ok() != Some(id) {
        let make_default = Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(true)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    config.save()?;
    println!("Saved credentials for {id} to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Flatten `["Paris, London", "Rome"]` into individual names.
fn split_locations(args: &[String]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
