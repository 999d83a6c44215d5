use std::{fmt, path::PathBuf, sync::Arc};

use aemet_core::{AemetClient, ClientConfig, Municipality, MunicipalityDirectory, Settings};
use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::{Password, Select};
use tracing::{debug, warn};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "aemet", version, about = "AEMET weather data CLI tool")]
pub struct Cli {
    /// AEMET OpenData API key; overrides the stored key and AEMET_API_KEY.
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Municipality dataset in the AEMET feed format, used instead of the bundled table.
    #[arg(long, global = true, env = "AEMET_MUNICIPALITIES", value_name = "FILE")]
    pub municipalities: Option<PathBuf>,

    /// Show debug logs.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Get weather forecast for a municipality.
    #[command(visible_alias = "f")]
    Forecast {
        /// Municipality name (partial match).
        #[arg(short, long)]
        name: String,

        /// Automatically select the first match.
        #[arg(short = 'i', long)]
        non_interactive: bool,
    },

    /// Get today's weather summary for multiple cities.
    #[command(visible_alias = "d")]
    Day {
        /// City names (partial match allowed), comma separated or repeated.
        #[arg(short, long, required = true, num_args = 1.., value_delimiter = ',')]
        cities: Vec<String>,

        /// Treat cities as municipality codes instead of names.
        #[arg(long, visible_alias = "ids")]
        use_ids: bool,
    },

    /// Store the AEMET API key in the user config directory.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match &self.command {
            Command::Configure => configure(),
            Command::Forecast { name, non_interactive } => {
                let client = self.client()?;
                forecast(&client, name, *non_interactive).await
            }
            Command::Day { cities, use_ids } => {
                let client = self.client()?;
                day(&client, cities, *use_ids).await;
                Ok(())
            }
        }
    }

    fn client(&self) -> Result<AemetClient> {
        let mut config = client_config(self.api_key.as_deref(), Settings::load);
        if let Some(path) = &self.municipalities {
            let directory = MunicipalityDirectory::from_path(path).context("error loading municipalities")?;
            config = config.with_directory(Arc::new(directory));
        }

        AemetClient::new(config).context("error creating client")
    }
}

/// Key precedence: `--api-key`, stored settings, then `AEMET_API_KEY`.
///
/// Stored settings are only read when no key was passed on the command line.
/// An unreadable settings file is logged and skipped.
fn client_config(api_key: Option<&str>, load: impl FnOnce() -> Result<Settings>) -> ClientConfig {
    if let Some(key) = api_key {
        return ClientConfig::new().with_api_key(key);
    }

    match load() {
        Ok(settings) => settings.client_config(),
        Err(e) => {
            warn!("ignoring stored settings: {e:#}");
            ClientConfig::new()
        }
    }
}

fn configure() -> Result<()> {
    let mut settings = Settings::load()?;

    let key = Password::new("AEMET OpenData API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    settings.set_api_key(key.trim());
    settings.save()?;

    println!("Saved API key to {}", Settings::config_file_path()?.display());
    Ok(())
}

/// Select-prompt entry for one municipality.
struct Choice<'a>(&'a Municipality);

impl fmt::Display for Choice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0.name, self.0.id)
    }
}

async fn forecast(client: &AemetClient, name: &str, non_interactive: bool) -> Result<()> {
    let directory = client.directory()?;
    let matches = directory.find_by_partial_name(name);

    let selected = match matches.as_slice() {
        [] => bail!("no municipalities found matching '{name}'"),
        [only] => *only,
        [first, ..] if non_interactive => {
            println!(
                "Found {} municipalities matching '{name}', using first match: {}",
                matches.len(),
                first.name
            );
            *first
        }
        _ => {
            let choices: Vec<Choice<'_>> = matches.iter().map(|m| Choice(*m)).collect();
            let prompt = format!("Found {} municipalities matching '{name}':", matches.len());

            Select::new(&prompt, choices).prompt().context("invalid selection")?.0
        }
    };

    let forecast = client
        .forecast_by_id(&selected.id)
        .await
        .context("error getting weather data")?;

    println!();
    print!("{}", render::forecast(&forecast, Local::now()));
    Ok(())
}

async fn day(client: &AemetClient, cities: &[String], use_ids: bool) {
    println!("{}", render::day_heading());

    for city in cities {
        let summary = if use_ids {
            summary_by_id(client, city).await
        } else {
            summary_by_name(client, city).await
        };

        match summary {
            Ok(line) => println!("{line}"),
            Err(e) => println!("{}", failure_line(city, &e)),
        }
    }
}

/// One `day` output line for a city that could not be summarised. The whole
/// cause chain is printed on the line.
fn failure_line(city: &str, err: &anyhow::Error) -> String {
    format!("❌ {city}: {err:#}")
}

async fn summary_by_name(client: &AemetClient, name: &str) -> Result<String> {
    let directory = client.directory()?;
    let first = directory
        .find_by_partial_name(name)
        .into_iter()
        .next()
        .with_context(|| format!("no municipalities found matching '{name}'"))?;
    debug!(name, id = %first.id, "resolved municipality");

    summary_by_id(client, &first.id).await
}

async fn summary_by_id(client: &AemetClient, id: &str) -> Result<String> {
    let forecast = client.forecast_by_id(id).await.context("error getting weather data")?;
    render::day_summary(&forecast)
}
