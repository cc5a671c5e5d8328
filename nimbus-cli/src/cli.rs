use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use nimbus_core::{
    Config, Fetcher, HttpTransport, ProviderId, WeatherConditions, WeatherEvent, WeatherProvider,
    provider::{default_provider_from_config, provider_from_config},
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::display::{DisplayUnits, render};

/// How long to wait for a provider before giving up.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "nimbus", version, about = "Current weather conditions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials and location for a specific provider.
    Configure {
        /// Provider short name, e.g. "wunderground" or "openweather".
        provider: String,
    },

    /// Show current conditions.
    Show {
        /// Provider to ask instead of the configured default.
        #[arg(long)]
        provider: Option<String>,

        /// Location to use instead of the configured one.
        #[arg(long)]
        location: Option<String>,

        /// Units to display values in.
        #[arg(long, value_enum, default_value_t = DisplayUnits::Metric)]
        units: DisplayUnits,

        /// Print the canonical SI model as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Suggest location names matching a query.
    Locate {
        query: String,

        #[arg(long)]
        provider: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show {
                provider,
                location,
                units,
                json,
            } => {
                let mut config = Config::load()?;
                if let Some(location) = location {
                    config.set_location(location);
                }

                let conditions = current_conditions(&config, provider.as_deref()).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&conditions)?);
                } else {
                    print!("{}", render(&conditions, units));
                }
                Ok(())
            }
            Command::Locate { query, provider } => {
                let config = Config::load()?;
                for name in locate(&config, provider.as_deref(), &query).await? {
                    println!("{name}");
                }
                Ok(())
            }
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let location = Text::new("Location (empty to detect automatically):")
        .with_default(config.location())
        .prompt()
        .context("Failed to read location")?;

    config.upsert_provider_api_key(id, api_key);
    config.set_location(location);
    config.save()?;

    let path = Config::config_file_path()?;
    info!(provider = %id, path = %path.display(), "configuration saved");
    Ok(())
}

/// The provider named on the command line, or the configured default.
fn select_provider(
    config: &Config,
    provider: Option<&str>,
    fetcher: &Fetcher,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    match provider {
        Some(name) => Ok(provider_from_config(
            ProviderId::try_from(name)?,
            config,
            fetcher,
        )),
        None => default_provider_from_config(config, fetcher),
    }
}

/// Why a provider refused to fetch current conditions.
fn refusal(config: &Config, id: ProviderId) -> anyhow::Error {
    if config.is_provider_configured(id) {
        anyhow!(
            "Provider '{id}' cannot fetch current conditions for location '{}'.\n\
             Hint: pass `--location` or run `nimbus configure {id}` to set one.",
            config.location()
        )
    } else {
        anyhow!(
            "Provider '{id}' has no API key configured.\n\
             Hint: run `nimbus configure {id}` and enter your API key."
        )
    }
}

async fn current_conditions(
    config: &Config,
    provider: Option<&str>,
) -> anyhow::Result<WeatherConditions> {
    let (fetcher, mut events) = Fetcher::new(Arc::new(HttpTransport::new()));
    let provider = select_provider(config, provider, &fetcher)?;
    let id = provider.id();

    if !provider.fetch_current_conditions() {
        return Err(refusal(config, id));
    }

    wait_for(&mut events, |event| match event {
        WeatherEvent::CurrentConditions(conditions) => Some(conditions),
        _ => None,
    })
    .await
    .ok_or_else(|| anyhow!("No response from provider '{id}'"))
}

async fn locate(
    config: &Config,
    provider: Option<&str>,
    query: &str,
) -> anyhow::Result<Vec<String>> {
    let (fetcher, mut events) = Fetcher::new(Arc::new(HttpTransport::new()));
    let provider = select_provider(config, provider, &fetcher)?;
    let id = provider.id();

    if !provider.fetch_location_autocomplete(query) {
        bail!("Provider '{id}' does not offer location suggestions.");
    }

    wait_for(&mut events, |event| match event {
        WeatherEvent::LocationAutocomplete(names) => Some(names),
        _ => None,
    })
    .await
    .ok_or_else(|| anyhow!("No response from provider '{id}'"))
}

/// First event `pick` accepts, or `None` if nothing arrives in time.
///
/// A failed request never produces an event, so the timeout is what ends
/// the wait in that case.
async fn wait_for<T>(
    events: &mut UnboundedReceiver<WeatherEvent>,
    mut pick: impl FnMut(WeatherEvent) -> Option<T>,
) -> Option<T> {
    tokio::time::timeout(RESPONSE_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            if let Some(value) = pick(event) {
                return Some(value);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
