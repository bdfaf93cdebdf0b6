use std::{fmt, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode, Select, Text};
use weather_core::{
    City, Config, FileStore, ProviderId, StateCoordinator, weather_client_from_config,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather for Beijing, Shanghai and Shenzhen")]
pub struct Cli {
    /// Serve fixed offline observations instead of calling the provider.
    #[arg(long, global = true)]
    pub mock: bool,

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

    /// Show current weather, optionally switching city first.
    Show {
        /// City identifier: beijing, shanghai or shenzhen.
        /// Defaults to the last selected city.
        city: Option<String>,
    },

    /// Pick cities from a menu and watch the weather update.
    Interactive,

    /// List supported city identifiers.
    Cities,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { city } => show(self.mock, city.as_deref()).await,
            Command::Interactive => interactive(self.mock).await,
            Command::Cities => {
                for city in City::all() {
                    println!("{city}");
                }
                Ok(())
            }
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if config.is_provider_configured(id) {
        println!("{id} already has an API key; the one you enter replaces it.");
    }

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let base_url = Text::new("Custom base URL (leave empty for the public endpoint):")
        .with_default(config.provider_base_url(id).unwrap_or_default())
        .prompt()
        .context("Failed to read base URL")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.set_provider_base_url(id, Some(base_url.trim().to_string()));

    if config.default_provider_id().ok() != Some(id) {
        let make_default = Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(false)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    config.save()?;
    println!(
        "Saved configuration for {id} to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

fn build_coordinator(mock: bool) -> anyhow::Result<StateCoordinator> {
    let mut config = Config::load()?;
    config.apply_env_overrides();
    if mock {
        config.mock_data = true;
    }

    let client = weather_client_from_config(&config)?;
    let store = FileStore::new(Config::state_file_path()?);

    Ok(StateCoordinator::new(Arc::new(client), Arc::new(store)))
}

async fn show(mock: bool, city: Option<&str>) -> anyhow::Result<()> {
    let city = city.map(str::parse::<City>).transpose()?;
    let coordinator = build_coordinator(mock)?;

    if let Some(city) = city {
        coordinator.select_city(city);
    }

    let state = coordinator.settled().await;
    print!("{}", render::card(&state));

    match state.error {
        Some(error) => anyhow::bail!(error),
        None => Ok(()),
    }
}

enum MenuItem {
    City(City),
    Retry,
    Quit,
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuItem::City(city) => write!(f, "{city}"),
            MenuItem::Retry => f.write_str("retry"),
            MenuItem::Quit => f.write_str("quit"),
        }
    }
}

async fn interactive(mock: bool) -> anyhow::Result<()> {
    let coordinator = build_coordinator(mock)?;
    let _subscription = coordinator.subscribe(|state| {
        println!("{}", render::status_line(state));
    });

    loop {
        let state = coordinator.settled().await;
        println!();
        print!("{}", render::card(&state));

        let mut items: Vec<MenuItem> = City::all().iter().copied().map(MenuItem::City).collect();
        items.push(MenuItem::Retry);
        items.push(MenuItem::Quit);
        let cursor = City::all()
            .iter()
            .position(|city| *city == state.current_city)
            .unwrap_or(0);

        // inquire blocks the calling thread.
        let choice = tokio::task::spawn_blocking(move || {
            Select::new("City:", items).with_starting_cursor(cursor).prompt()
        })
        .await
        .context("Menu task failed")?
        .context("Failed to read selection")?;

        match choice {
            MenuItem::City(city) => coordinator.select_city(city),
            MenuItem::Retry => coordinator.retry(),
            MenuItem::Quit => return Ok(()),
        }
    }
}
