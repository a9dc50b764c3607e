use anyhow::Result;
use clap::{Parser, Subcommand};

use avatar_core::{Config, PublisherConfig};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "avatard", version, about = "Weather avatar daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the polling loop until interrupted.
    Run,

    /// Store the weather API key and publisher credentials.
    Configure,

    /// Execute a single fetch-and-render cycle without publishing.
    Once,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Run => crate::runtime::run_daemon().await,
            Command::Configure => configure(),
            Command::Once => crate::runtime::run_once().await,
        }
    }
}

/// Interactive credential entry, persisted to the TOML config file.
/// Secrets are prompted without echo and never logged.
fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .prompt()?;
    if !api_key.is_empty() {
        config.api_key = api_key;
    }

    let with_publisher = inquire::Confirm::new("Configure the profile service endpoint?")
        .with_default(config.publisher.is_some())
        .prompt()?;

    if with_publisher {
        let default_url = config
            .publisher
            .as_ref()
            .map(|p| p.base_url.clone())
            .unwrap_or_default();
        let base_url = inquire::Text::new("Profile service base URL:")
            .with_initial_value(&default_url)
            .prompt()?;
        let token = inquire::Password::new("Profile service token:")
            .without_confirmation()
            .prompt()?;

        config.publisher = Some(PublisherConfig { base_url, token });
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());

    Ok(())
}
