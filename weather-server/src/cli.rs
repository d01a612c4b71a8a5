use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Text};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::info;
use weather_core::{
    Config, WeatherClient,
    config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS},
};
use weather_server::{create_app, run_server};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-server", version, about = "Current weather HTTP service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to listen on; overrides config and WEATHER_SERVER_ADDR.
        #[arg(short, long)]
        addr: Option<SocketAddr>,

        /// Read configuration from this file instead of the default location.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Store OpenWeather credentials and settings interactively.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { addr, config } => serve(addr, config).await,
            Command::Configure => configure(),
        }
    }
}

async fn serve(addr: Option<SocketAddr>, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    }
    .with_env_overrides()?;

    let client = WeatherClient::new(config.client_settings())
        .context("Refusing to start with an unusable OpenWeather configuration")?;
    info!(endpoint = %client.endpoint(), "Using OpenWeather provider");

    let addr = addr.unwrap_or_else(|| config.server_addr());
    run_server(create_app(Arc::new(client)), addr).await
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    let current_url = config.openweather.base_url.clone();
    let base_url = Text::new("Base URL:")
        .with_default(current_url.as_deref().unwrap_or(DEFAULT_BASE_URL))
        .prompt()?;

    let timeout_ms = CustomType::<u64>::new("Request timeout (ms):")
        .with_default(config.openweather.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
        .with_error_message("Please enter a whole number of milliseconds")
        .prompt()?;

    config.openweather.api_key = Some(api_key.trim().to_string());
    config.openweather.base_url = Some(base_url.trim().to_string());
    config.openweather.timeout_ms = Some(timeout_ms);

    WeatherClient::new(config.client_settings()).context("Configuration not saved")?;

    let path = config.save()?;
    println!("Saved configuration to {}", path.display());

    Ok(())
}
