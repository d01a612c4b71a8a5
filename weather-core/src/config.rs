use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::{Path, PathBuf},
};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));

pub const ENV_API_KEY: &str = "OPENWEATHER_API_KEY";
pub const ENV_BASE_URL: &str = "OPENWEATHER_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "OPENWEATHER_TIMEOUT_MS";
pub const ENV_ADDR: &str = "WEATHER_SERVER_ADDR";

/// Provider settings as stored on disk. Everything is optional so that a
/// partial file can be completed from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenWeatherConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: Option<SocketAddr>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [openweather]
/// api_key = "..."
/// timeout_ms = 5000
///
/// [server]
/// addr = "127.0.0.1:8080"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub openweather: OpenWeatherConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Everything `WeatherClient` needs, with defaults resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl ClientSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load config from an explicit file. A missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-server")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.openweather.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.openweather.base_url = Some(url);
        }
        if let Some(raw) = get(ENV_TIMEOUT_MS) {
            let ms = raw
                .parse::<u64>()
                .with_context(|| format!("{ENV_TIMEOUT_MS} must be a whole number, got '{raw}'"))?;
            self.openweather.timeout_ms = Some(ms);
        }
        if let Some(raw) = get(ENV_ADDR) {
            let addr = raw
                .parse::<SocketAddr>()
                .with_context(|| format!("{ENV_ADDR} must be a socket address, got '{raw}'"))?;
            self.server.addr = Some(addr);
        }

        Ok(self)
    }

    /// Resolve the client settings, filling in defaults. A missing API key
    /// becomes an empty string and is rejected when the client is built.
    pub fn client_settings(&self) -> ClientSettings {
        let ow = &self.openweather;
        ClientSettings {
            api_key: ow.api_key.clone().unwrap_or_default(),
            base_url: ow.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_ms: ow.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server.addr.unwrap_or(DEFAULT_ADDR)
    }
}
