//! Application configuration loaded from `config.toml` and the environment.
//!
//! Every section is optional; missing values fall back to defaults so the service
//! starts with no configuration file at all. Environment variables win over the file.

use crate::config::seed::SeedConfig;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::{fmt, io::ErrorKind, path::Path, time::Duration};
use tracing::{debug, info};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub inventory: InventoryConfig,
    pub advisor: AdvisorConfig,
    /// Initial suppliers and products, applied only to an empty database
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP API binds to
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SeaORM connection URL
    pub url: String,
    /// How many times the startup supervisor tries to reach the database
    pub connect_attempts: u32,
    /// Pause between startup attempts, in milliseconds
    pub retry_delay_ms: u64,
    /// Pool size cap; unset keeps the driver default
    pub max_connections: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/inventory.sqlite?mode=rwc".to_string(),
            connect_attempts: 3,
            retry_delay_ms: 2000,
            max_connections: None,
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Deadline for a single ledger operation; unset means no deadline
    pub operation_timeout_ms: Option<u64>,
}

impl LedgerConfig {
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Products with stock strictly below this value count as low stock
    pub low_stock_threshold: i64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10,
        }
    }
}

/// Hosted text generation over an OpenAI-compatible chat-completions API.
/// Generation is enabled only when an API key is present.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Deadline for one generation request, in milliseconds
    pub timeout_ms: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            model: "nvidia/llama-3.3-nemotron-super-49b-v1.5".to_string(),
            api_key: None,
            timeout_ms: 30_000,
        }
    }
}

impl AdvisorConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The API key, unless it is missing or blank.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }
}

// Keeps the key out of logs
impl fmt::Debug for AdvisorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisorConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Loads configuration from a TOML file, falling back to defaults when the file is absent.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or is not valid TOML.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = match std::fs::read_to_string(path_ref) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No configuration file at {:?}, using defaults", path_ref);
            return Ok(AppConfig::default());
        }
        Err(e) => {
            return Err(Error::Config {
                message: format!("Failed to read config file {path_ref:?}: {e}"),
            });
        }
    };
    parse_config(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config file {path_ref:?}: {e}"),
    })
}

/// Parses configuration from TOML text.
///
/// # Errors
/// Returns an error if the TOML is malformed or a value has the wrong type.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: e.to_string(),
    })
}

impl AppConfig {
    /// Applies overrides from a variable lookup (the process environment in production).
    ///
    /// # Errors
    /// Returns an error if a numeric override cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(addr) = lookup("BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Some(raw) = lookup("LEDGER_TIMEOUT_MS") {
            self.ledger.operation_timeout_ms = Some(parse_number("LEDGER_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = lookup("LOW_STOCK_THRESHOLD") {
            self.inventory.low_stock_threshold = parse_number("LOW_STOCK_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = Some(parse_number("DATABASE_MAX_CONNECTIONS", &raw)?);
        }
        if let Some(key) = lookup("NVIDIA_API_KEY") {
            self.advisor.api_key = Some(key);
        }
        if let Some(url) = lookup("ADVISOR_BASE_URL") {
            self.advisor.base_url = url;
        }
        if let Some(model) = lookup("ADVISOR_MODEL") {
            self.advisor.model = model;
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| Error::Config {
        message: format!("{name} must be a number, got {raw:?}"),
    })
}

/// Loads the full application configuration: file (from `INVENTORY_CONFIG` or
/// `./config.toml`) and then environment overrides.
///
/// # Errors
/// Returns an error if the file is malformed or an override is invalid.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path =
        std::env::var("INVENTORY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = load_config(&path)?;
    config.apply_overrides(|key| std::env::var(key).ok())?;
    info!(
        bind_address = %config.server.bind_address,
        low_stock_threshold = config.inventory.low_stock_threshold,
        text_generation = config.advisor.api_key().is_some(),
        "Configuration loaded"
    );
    Ok(config)
}
