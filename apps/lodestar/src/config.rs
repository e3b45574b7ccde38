//! Static configuration
//!
//! Values are layered in this order (later wins):
//! 1. Built-in defaults ([`Config::default`])
//! 2. Optional config file (`lodestar.toml`/`.yaml`/`.json`, or the file named by `LODESTAR_CONFIG`)
//! 3. Environment variables prefixed with `LODESTAR__`, e.g.
//!    `LODESTAR__STORE__OPERATION_TIMEOUT_MS=2500`
//!
//! A `.env` file in the working directory is loaded first when present.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const ENV_PREFIX: &str = "LODESTAR";
const CONFIG_FILE_ENV: &str = "LODESTAR_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "lodestar";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for the `lodestar` targets when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: String,
    pub file_prefix: String,
    /// One of `daily`, `hourly`, `minutely`, `never`
    pub file_rotation: String,
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_enabled: false,
            file_directory: "./logs".to_string(),
            file_prefix: "lodestar".to_string(),
            file_rotation: "daily".to_string(),
            service_name: "lodestar".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound for a single store call (aggregate, lookup, CAS write)
    pub operation_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size used when a page is requested without `perPage`
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_per_page: 20,
            max_per_page: 500,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the optional config file and the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let file =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.store.operation_timeout_ms == 0 {
            return Err("store.operation_timeout_ms must be greater than 0".to_string());
        }
        if self.search.default_per_page == 0 {
            return Err("search.default_per_page must be greater than 0".to_string());
        }
        if self.search.max_per_page < self.search.default_per_page {
            return Err(format!(
                "search.max_per_page ({}) must not be lower than search.default_per_page ({})",
                self.search.max_per_page, self.search.default_per_page
            ));
        }
        match self.logging.file_rotation.as_str() {
            "daily" | "hourly" | "minutely" | "never" => Ok(()),
            other => Err(format!("logging.file_rotation '{}' is not supported", other)),
        }
    }
}
