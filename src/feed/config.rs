use std::env;
use std::fs;
use std::time::Duration;

use dotenvy::dotenv;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{config_error, Error, HoursResult};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

fn default_refresh_interval() -> u64 {
    60
}

fn default_bind_address() -> String {
    "127.0.0.1:7878".to_string()
}

/// Service configuration, read from a JSON file with environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Full URL of the management API hours endpoint
    #[serde(default)]
    pub url: String,
    /// Sent as `X-API-Key`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Config {
    pub fn from_config(config: String) -> HoursResult<Self> {
        serde_json::from_str(&config)
            .map_err(|err| Error::Config(format!("Could not deserialize.\n{}", err)))
    }

    /// Loads `.env`, then the file named by `HOURS_CONFIG` (default
    /// `config.json`), then applies `HOURS_API_URL` and `HOURS_API_KEY`.
    pub fn load() -> HoursResult<Self> {
        dotenv().ok();

        let path = env::var("HOURS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = match fs::read_to_string(&path) {
            Ok(content) => Self::from_config(content)?,
            Err(err) => {
                info!(%path, %err, "no config file, using environment only");
                Self::from_config("{}".to_string())?
            }
        };

        if let Ok(url) = env::var("HOURS_API_URL") {
            config.url = url;
        }
        if let Ok(key) = env::var("HOURS_API_KEY") {
            config.api_key = Some(key);
        }

        config.validate()?;
        if config.api_key.is_none() {
            warn!("HOURS_API_KEY is not set, hours feed requests will be unauthenticated");
        }
        Ok(config)
    }

    pub fn validate(&self) -> HoursResult<()> {
        if self.url.is_empty() {
            return Err(config_error("hours feed url is not set"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(config_error("refresh_interval_secs must be positive"));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
