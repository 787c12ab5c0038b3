//! Process configuration, read from the command line or the environment.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::infra::ckan::WriteMethod;
use crate::pipeline::{MAX_INTERVAL_MINUTES, Window};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Raw settings. Every option can also be given as an environment variable
/// (or in a `.env` file).
#[derive(Debug, Clone, clap::Args)]
pub struct Settings {
    /// Base URL of the NGSI-LD context broker
    #[arg(long, env = "BROKER_URL")]
    pub broker_url: Option<String>,

    /// Base URL of the CKAN instance
    #[arg(long, env = "CKAN_URL")]
    pub ckan_url: Option<String>,

    /// DataStore resource id holding the gate counts
    #[arg(long, env = "CKAN_DATASTORE_ID")]
    pub ckan_datastore: Option<String>,

    /// CKAN API key, sent as the Authorization header
    #[arg(long, env = "CKAN_API_KEY", hide_env_values = true)]
    pub ckan_api_key: Option<String>,

    /// Width of an aggregation bucket, in minutes
    #[arg(long, env = "MINUTES_TO_AGGREGATE", default_value_t = 15)]
    pub minutes_to_aggregate: i64,

    /// Method hint sent with datastore_upsert
    #[arg(long, env = "CKAN_WRITE_METHOD", value_enum, default_value_t = WriteMethod::Insert)]
    pub write_method: WriteMethod,

    /// Per-request HTTP timeout, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Deadline for a whole run, in seconds
    #[arg(long, env = "RUN_TIMEOUT_SECS", default_value_t = 600)]
    pub run_timeout_secs: u64,
}

/// Connection details for the CKAN DataStore resource.
#[derive(Clone)]
pub struct CkanConfig {
    pub url: String,
    pub datastore_id: String,
    pub api_key: String,
}

impl fmt::Debug for CkanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.api_key.chars().take(5).collect();
        f.debug_struct("CkanConfig")
            .field("url", &self.url)
            .field("datastore_id", &self.datastore_id)
            .field("api_key", &format_args!("{prefix}***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    broker_url: Option<String>,
    ckan: Option<CkanConfig>,
    pub window: Window,
    pub write_method: WriteMethod,
    pub request_timeout: Duration,
    pub run_timeout: Duration,
}

impl Config {
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let window = Window::from_minutes(settings.minutes_to_aggregate).ok_or_else(|| {
            ConfigError::Invalid {
                name: "MINUTES_TO_AGGREGATE",
                reason: format!(
                    "{} is not between 1 and {MAX_INTERVAL_MINUTES} minutes",
                    settings.minutes_to_aggregate
                ),
            }
        })?;

        let ckan = match (settings.ckan_url, settings.ckan_datastore, settings.ckan_api_key) {
            (None, None, None) => None,
            (Some(url), Some(datastore_id), Some(api_key)) => Some(CkanConfig {
                url,
                datastore_id,
                api_key,
            }),
            (url, datastore_id, _) => {
                let missing = if url.is_none() {
                    "CKAN_URL"
                } else if datastore_id.is_none() {
                    "CKAN_DATASTORE_ID"
                } else {
                    "CKAN_API_KEY"
                };
                return Err(ConfigError::Missing(missing));
            }
        };

        if settings.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_SECS",
                reason: "must be at least one second".to_string(),
            });
        }
        if settings.run_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "RUN_TIMEOUT_SECS",
                reason: "must be at least one second".to_string(),
            });
        }

        Ok(Self {
            broker_url: settings.broker_url,
            ckan,
            window,
            write_method: settings.write_method,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            run_timeout: Duration::from_secs(settings.run_timeout_secs),
        })
    }

    pub fn broker_url(&self) -> Result<&str, ConfigError> {
        self.broker_url
            .as_deref()
            .ok_or(ConfigError::Missing("BROKER_URL"))
    }

    pub fn ckan(&self) -> Result<&CkanConfig, ConfigError> {
        self.ckan.as_ref().ok_or(ConfigError::Missing("CKAN_URL"))
    }
}
