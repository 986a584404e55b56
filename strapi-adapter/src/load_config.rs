/// `load_config` module: reads the static YAML config and injects environment secrets into an [`AdapterConfig`].
///
/// This is the only place where user-supplied YAML is parsed. The file never
/// holds secrets: the bearer token is read from `STRAPI_BEARER_TOKEN`, and
/// `STRAPI_API_LOCATION` overrides the configured location so one file can be
/// reused across environments.
///
/// # Accepted YAML
/// ```yaml
/// strapi:
///   api_location: https://cms.example.com
///   api_endpoint: /api          # optional
///   default_page_size: 25       # optional
///   page_concurrency: 8         # optional, unbounded when absent
///   partial_page_policy: drop   # or `fail`
///   normalize_strapi_data: false
///   warnings:
///     suppress_legacy_api_warning: false
/// ```
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use strapi_adapter_core::AdapterConfig;
use tracing::{error, info};

pub const API_LOCATION_ENV: &str = "STRAPI_API_LOCATION";
pub const BEARER_TOKEN_ENV: &str = "STRAPI_BEARER_TOKEN";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub strapi: AdapterConfig,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    strapi: AdapterConfig,
}

/// Loads the config file when one is given, otherwise starts from defaults,
/// then applies the environment. The result is validated.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let raw = match path {
        Some(path) => read_file(path)?,
        None => {
            info!("No config file given, configuring from environment only");
            RawConfig::default()
        }
    };

    let mut strapi = raw.strapi;
    if let Some(location) = env_var(API_LOCATION_ENV) {
        info!(api_location = %location, "Using API location from environment");
        strapi.api_location = location;
    }

    strapi.validate().map_err(|e| {
        error!(error = %e, "Invalid Strapi configuration");
        anyhow!("{e}")
    })?;

    let bearer_token = env_var(BEARER_TOKEN_ENV);
    info!(
        api_location = %strapi.api_location,
        bearer_token_set = bearer_token.is_some(),
        "Configuration loaded"
    );

    Ok(CliConfig {
        strapi,
        bearer_token,
    })
}

fn read_file(path: &Path) -> Result<RawConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path, e)
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
