/// `load_config` module: Loads and adapts a static YAML config, including environment secret injection, into the CLI config.
///
/// This module is the only place where untrusted YAML is parsed and mapped to strongly-typed internal structs.
///
/// # Responsibilities
/// - Parse user-supplied YAML configuration files into type-safe Rust structs
/// - Inject environment variables for secret fields (API key and secret), never read from YAML
/// - Ensure robust error messages for CLI and tests: any failure in loading must result in clear diagnostics.
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich diagnostics, and are surfaced at the CLI boundary.
///
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const API_KEY_VAR: &str = "PUTIO_API_KEY";
pub const API_SECRET_VAR: &str = "PUTIO_API_SECRET";

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketSection {
    /// Links staged before any links given on the command line.
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub api: ApiSection,
    pub bucket: BucketSection,
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    api: ApiSection,
    #[serde(default)]
    bucket: Option<BucketSection>,
}

fn required_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            info!(var, "Secret found in env");
            Ok(value)
        }
        Ok(_) => {
            error!(var, "Environment variable is empty");
            Err(anyhow::anyhow!("{var} environment variable is empty"))
        }
        Err(e) => {
            error!(error = ?e, var, "Environment variable not set");
            Err(anyhow::anyhow!("{var} environment variable not set: {e}"))
        }
    }
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
/// Returns a processable CLI config for use by the CLI.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if raw.api.base_url.trim().is_empty() {
        error!(config_path = ?path_ref, "api.base_url is empty");
        anyhow::bail!("api.base_url must not be empty");
    }

    dotenvy::dotenv().ok(); // loads secrets from .env if present
    let credentials = Credentials {
        api_key: required_env(API_KEY_VAR)?,
        api_secret: required_env(API_SECRET_VAR)?,
    };

    let bucket = raw.bucket.unwrap_or_default();
    info!(
        base_url = %raw.api.base_url,
        timeout_secs = raw.api.timeout_secs,
        staged_links = bucket.links.len(),
        "Config loaded and merged successfully"
    );

    Ok(CliConfig {
        api: raw.api,
        bucket,
        credentials,
    })
}
