use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::s3::DEFAULT_HOST;

/// Credentials and endpoint settings for one S3 account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// AWS access key ID
    pub access_key: String,

    /// AWS secret access key
    pub secret_key: String,

    /// S3 host, optionally with a port (default: s3.amazonaws.com)
    #[serde(default = "default_host")]
    pub host: String,

    /// Use HTTPS (default: true)
    #[serde(default = "default_use_ssl")]
    pub use_ssl: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure_tls: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_use_ssl() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    300
}

impl Profile {
    /// Profile for the default endpoint with default settings
    pub fn new(access_key: String, secret_key: String) -> Self {
        Self {
            access_key,
            secret_key,
            host: default_host(),
            use_ssl: default_use_ssl(),
            request_timeout: default_request_timeout(),
            insecure_tls: false,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Named profiles
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    /// Profile used when none is requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a profile by name, or the default profile if not specified
    pub fn get_profile(&self, name: Option<&str>) -> Option<&Profile> {
        if let Some(name) = name {
            self.profiles.get(name)
        } else if let Some(default) = &self.default_profile {
            self.profiles.get(default)
        } else {
            self.profiles.values().next()
        }
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// Supports both AWS standard variables and the short S3_* form:
/// - AWS_ACCESS_KEY_ID / S3_KEY
/// - AWS_SECRET_ACCESS_KEY / S3_SECRET
/// - S3_HOST (optional, defaults to s3.amazonaws.com)
/// - S3_USE_SSL (optional, defaults to true)
/// - S3_REQUEST_TIMEOUT (optional, seconds)
/// - S3_INSECURE_TLS (optional)
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("S3_KEY"))
        .context("Neither AWS_ACCESS_KEY_ID nor S3_KEY environment variable is set")?;

    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("S3_SECRET"))
        .context("Neither AWS_SECRET_ACCESS_KEY nor S3_SECRET environment variable is set")?;

    let mut profile = Profile::new(access_key, secret_key);

    if let Ok(host) = std::env::var("S3_HOST") {
        if !host.trim().is_empty() {
            profile.host = host.trim().to_string();
        }
    }

    if let Ok(use_ssl) = std::env::var("S3_USE_SSL") {
        profile.use_ssl = parse_flag(&use_ssl)
            .with_context(|| format!("Invalid S3_USE_SSL value: {}", use_ssl))?;
    }

    if let Ok(timeout) = std::env::var("S3_REQUEST_TIMEOUT") {
        profile.request_timeout = timeout
            .parse()
            .with_context(|| format!("Invalid S3_REQUEST_TIMEOUT value: {}", timeout))?;
    }

    if let Ok(insecure) = std::env::var("S3_INSECURE_TLS") {
        profile.insecure_tls = parse_flag(&insecure).unwrap_or(false);
    }

    let mut config = Config::new();
    config.profiles.insert("default".to_string(), profile);
    config.default_profile = Some("default".to_string());

    Ok(config)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load configuration from file or environment
///
/// # Arguments
/// * `config_path` - Optional path to YAML config file
/// * `profile_name` - Optional profile name to use (only relevant for YAML configs)
pub fn load_config(config_path: Option<&str>, profile_name: Option<&str>) -> Result<Config> {
    if let Some(path) = config_path {
        let mut config = load_from_yaml(path)?;

        // If a specific profile is requested, make it the default
        if let Some(name) = profile_name {
            if !config.profiles.contains_key(name) {
                anyhow::bail!("Profile '{}' not found in config file", name);
            }
            config.default_profile = Some(name.to_string());
        }

        Ok(config)
    } else {
        load_from_env()
    }
}
