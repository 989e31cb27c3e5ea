//! Configuration management for Mika.
//!
//! Handles loading configuration from TOML files and environment variables.
//! Precedence, highest first: CLI flags, config file, environment.

use crate::error::{MikaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable holding the Metabase base URL.
pub const ENV_URL: &str = "METABASE_URL";

/// Environment variable holding the Metabase API key.
pub const ENV_API_KEY: &str = "METABASE_TOKEN";

/// Main configuration structure for Mika.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Metabase connection settings.
    #[serde(default)]
    pub metabase: MetabaseConfig,
}

/// Settings for the Metabase REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetabaseConfig {
    /// Base URL of the Metabase instance (e.g., "https://bi.example.com").
    pub url: Option<String>,

    /// Static API key sent on every request.
    pub api_key: Option<String>,

    /// Header name carrying the API key.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Timeout for read (GET) requests.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Timeout for write (POST/PUT) requests.
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

fn default_read_timeout_secs() -> u64 {
    10
}

fn default_write_timeout_secs() -> u64 {
    15
}

impl Default for MetabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            api_key_header: default_api_key_header(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

impl MetabaseConfig {
    /// Creates a config with the given URL and API key and default timeouts.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Returns true when both the base URL and the API key are present.
    pub fn is_configured(&self) -> bool {
        self.base_url().is_some() && self.api_key().is_some()
    }

    /// Returns the base URL without trailing slashes, if set and non-empty.
    pub fn base_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    /// Returns the API key, if set and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Returns a log-safe hint of the API key (first 8 characters).
    pub fn api_key_hint(&self) -> String {
        match self.api_key() {
            Some(key) => format!("{}...", key.chars().take(8).collect::<String>()),
            None => "<unset>".to_string(),
        }
    }

    /// Timeout applied to GET requests.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Timeout applied to POST and PUT requests.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Validates the timeouts and the base URL, if one is set.
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("read_timeout_secs", self.read_timeout_secs),
            ("write_timeout_secs", self.write_timeout_secs),
        ] {
            if secs == 0 {
                return Err(MikaError::configuration(format!(
                    "{name} must be at least 1 second"
                )));
            }
        }

        let Some(base) = self.base_url() else {
            return Ok(());
        };

        let url = Url::parse(base)
            .map_err(|e| MikaError::configuration(format!("Invalid Metabase URL '{base}': {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(MikaError::configuration(format!(
                "Invalid scheme '{}'. Expected 'http' or 'https'",
                url.scheme()
            )));
        }

        Ok(())
    }

    /// Merges another config into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &MetabaseConfig) {
        if other.url.is_some() {
            self.url = other.url.clone();
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key.clone();
        }
        if other.api_key_header != default_api_key_header() {
            self.api_key_header = other.api_key_header.clone();
        }
        if other.read_timeout_secs != default_read_timeout_secs() {
            self.read_timeout_secs = other.read_timeout_secs;
        }
        if other.write_timeout_secs != default_write_timeout_secs() {
            self.write_timeout_secs = other.write_timeout_secs;
        }
    }

    /// Applies `METABASE_URL` and `METABASE_TOKEN` as defaults.
    pub fn apply_env_defaults(&mut self) {
        self.apply_defaults_from(|key| std::env::var(key).ok());
    }

    /// Fills unset fields from the given variable lookup.
    pub fn apply_defaults_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.base_url().is_none() {
            self.url = lookup(ENV_URL);
        }
        if self.api_key().is_none() {
            self.api_key = lookup(ENV_API_KEY);
        }
    }

    /// Returns a display-safe string (no API key) for log output.
    pub fn display_string(&self) -> String {
        format!(
            "{} (key {})",
            self.base_url().unwrap_or("<no url>"),
            self.api_key_hint()
        )
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mika")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| MikaError::configuration(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            MikaError::configuration(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.metabase.validate()?;
        Ok(config)
    }
}
