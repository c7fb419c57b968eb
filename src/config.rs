use crate::constants::{CERTIFICATION_BASE_URL, MAX_RETRIES, PRODUCTION_BASE_URL};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// SII environment a submission goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Certification,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_BASE_URL,
            Environment::Certification => CERTIFICATION_BASE_URL,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Certification => f.write_str("certification"),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "produccion" => Ok(Environment::Production),
            "certification" | "certificacion" => Ok(Environment::Certification),
            other => Err(ConfigError::Invalid(format!("unknown environment '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub environment: Environment,
    /// Verify the server's TLS certificate and host name.
    pub verify_ssl: bool,
    /// Default retry budget when the caller does not pass one.
    pub retries: u32,
    pub timeout_seconds: u64,
    /// Overrides the environment's host, e.g. for a local proxy.
    pub base_url: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Certification,
            verify_ssl: true,
            retries: MAX_RETRIES,
            timeout_seconds: 60,
            base_url: None,
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "retries must be at most {}, got {}",
                MAX_RETRIES, self.retries
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("timeout_seconds must be greater than 0".to_string()));
        }
        if let Some(base_url) = &self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!("base_url '{}' is not an http(s) URL", base_url)));
            }
        }
        Ok(())
    }

    /// Full URL of `path` under the configured host.
    pub fn url(&self, path: &str) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/');
        format!("{}{}", base, path)
    }

    /// Retry budget for one submission, clamped into `[0, MAX_RETRIES]`.
    pub fn effective_retries(&self, requested: Option<u32>) -> u32 {
        requested.unwrap_or(self.retries).min(MAX_RETRIES)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.connection.validate()?;
        Ok(config)
    }

    /// Applies `DTE_DISPATCH_*` environment variables on top of the file values.
    pub fn apply_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(value) = std::env::var("DTE_DISPATCH_ENVIRONMENT") {
            self.connection.environment = value.parse()?;
        }
        if let Ok(value) = std::env::var("DTE_DISPATCH_VERIFY_SSL") {
            self.connection.verify_ssl = parse_flag(&value)?;
        }
        if let Ok(value) = std::env::var("DTE_DISPATCH_RETRIES") {
            self.connection.retries = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("DTE_DISPATCH_RETRIES is not a number: '{}'", value)))?;
        }
        self.connection.validate()?;
        Ok(self)
    }
}

fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid(format!("'{}' is not a boolean", other))),
    }
}
