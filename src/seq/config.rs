//! Registry configuration management
//!
//! Database connection, retry policy and series definitions, loaded from YAML.

use crate::seq::TEAM_SERIES;
use crate::seq::identifier::IdentifierFormat;
use crate::seq::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default = "default_series")]
    pub series: Vec<SeriesConfig>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(flatten)]
    pub db_config: DatabaseType,
}

/// Database type enumeration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DatabaseType {
    #[serde(rename = "sqlite")]
    Sqlite {
        #[serde(default = "default_sqlite_url")]
        url: String,
    },
    #[serde(rename = "postgres")]
    Postgres { url: String },
}

/// Retry settings for counter transactions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

/// One independent counter and how its values render
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeriesConfig {
    pub id: String,
    pub prefix: String,
    #[serde(default = "default_width")]
    pub width: usize,
}

fn default_sqlite_url() -> String {
    "sqlite:///tmp/icct/registry.db?mode=rwc".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    50
}

fn default_max_jitter_ms() -> u64 {
    20
}

fn default_width() -> usize {
    3
}

fn default_series() -> Vec<SeriesConfig> {
    vec![SeriesConfig {
        id: TEAM_SERIES.to_string(),
        prefix: "ICCT".to_string(),
        width: default_width(),
    }]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
            .with_jitter(Duration::from_millis(self.max_jitter_ms))
    }
}

impl SeriesConfig {
    pub fn format(&self) -> IdentifierFormat {
        IdentifierFormat::new(self.prefix.clone(), self.width)
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::IoError)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths
    pub fn from_default_path() -> Result<Self, ConfigError> {
        let possible_paths = [
            "icct.yml",
            "icct.yaml",
            "config.yml",
            "config.yaml",
            "/etc/icct/config.yml",
        ];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Err(ConfigError::ConfigNotFound)
    }

    /// Build a configuration with default retry and series settings from a
    /// bare database URL.
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let db_config = if url.starts_with("sqlite:") {
            DatabaseType::Sqlite {
                url: url.to_string(),
            }
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::Postgres {
                url: url.to_string(),
            }
        } else {
            return Err(ConfigError::Invalid(format!("unsupported URL scheme: {url}")));
        };

        Ok(Config {
            database: DatabaseConfig { db_config },
            retry: RetryConfig::default(),
            series: default_series(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }

        let mut seen = HashSet::new();
        for series in &self.series {
            if series.id.is_empty() {
                return Err(ConfigError::Invalid("series id must not be empty".into()));
            }
            if series.prefix.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "series {} has an empty prefix",
                    series.id
                )));
            }
            if !seen.insert(series.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "series {} declared twice",
                    series.id
                )));
            }
        }

        if self.series(TEAM_SERIES).is_none() {
            return Err(ConfigError::Invalid(format!(
                "series {TEAM_SERIES} must be configured"
            )));
        }
        Ok(())
    }

    pub fn series(&self, id: &str) -> Option<&SeriesConfig> {
        self.series.iter().find(|s| s.id == id)
    }
}

impl DatabaseConfig {
    /// Get database type string
    pub fn db_type_str(&self) -> &'static str {
        match &self.db_config {
            DatabaseType::Sqlite { .. } => "sqlite",
            DatabaseType::Postgres { .. } => "postgres",
        }
    }

    pub fn url(&self) -> &str {
        match &self.db_config {
            DatabaseType::Sqlite { url } | DatabaseType::Postgres { url } => url,
        }
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Config file not found in default locations")]
    ConfigNotFound,
}
