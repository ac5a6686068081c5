//! Configuration management for cityscraper
//!
//! All configuration is loaded from `./config/cityscraper.toml`.
//! No hardcoded defaults exist in source code - all defaults are in the config template.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/cityscraper.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/cityscraper.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub scrape: ScrapeConfig,
    pub output: OutputConfig,
    pub database: DatabaseConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Backoff between retry attempts
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Linear,
    Exponential,
}

/// Politeness and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    pub base_url: String,
    /// Delay awaited before every request (milliseconds)
    pub request_delay_ms: u64,
    /// Retry attempts for network failures; HTTP error statuses are not retried
    pub max_retries: u32,
    pub backoff_strategy: BackoffStrategy,
    pub backoff_base_delay_ms: u64,
    pub backoff_max_delay_ms: u64,
}

impl ScrapeConfig {
    /// Delay before retry `attempt` (1-indexed; attempt 0 means no wait).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.backoff_base_delay_ms;
        let ms = match self.backoff_strategy {
            BackoffStrategy::Linear => base.saturating_mul(attempt as u64),
            BackoffStrategy::Exponential => {
                base.saturating_mul(1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX))
            }
        };
        Duration::from_millis(ms.min(self.backoff_max_delay_ms))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Output location and format configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub output_dir: String,
    pub format: String,
}

/// Database sink configuration for the `upload` subcommand
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub table: String,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }

        if !self.scrape.base_url.starts_with("http://") && !self.scrape.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidUrl {
                field: "scrape.base_url".to_string(),
                url: self.scrape.base_url.clone(),
            });
        }
        if self.scrape.backoff_base_delay_ms > self.scrape.backoff_max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "scrape.backoff_base_delay_ms".to_string(),
                reason: "must not exceed backoff_max_delay_ms".to_string(),
            });
        }

        if self.output.output_dir.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "output.output_dir".to_string(),
            });
        }
        if !["csv", "json", "both"].contains(&self.output.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "output.format".to_string(),
                reason: format!("'{}' is not one of csv, json, both", self.output.format),
            });
        }

        if self.database.path.is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "database.path".to_string(),
            });
        }
        if self.database.table.is_empty()
            || !self
                .database
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidValue {
                field: "database.table".to_string(),
                reason: "table name must be non-empty and alphanumeric/underscore".to_string(),
            });
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        atty::is(atty::Stream::Stdin)
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Result<AppConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_default_config_validates() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.validate().is_ok(), "Default config should validate");
    }

    fn scrape_config(strategy: BackoffStrategy) -> ScrapeConfig {
        ScrapeConfig {
            base_url: "https://www.numbeo.com".to_string(),
            request_delay_ms: 2000,
            max_retries: 3,
            backoff_strategy: strategy,
            backoff_base_delay_ms: 1000,
            backoff_max_delay_ms: 30000,
        }
    }

    #[test]
    fn test_backoff_calculation_linear() {
        let config = scrape_config(BackoffStrategy::Linear);
        assert_eq!(config.backoff_delay(0), Duration::ZERO);
        assert_eq!(config.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(3000));
    }

    #[test]
    fn test_backoff_calculation_exponential() {
        let config = scrape_config(BackoffStrategy::Exponential);
        assert_eq!(config.backoff_delay(1), Duration::from_millis(1000)); // 1000 * 2^0
        assert_eq!(config.backoff_delay(2), Duration::from_millis(2000)); // 1000 * 2^1
        assert_eq!(config.backoff_delay(3), Duration::from_millis(4000)); // 1000 * 2^2
    }

    #[test]
    fn test_backoff_max_cap() {
        let mut config = scrape_config(BackoffStrategy::Exponential);
        config.backoff_max_delay_ms = 5000;
        // 1000 * 2^9 = 512000, but should be capped at 5000
        assert_eq!(config.backoff_delay(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_validate_rejects_bad_format() {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.output.format = "xlsx".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_table_name() {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.database.table = "scraped data; drop".to_string();
        assert!(config.validate().is_err());
    }
}
