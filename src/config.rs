//! Configuration management for Pieuvre
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{PieuvreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lower bound for the poll interval in minutes
pub const MIN_POLL_INTERVAL_MINUTES: u64 = 5;
/// Upper bound for the poll interval in minutes
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 1440;
/// Lower bound for the gas m3 -> kWh conversion factor
pub const MIN_GAS_CONVERSION_FACTOR: f64 = 1.0;
/// Upper bound for the gas m3 -> kWh conversion factor
pub const MAX_GAS_CONVERSION_FACTOR: f64 = 20.0;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Kraken account credentials
    pub credentials: CredentialsConfig,

    /// Account number to monitor; when absent or unknown the first account
    /// returned by the API is used
    pub account_number: Option<String>,

    /// Poll interval in minutes (5-1440)
    pub poll_interval_minutes: u64,

    /// Gas-specific settings
    pub gas: GasConfig,

    /// Kraken API connection settings
    pub api: ApiConfig,

    /// Long-term statistics store settings
    pub statistics: StatisticsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Timezone for off-peak schedule evaluation
    pub timezone: String,
}

/// Account credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Login email
    pub email: String,

    /// Login password
    pub password: String,
}

/// Gas meter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Conversion factor from cubic meters to kWh (1.0-20.0)
    pub conversion_factor: f64,
}

/// Kraken API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Max attempts per request (network errors and retryable statuses)
    pub max_retries: u32,

    /// Base delay for the exponential backoff between attempts
    pub retry_delay_seconds: u64,
}

/// Statistics store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Path of the JSON statistics archive
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Directory (or file path whose parent is used) for rotated log files
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            conversion_factor: 11.2,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.oefr-kraken.energy/v1/graphql/".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 1,
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            path: "/data/pieuvre_statistics.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/pieuvre.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8099,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            account_number: None,
            poll_interval_minutes: 60,
            gas: GasConfig::default(),
            api: ApiConfig::default(),
            statistics: StatisticsConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            timezone: "Europe/Paris".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "pieuvre_config.yaml",
            "/data/pieuvre_config.yaml",
            "/etc/pieuvre/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.credentials.email.trim().is_empty() {
            return Err(PieuvreError::validation(
                "credentials.email",
                "Email cannot be empty",
            ));
        }

        if self.credentials.password.is_empty() {
            return Err(PieuvreError::validation(
                "credentials.password",
                "Password cannot be empty",
            ));
        }

        if !(MIN_POLL_INTERVAL_MINUTES..=MAX_POLL_INTERVAL_MINUTES)
            .contains(&self.poll_interval_minutes)
        {
            return Err(PieuvreError::validation(
                "poll_interval_minutes",
                "Must be between 5 and 1440 minutes",
            ));
        }

        if !(MIN_GAS_CONVERSION_FACTOR..=MAX_GAS_CONVERSION_FACTOR)
            .contains(&self.gas.conversion_factor)
        {
            return Err(PieuvreError::validation(
                "gas.conversion_factor",
                "Must be between 1.0 and 20.0",
            ));
        }

        if self.api.endpoint.is_empty() {
            return Err(PieuvreError::validation(
                "api.endpoint",
                "Endpoint cannot be empty",
            ));
        }

        if self.api.max_retries == 0 {
            return Err(PieuvreError::validation(
                "api.max_retries",
                "Must be greater than 0",
            ));
        }

        if self.web.port == 0 {
            return Err(PieuvreError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        if self.parsed_timezone().is_none() {
            return Err(PieuvreError::validation(
                "timezone",
                "Unknown timezone name",
            ));
        }

        Ok(())
    }

    /// Parse the configured timezone, if valid
    pub fn parsed_timezone(&self) -> Option<chrono_tz::Tz> {
        self.timezone.parse::<chrono_tz::Tz>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            credentials: CredentialsConfig {
                email: "user@example.com".to_string(),
                password: "secret".to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_minutes, 60);
        assert!((config.gas.conversion_factor - 11.2).abs() < f64::EPSILON);
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(config.timezone, "Europe/Paris");
    }

    #[test]
    fn test_config_validation() {
        let config = valid_config();
        assert!(config.validate().is_ok());

        let mut config = valid_config();
        config.credentials.email = String::new();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.poll_interval_minutes = 4;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.poll_interval_minutes = 1441;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.gas.conversion_factor = 0.9;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = valid_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.poll_interval_minutes, deserialized.poll_interval_minutes);
        assert_eq!(config.credentials.email, deserialized.credentials.email);
    }
}
