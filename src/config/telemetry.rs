//! Logging and environment configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Logging and environment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Environment name
    #[serde(default)]
    pub environment: Environment,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Application environment
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl TelemetryConfig {
    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Parsed log format
    pub fn format(&self) -> Result<LogFormat, ValidationError> {
        match self.log_format.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ValidationError::UnknownLogFormat(other.to_string())),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.format().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.format(), Ok(LogFormat::Pretty));
        assert!(!config.is_production());
    }

    #[test]
    fn test_log_format_is_case_insensitive() {
        let config = TelemetryConfig {
            log_format: "JSON".into(),
            ..TelemetryConfig::default()
        };
        assert_eq!(config.format(), Ok(LogFormat::Json));
    }

    #[test]
    fn test_unknown_log_format_fails_validation() {
        let config = TelemetryConfig {
            log_format: "xml".into(),
            ..TelemetryConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::UnknownLogFormat("xml".into()))
        );
    }
}
