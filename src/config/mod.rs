//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `ADFORGE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use adforge::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Backend at {}", config.backend.base_url);
//! ```

mod backend;
mod conversation;
mod error;
mod features;
mod polling;
mod telemetry;

pub use backend::BackendConfig;
pub use conversation::ConversationConfig;
pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use polling::PollingConfig;
pub use telemetry::{Environment, LogFormat, TelemetryConfig};

use serde::Deserialize;

use crate::adapters::http::HttpBackendConfig;
use crate::application::conversation::ControllerOptions;
use crate::application::polling::PollPolicy;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Generation backend connection
    pub backend: BackendConfig,

    /// Job status polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Conversation prompts
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Logging and environment
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `ADFORGE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `ADFORGE__BACKEND__BASE_URL=...` -> `backend.base_url = ...`
    /// - `ADFORGE__POLLING__INTERVAL_MS=2000` -> `polling.interval_ms = 2000`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ADFORGE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.telemetry.validate()?;
        self.backend.validate(self.is_production())?;
        self.polling.validate()?;
        self.conversation.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.telemetry.is_production()
    }

    pub fn http_backend(&self) -> HttpBackendConfig {
        HttpBackendConfig::new(self.backend.base_url.clone())
            .with_secret_api_key(self.backend.api_key.clone())
            .with_timeout(self.backend.timeout())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.polling.policy()
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            no_product_mode: self.features.no_product_mode,
            finalize_prompt: self.conversation.finalize_prompt.clone(),
            extra_scaffold_prompts: self.conversation.extra_scaffold_prompts_list(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use std::time::Duration;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "ADFORGE__BACKEND__BASE_URL",
        "ADFORGE__BACKEND__API_KEY",
        "ADFORGE__BACKEND__TIMEOUT_SECS",
        "ADFORGE__POLLING__INTERVAL_MS",
        "ADFORGE__POLLING__MAX_CONSECUTIVE_NOT_FOUND",
        "ADFORGE__CONVERSATION__EXTRA_SCAFFOLD_PROMPTS",
        "ADFORGE__TELEMETRY__ENVIRONMENT",
        "ADFORGE__TELEMETRY__LOG_FORMAT",
        "ADFORGE__FEATURES__NO_PRODUCT_MODE",
    ];

    fn set_minimal_env() {
        env::set_var("ADFORGE__BACKEND__BASE_URL", "http://localhost:8000/v1");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ADFORGE__BACKEND__API_KEY", "sk-test");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:8000/v1");
        assert!(config.backend.api_key.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.backend.timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_policy().interval, Duration::from_secs(5));
        assert_eq!(config.poll_policy().max_consecutive_not_found, 3);
        assert_eq!(config.telemetry.environment, Environment::Development);
        assert!(!config.features.no_product_mode);
    }

    #[test]
    fn test_missing_backend_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }

    #[test]
    fn test_production_requires_https_backend() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ADFORGE__TELEMETRY__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(
            config.validate(),
            Err(ValidationError::BaseUrlMustBeHttps)
        );
    }

    #[test]
    fn test_overrides_flow_into_options() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ADFORGE__POLLING__INTERVAL_MS", "250");
        env::set_var("ADFORGE__FEATURES__NO_PRODUCT_MODE", "true");
        env::set_var(
            "ADFORGE__CONVERSATION__EXTRA_SCAFFOLD_PROMPTS",
            "Pick a voice|Pick a length",
        );
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.poll_policy().interval, Duration::from_millis(250));
        let options = config.controller_options();
        assert!(options.no_product_mode);
        assert_eq!(options.extra_scaffold_prompts.len(), 2);
    }

    #[test]
    fn test_http_backend_carries_timeout() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ADFORGE__BACKEND__TIMEOUT_SECS", "12");
        let result = AppConfig::load();
        clear_env();

        let http = result.unwrap().http_backend();
        assert_eq!(http.timeout, Duration::from_secs(12));
    }
}
