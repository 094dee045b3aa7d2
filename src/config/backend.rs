//! Generation backend connection configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Backend connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API, e.g. `https://api.example.com/v1`
    pub base_url: String,

    /// Bearer token sent with every request
    pub api_key: Option<Secret<String>>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl BackendConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate backend configuration
    pub fn validate(&self, require_https: bool) -> Result<(), ValidationError> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingRequired("backend.base_url"));
        }
        let is_https = self.base_url.starts_with("https://");
        if !is_https && !self.base_url.starts_with("http://") {
            return Err(ValidationError::InvalidBaseUrl);
        }
        if require_https && !is_https {
            return Err(ValidationError::BaseUrlMustBeHttps);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> BackendConfig {
        BackendConfig {
            base_url: url.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_accepts_http_outside_production() {
        assert!(config("http://localhost:8000").validate(false).is_ok());
    }

    #[test]
    fn test_requires_https_in_production() {
        assert_eq!(
            config("http://api.example.com").validate(true),
            Err(ValidationError::BaseUrlMustBeHttps)
        );
        assert!(config("https://api.example.com").validate(true).is_ok());
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert_eq!(
            config("ftp://example.com").validate(false),
            Err(ValidationError::InvalidBaseUrl)
        );
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut c = config("https://api.example.com");
        c.timeout_secs = 0;
        assert_eq!(c.validate(false), Err(ValidationError::InvalidTimeout));
    }
}
