//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured level when set. Log lines go to
//! stderr so they never interleave with chat output on stdout.

use std::io;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, TelemetryConfig, ValidationError};

/// Installs the global subscriber. A second call is a no-op.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), ValidationError> {
    let format = config.format()?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("adforge={},reqwest=warn", config.log_level))
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        let config = TelemetryConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
    }

    #[test]
    fn unknown_format_is_reported() {
        let config = TelemetryConfig {
            log_format: "xml".into(),
            ..TelemetryConfig::default()
        };
        assert!(init_tracing(&config).is_err());
    }
}
