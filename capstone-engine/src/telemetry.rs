//! Tracing Subscriber Initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! JSON or a human-readable formatter. Hosts that configure tracing
//! themselves can skip this entirely.

use capstone_core::{CapstoneResult, ConfigError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line, colored output for terminals
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Log line format
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            default_filter: "capstone_engine=info,capstone_storage=info,warn".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read `CAPSTONE_LOG_FORMAT` (json|pretty, default json).
    pub fn from_env() -> CapstoneResult<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("CAPSTONE_LOG_FORMAT") {
            config.format = LogFormat::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                field: "CAPSTONE_LOG_FORMAT".to_string(),
                value: raw.clone(),
                reason: "expected json or pretty".to_string(),
            })?;
        }
        Ok(config)
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> CapstoneResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| ConfigError::InvalidValue {
        field: "tracing_subscriber".to_string(),
        value: format!("{:?}", config.format),
        reason: format!("Failed to init subscriber: {}", e),
    })?;

    tracing::info!(format = ?config.format, "Telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            std::env::set_var(key, value);
            Self { key }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            std::env::remove_var(self.key);
        }
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    // The only test in this crate that touches CAPSTONE_LOG_FORMAT.
    #[test]
    fn test_from_env() {
        {
            let _guard = EnvVarGuard::set("CAPSTONE_LOG_FORMAT", "pretty");
            let config = TelemetryConfig::from_env().unwrap();
            assert_eq!(config.format, LogFormat::Pretty);
        }
        {
            let _guard = EnvVarGuard::set("CAPSTONE_LOG_FORMAT", "syslog");
            assert!(TelemetryConfig::from_env().is_err());
        }
        assert_eq!(TelemetryConfig::from_env().unwrap().format, LogFormat::Json);
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig::default();
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        // Another test binary may have installed a subscriber first.
        assert!(first.is_err() || second.is_err());
    }
}
