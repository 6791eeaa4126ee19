use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{ConfigError, LoggingConfig};

/// Parse level string -> LevelFilter, rejecting anything outside the five levels.
pub fn parse_level(raw: &str) -> Result<LevelFilter, ConfigError> {
    let normalized = raw.trim().to_lowercase();
    match normalized.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => LevelFilter::from_str(&normalized)
            .map_err(|_| ConfigError::InvalidLogLevel(raw.to_string())),
        _ => Err(ConfigError::InvalidLogLevel(raw.to_string())),
    }
}

/// Installs the global subscriber. Output goes to stderr so the console
/// commands keep stdout for their results.
///
/// `RUST_LOG`, when set, takes precedence over `logging.level`.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), ConfigError> {
    let level_filter = parse_level(&logging_config.level)?;

    let filter_layer = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::default().add_directive(level_filter.into()),
    };

    let registry = tracing_subscriber::registry().with(filter_layer);
    let result = match logging_config.format.trim().to_lowercase().as_str() {
        "json" => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "console" => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        _ => {
            // Fallback to console if unknown
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
        }
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_accepts_known_levels() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level(" WARN ").unwrap(), LevelFilter::WARN);
    }

    #[test]
    fn test_parse_level_rejects_unknown_and_off() {
        assert!(matches!(
            parse_level("verbose"),
            Err(ConfigError::InvalidLogLevel(level)) if level == "verbose"
        ));
        assert!(parse_level("off").is_err());
    }
}
