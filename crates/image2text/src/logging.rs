//! Logging initialization.
//!
//! Logs always go to stderr; stdout carries reports and analysis JSON.

use image2text_core::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber.
///
/// `level` is the default filter directive; `RUST_LOG` overrides it when set.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` config section with CLI overrides.
pub fn init_from_config(
    config: &image2text_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let level = effective_level(&config.logging, verbose_override);
    let json_format = json_logs_override || config.logging.format == "json";
    init(level, json_format);
}

/// `--verbose` raises anything quieter than debug to debug.
fn effective_level(logging: &LoggingConfig, verbose: bool) -> &str {
    let level = logging.level.as_str();
    match level {
        "trace" | "debug" => level,
        _ if verbose => "debug",
        "" => "info",
        _ => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_effective_level() {
        assert_eq!(effective_level(&logging("info"), false), "info");
        assert_eq!(effective_level(&logging("warn"), false), "warn");
        assert_eq!(effective_level(&logging("warn"), true), "debug");
        assert_eq!(effective_level(&logging("trace"), true), "trace");
        assert_eq!(effective_level(&logging(""), false), "info");
    }
}
