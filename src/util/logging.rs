//! Structured logging setup for kitbuilder
//!
//! Builds a `tracing` subscriber once per process. Console output is the
//! default; JSON output is meant for builds running inside a cluster where
//! log lines are collected and indexed.
//!
//! # Example
//!
//! ```no_run
//! use kitbuilder::util::logging;
//! use tracing::info;
//!
//! logging::init_from_env();
//! info!(build = "my-kit", step = "builder/image/JvmDockerfile", "Executing step");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Noisy dependencies that are capped at `warn` unless `RUST_LOG` says otherwise
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "bollard"];

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for kitbuilder's own targets
    pub level: Level,

    /// Emit one JSON object per line instead of human readable output
    pub use_json: bool,

    /// Include the module target (e.g., kitbuilder::builder::scheduler)
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    /// Include thread IDs and names
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full metadata, for builder pods
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    /// Debug level console output
    pub fn development() -> Self {
        Self::with_level(Level::DEBUG)
    }

    /// Reads `KITBUILDER_LOG_LEVEL` and `KITBUILDER_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var("KITBUILDER_LOG_LEVEL")
            .map(|v| parse_level(&v))
            .unwrap_or(Level::INFO);

        let use_json = env::var("KITBUILDER_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            level,
            use_json,
            ..Default::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::from_default_env();

        if let Some(own) = directive(&format!("kitbuilder={}", self.level)) {
            filter = filter.add_directive(own);
        }

        if env::var("RUST_LOG").is_err() {
            for target in QUIET_TARGETS {
                if let Some(d) = directive(&format!("{}=warn", target)) {
                    filter = filter.add_directive(d);
                }
            }
        }

        filter
    }
}

fn directive(spec: &str) -> Option<Directive> {
    spec.parse().ok()
}

/// Parses a log level, case-insensitive. Unknown values fall back to INFO.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                other
            );
            Level::INFO
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids);
        let subscriber = tracing_subscriber::registry().with(config.filter());

        if config.use_json {
            subscriber.with(layer.json()).init();
        } else {
            subscriber.with(layer).init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level(" info "), Level::INFO);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("Error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_invalid() {
        assert_eq!(parse_level("loud"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_presets() {
        let default = LoggingConfig::default();
        assert_eq!(default.level, Level::INFO);
        assert!(!default.use_json);

        let production = LoggingConfig::production();
        assert!(production.use_json);
        assert!(production.include_location);

        let development = LoggingConfig::development();
        assert_eq!(development.level, Level::DEBUG);
        assert!(!development.use_json);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("KITBUILDER_LOG_LEVEL", "debug");
        env::set_var("KITBUILDER_LOG_JSON", "true");

        let config = LoggingConfig::from_env();

        env::remove_var("KITBUILDER_LOG_LEVEL");
        env::remove_var("KITBUILDER_LOG_JSON");

        assert_eq!(config.level, Level::DEBUG);
        assert!(config.use_json);
    }
}
