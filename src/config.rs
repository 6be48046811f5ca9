//! Configuration management for kitbuilder
//!
//! Settings are loaded from environment variables with sensible defaults.
//!
//! # Environment Variables
//!
//! - `KITBUILDER_BUILD_DIR`: Root for per-build working directories - default: system temp dir + "kitbuilder"
//! - `KITBUILDER_NAMESPACE`: Namespace used when a build does not name one - default: "default"
//! - `KITBUILDER_BASE_IMAGE`: Root base image used when no published image can be reused - default: "eclipse-temurin:17"
//! - `KITBUILDER_MAVEN_CMD` (or `MAVEN_CMD`): Maven executable - default: "mvn"
//! - `KITBUILDER_KANIKO_IMAGE`: Kaniko executor image - default: "gcr.io/kaniko-project/executor:v1.9.1"
//! - `KITBUILDER_WAIT_TIMEOUT`: Timeout for external waits in seconds - default: "300"
//! - `KITBUILDER_POLL_INTERVAL`: Poll interval in milliseconds - default: "1000"
//! - `KITBUILDER_QUEUE_CAPACITY`: Pending requests per build queue - default: "100"
//! - `KITBUILDER_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use kitbuilder::BuilderConfig;
//! use std::time::Duration;
//!
//! let config = BuilderConfig::default().with_wait_timeout(Duration::from_secs(600));
//! config.validate().expect("Invalid configuration");
//! ```

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_BASE_IMAGE: &str = "eclipse-temurin:17";
const DEFAULT_MAVEN_CMD: &str = "mvn";
const DEFAULT_KANIKO_IMAGE: &str = "gcr.io/kaniko-project/executor:v1.9.1";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Process-wide settings shared by every build
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Root directory under which build directories are created
    pub build_dir: PathBuf,

    pub namespace: String,

    /// Fallback base image when incremental selection finds no candidate
    pub base_image: String,

    pub maven_cmd: String,

    pub kaniko_image: String,

    /// Upper bound for any single external wait
    pub wait_timeout: Duration,

    pub poll_interval: Duration,

    pub queue_capacity: usize,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Default for BuilderConfig {
    /// Loads from `KITBUILDER_*` environment variables, falling back to defaults
    fn default() -> Self {
        let build_dir = env::var("KITBUILDER_BUILD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("kitbuilder"));

        let namespace =
            env::var("KITBUILDER_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());

        let base_image =
            env::var("KITBUILDER_BASE_IMAGE").unwrap_or_else(|_| DEFAULT_BASE_IMAGE.to_string());

        let maven_cmd = env::var("KITBUILDER_MAVEN_CMD")
            .or_else(|_| env::var("MAVEN_CMD"))
            .unwrap_or_else(|_| DEFAULT_MAVEN_CMD.to_string());

        let kaniko_image = env::var("KITBUILDER_KANIKO_IMAGE")
            .unwrap_or_else(|_| DEFAULT_KANIKO_IMAGE.to_string());

        let wait_timeout = Duration::from_secs(
            env_parsed("KITBUILDER_WAIT_TIMEOUT").unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS),
        );

        let poll_interval = Duration::from_millis(
            env_parsed("KITBUILDER_POLL_INTERVAL").unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        );

        let queue_capacity =
            env_parsed("KITBUILDER_QUEUE_CAPACITY").unwrap_or(DEFAULT_QUEUE_CAPACITY);

        let log_level = env::var("KITBUILDER_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            build_dir,
            namespace,
            base_image,
            maven_cmd,
            kaniko_image,
            wait_timeout,
            poll_interval,
            queue_capacity,
            log_level,
        }
    }
}

impl BuilderConfig {
    /// Checks that numeric values are in range and the log level is known
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeout = self.wait_timeout.as_secs();
        if timeout == 0 {
            return Err(ConfigError::ValidationFailed(
                "Wait timeout must be at least 1 second".to_string(),
            ));
        }
        if timeout > 3600 {
            return Err(ConfigError::ValidationFailed(
                "Wait timeout cannot exceed 1 hour".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "Poll interval must be greater than zero".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "Queue capacity must be greater than zero".to_string(),
            ));
        }

        if self.base_image.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Base image cannot be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_base_image(mut self, image: impl Into<String>) -> Self {
        self.base_image = image.into();
        self
    }

    pub fn with_maven_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.maven_cmd = cmd.into();
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Parses a seconds value the way `KITBUILDER_WAIT_TIMEOUT` is read
    /// Parses plain seconds (`45`) or a number with an `ms`, `s`, `m` or `h`
    /// suffix (`90s`, `5m`)
    pub fn parse_timeout(field: &str, raw: &str) -> Result<Duration, ConfigError> {
        let raw = raw.trim();
        let (digits, millis_per_unit) = if let Some(v) = raw.strip_suffix("ms") {
            (v, 1)
        } else if let Some(v) = raw.strip_suffix('s') {
            (v, 1_000)
        } else if let Some(v) = raw.strip_suffix('m') {
            (v, 60_000)
        } else if let Some(v) = raw.strip_suffix('h') {
            (v, 3_600_000)
        } else {
            (raw, 1_000)
        };

        digits
            .trim()
            .parse::<u64>()
            .map(|n| Duration::from_millis(n.saturating_mul(millis_per_unit)))
            .map_err(|e| ConfigError::ParseError {
                field: field.to_string(),
                error: e.to_string(),
            })
    }
}

impl fmt::Display for BuilderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Kitbuilder Configuration:")?;
        writeln!(f, "  Build Dir: {}", self.build_dir.display())?;
        writeln!(f, "  Namespace: {}", self.namespace)?;
        writeln!(f, "  Base Image: {}", self.base_image)?;
        writeln!(f, "  Maven Command: {}", self.maven_cmd)?;
        writeln!(f, "  Kaniko Image: {}", self.kaniko_image)?;
        writeln!(f, "  Wait Timeout: {}s", self.wait_timeout.as_secs())?;
        writeln!(f, "  Poll Interval: {}ms", self.poll_interval.as_millis())?;
        writeln!(f, "  Queue Capacity: {}", self.queue_capacity)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
