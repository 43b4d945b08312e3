//! Transport configuration management

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

/// Default heartbeat interval used by SockJS-compatible servers.
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(25);

/// How long a session without a receive channel survives.
const DEFAULT_DISCONNECT_DELAY: Duration = Duration::from_secs(5);

/// Maximum accepted send body (512 KiB).
const DEFAULT_MAX_BODY_SIZE: usize = 512 * 1024;

/// JSONP transport configuration
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonpConfig {
    /// Bind address (default: 127.0.0.1:8081)
    pub bind_addr: String,

    /// URL prefix the transport routes are nested under (default: "/echo")
    pub prefix: String,

    /// Delay before an idle receive request is answered with a heartbeat frame
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub heartbeat_interval: Duration,

    /// How long a session may stay without a receive channel before it expires
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub disconnect_delay: Duration,

    /// How often the session reaper sweeps expired sessions
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub gc_interval: Duration,

    /// Set a `JSESSIONID` cookie for load balancer affinity
    pub cookie_needed: bool,

    /// Reject callback names outside `[A-Za-z0-9_.-]`
    pub strict_callback: bool,

    /// Maximum send request body size in bytes
    pub max_body_size: usize,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for JsonpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8081".to_string(),
            prefix: "/echo".to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT,
            disconnect_delay: DEFAULT_DISCONNECT_DELAY,
            gc_interval: Duration::from_secs(1),
            cookie_needed: false,
            strict_callback: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            logging: LoggingConfig::default(),
        }
    }
}

/// Where log output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// Write to stderr only
    #[default]
    Stderr,
    /// Write to a rolling file only
    FileOnly,
    /// Write to stderr and a rolling file
    Both,
    /// Disable logging
    None,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (overridden by `RUST_LOG`)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub structured: bool,
    /// Output target
    pub output: LogOutput,
    /// Directory for rolling log files
    pub directory: Option<PathBuf>,
    /// File name prefix for rolling log files
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            output: LogOutput::Stderr,
            directory: None,
            file_prefix: "jsonpoll".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Human-readable stderr logging at `level`
    pub fn stderr(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// Structured JSON logs to stderr and a daily rolling file in `directory`
    pub fn production(directory: impl Into<PathBuf>) -> Self {
        Self {
            structured: true,
            output: LogOutput::Both,
            directory: Some(directory.into()),
            ..Self::default()
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] ::config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl JsonpConfig {
    /// Environment variable prefix used by [`from_file`](Self::from_file).
    pub const ENV_PREFIX: &'static str = "JSONPOLL";

    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables with the `JSONPOLL_` prefix override file
    /// settings; nested keys use `__` (e.g. `JSONPOLL_LOGGING__LEVEL=debug`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, has an unsupported
    /// extension, or contains invalid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, Self::ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file).
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use ::config::{Config, Environment, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Create a configuration builder
    pub fn builder() -> JsonpConfigBuilder {
        JsonpConfigBuilder::new()
    }

    /// The route prefix normalised to a leading slash and no trailing slash.
    ///
    /// Returns an empty string when routes should be mounted at the root.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}

/// Builder for [`JsonpConfig`]
///
/// # Examples
///
/// ```rust
/// use jsonpoll::JsonpConfig;
/// use std::time::Duration;
///
/// let config = JsonpConfig::builder()
///     .bind_addr("0.0.0.0:9999")
///     .prefix("/chat")
///     .heartbeat_interval(Duration::from_secs(10))
///     .cookie_needed(true)
///     .build();
///
/// assert_eq!(config.prefix, "/chat");
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonpConfigBuilder {
    config: JsonpConfig,
}

impl JsonpConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Set the route prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Set the heartbeat interval
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the session disconnect delay
    pub fn disconnect_delay(mut self, delay: Duration) -> Self {
        self.config.disconnect_delay = delay;
        self
    }

    /// Set the reaper sweep interval
    pub fn gc_interval(mut self, interval: Duration) -> Self {
        self.config.gc_interval = interval;
        self
    }

    /// Enable or disable the affinity cookie
    pub fn cookie_needed(mut self, needed: bool) -> Self {
        self.config.cookie_needed = needed;
        self
    }

    /// Enable or disable strict callback validation
    ///
    /// # Security Warning
    /// Disabling this emits the client-supplied callback into executable
    /// script output unchecked.
    pub fn strict_callback(mut self, strict: bool) -> Self {
        self.config.strict_callback = strict;
        self
    }

    /// Set the maximum send body size
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Set the logging configuration
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Build the configuration
    pub fn build(self) -> JsonpConfig {
        self.config
    }
}
