//! Logging initialization for the transport server
//!
//! Stderr logging needs no guard. File logging writes through a
//! non-blocking appender whose [`LoggingGuard`] must be held until exit,
//! otherwise buffered lines are lost.
//!
//! ```rust,no_run
//! use jsonpoll::LoggingConfig;
//!
//! let _guard = LoggingConfig::production("/var/log/jsonpoll").init()?;
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogOutput, LoggingConfig};

/// Guard that flushes file logs on drop
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    _stderr_guard: Option<WorkerGuard>,
}

impl LoggingConfig {
    /// Initialize the global tracing subscriber from this configuration
    ///
    /// `RUST_LOG` takes precedence over [`LoggingConfig::level`].
    ///
    /// # Errors
    ///
    /// Returns an error if file output is requested without a directory,
    /// the directory cannot be created, or a global subscriber is already set.
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.output {
            LogOutput::None => Ok(None),
            LogOutput::Stderr => {
                init_stderr(self, filter)?;
                Ok(None)
            }
            LogOutput::FileOnly => {
                let dir = self.require_directory()?;
                init_file(self, dir, filter, false).map(Some)
            }
            LogOutput::Both => {
                let dir = self.require_directory()?;
                init_file(self, dir, filter, true).map(Some)
            }
        }
    }

    fn require_directory(&self) -> io::Result<&Path> {
        self.directory.as_deref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "File logging requires a directory (set logging.directory)",
            )
        })
    }
}

fn init_stderr(config: &LoggingConfig, filter: EnvFilter) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

fn init_file(
    config: &LoggingConfig,
    dir: &Path,
    filter: EnvFilter,
    with_stderr: bool,
) -> io::Result<LoggingGuard> {
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let subscriber = tracing_subscriber::registry().with(filter);

    if with_stderr {
        let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(io::stderr());
        let combined = file_writer.and(stderr_writer);
        let result = if config.structured {
            subscriber
                .with(fmt::layer().json().with_writer(combined))
                .try_init()
        } else {
            subscriber.with(fmt::layer().with_writer(combined)).try_init()
        };
        result.map_err(|e| io::Error::other(e.to_string()))?;

        return Ok(LoggingGuard {
            _file_guard: file_guard,
            _stderr_guard: Some(stderr_guard),
        });
    }

    let result = if config.structured {
        subscriber
            .with(fmt::layer().json().with_writer(file_writer))
            .try_init()
    } else {
        subscriber.with(fmt::layer().with_writer(file_writer)).try_init()
    };
    result.map_err(|e| io::Error::other(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        _stderr_guard: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_output_requires_directory() {
        let config = LoggingConfig {
            output: LogOutput::FileOnly,
            directory: None,
            ..LoggingConfig::default()
        };

        let err = config.init().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_disabled_logging_needs_no_guard() {
        let config = LoggingConfig {
            output: LogOutput::None,
            ..LoggingConfig::default()
        };
        assert!(config.init().unwrap().is_none());
    }

    #[test]
    fn test_presets() {
        let config = LoggingConfig::stderr("debug");
        assert_eq!(config.level, "debug");
        assert_eq!(config.output, LogOutput::Stderr);

        let config = LoggingConfig::production("/var/log/jsonpoll");
        assert!(config.structured);
        assert_eq!(config.output, LogOutput::Both);
        assert!(config.directory.is_some());
    }
}
