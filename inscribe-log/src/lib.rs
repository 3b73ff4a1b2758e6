//! Inscribe Logging
//!
//! Structured logging for the Inscribe services, built on `tracing`.
//! Defaults to JSON output on STDOUT at `info` level.
//!
//! # Environment Variables
//!
//! - `INSCRIBE_DEBUG=1` - Enable debug logging
//! - `INSCRIBE_LOG_LEVEL=trace|debug|info|warn|error` - Set log level
//! - `INSCRIBE_LOG_FORMAT=json|plain|pretty|compact` - Set output format
//! - `RUST_LOG` - Full `EnvFilter` directive, overrides the level
//!
//! # Usage
//!
//! ```no_run
//! use inscribe_log::{LogConfig, info};
//!
//! let _guard = LogConfig::from_env().init().expect("logger");
//! info!(port = 8080, "Server started");
//! ```

use std::env;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

// Re-export tracing macros so member crates log through one entry point
pub use tracing::{Instrument, debug, error, info, info_span, trace, warn};

/// Logging setup errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Failed to open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("A global subscriber is already installed")]
    AlreadyInitialized,
}

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Directive string for `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured, machine-readable (default)
    Json,
    /// Single-line human-readable
    Plain,
    /// Multi-line, for local development
    Pretty,
    /// Minimal
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "plain" | "text" => Some(LogFormat::Plain),
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File(String),
    RollingFile {
        directory: String,
        prefix: String,
        rotation: Rotation,
    },
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Hourly,
    Daily,
    Never,
}

impl Rotation {
    fn to_tracing_rotation(self) -> tracing_appender::rolling::Rotation {
        match self {
            Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
        }
    }
}

/// Logging configuration
///
/// ```
/// use inscribe_log::{LogConfig, LogFormat, LogLevel};
///
/// let config = LogConfig::new()
///     .level(LogLevel::Debug)
///     .format(LogFormat::Pretty)
///     .with_targets(false);
/// assert_eq!(config.level, LogLevel::Debug);
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub thread_ids: bool,
    pub targets: bool,
    pub file_line: bool,
    /// Emit span close events (with timing)
    pub spans: bool,
    pub colors: bool,
    /// Custom filter directive, overrides `level` and `RUST_LOG`
    pub env_filter: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `INSCRIBE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |value: Option<String>| {
            value
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };

        let debug = flag(lookup("INSCRIBE_DEBUG"));

        let level = lookup("INSCRIBE_LOG_LEVEL")
            .and_then(|s| LogLevel::parse(&s))
            .unwrap_or(if debug { LogLevel::Debug } else { LogLevel::Info });

        let format = lookup("INSCRIBE_LOG_FORMAT")
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or(LogFormat::Json);

        Self {
            level,
            format,
            colors: format != LogFormat::Json && lookup("NO_COLOR").is_none(),
            ..Self::default()
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    pub fn with_file_line(mut self, enable: bool) -> Self {
        self.file_line = enable;
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Set a filter directive such as `"inscribe=debug,hyper=info"`
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn build_filter(&self) -> Result<EnvFilter, LogError> {
        match &self.env_filter {
            Some(directive) => {
                EnvFilter::try_new(directive).map_err(|e| LogError::Filter(e.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber.
    ///
    /// The returned guard flushes buffered lines when dropped and must be
    /// held for the lifetime of the process.
    pub fn init(self) -> Result<WorkerGuard, LogError> {
        let filter = self.build_filter()?;

        let (writer, guard) = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LogError::File {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
            LogOutput::RollingFile {
                directory,
                prefix,
                rotation,
            } => {
                let appender = tracing_appender::rolling::RollingFileAppender::new(
                    rotation.to_tracing_rotation(),
                    directory,
                    prefix,
                );
                tracing_appender::non_blocking(appender)
            }
        };

        self.install(writer, filter)?;
        Ok(guard)
    }

    fn install<W>(&self, writer: W, filter: EnvFilter) -> Result<(), LogError>
    where
        W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
    {
        let span_events = if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_current_span(self.spans)
                        .with_span_list(self.spans)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Plain => registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_thread_ids(self.thread_ids)
                        .with_ansi(self.colors)
                        .with_span_events(span_events),
                )
                .try_init(),
        };

        result.map_err(|_| LogError::AlreadyInitialized)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false,
            env_filter: None,
        }
    }
}
