//! Unified logging setup for beanwire
//!
//! - Log level parsing (from strings and the environment)
//! - One-shot `tracing` subscriber initialisation
//! - Error cause-chain formatting

use std::str::FromStr;

use tracing::Level;

/// Environment variable consulted by [`LogLevel::from_env`]
pub const LOG_LEVEL_ENV: &str = "BEANWIRE_LOG";

/// Log levels understood by beanwire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Parse log level from string, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Read the level from [`LOG_LEVEL_ENV`], if set and valid
    pub fn from_env() -> Option<Self> {
        std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|value| Self::parse(&value))
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// The matching `tracing` level
    pub fn as_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log level: {}", s))
    }
}

/// Logging configuration options
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Minimum log level; falls back to the environment, then `Info`
    pub level: Option<LogLevel>,
    /// Include the event target (module path) in each line
    pub with_target: bool,
    /// Route output through the libtest capture writer
    pub test_writer: bool,
}

/// Install the global `tracing` subscriber.
///
/// Returns `false` when a global subscriber was already installed, which is
/// the normal outcome when several tests initialise logging.
pub fn init(options: LogOptions) -> bool {
    let level = options
        .level
        .or_else(LogLevel::from_env)
        .unwrap_or(LogLevel::Info);

    let builder = tracing_subscriber::fmt()
        .with_max_level(level.as_tracing_level())
        .with_target(options.with_target);

    let installed = if options.test_writer {
        builder.with_test_writer().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = level.as_str(), "logging initialised");
    }
    installed
}

/// Install a trace-level subscriber writing to the test harness.
pub fn init_for_tests() -> bool {
    init(LogOptions {
        level: Some(LogLevel::Trace),
        with_target: true,
        test_writer: true,
    })
}

/// Format an error with its cause chain
pub fn format_error(error: &dyn std::error::Error) -> String {
    format_error_recursive(error, 0)
}

fn format_error_recursive(error: &dyn std::error::Error, depth: usize) -> String {
    const MAX_DEPTH: usize = 10;

    if depth >= MAX_DEPTH {
        return error.to_string();
    }

    let base = error.to_string();

    if let Some(source) = error.source() {
        format!(
            "{} Caused by: {}",
            base,
            format_error_recursive(source, depth + 1)
        )
    } else {
        base
    }
}
