//! # Structured Logging
//!
//! Logging setup on the `tracing` ecosystem. The engine itself only emits
//! `tracing` events; applications call [`init_logging`] once at startup to
//! install a subscriber.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quakematch_core::observe::{init_logging, LogConfig, LogLevel};
//!
//! init_logging(&LogConfig {
//!     level: LogLevel::Debug,
//!     ..Default::default()
//! });
//!
//! tracing::info!(streams = 3, "detector started");
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Machine-readable JSON.
    Json,
    /// Human-readable, one line per event.
    #[default]
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Module filter, e.g. `quakematch_core=debug`. Overrides `level`.
    pub filter: Option<String>,
}

impl LogConfig {
    /// Verbose configuration for development.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Compact,
            filter: None,
        }
    }

    /// Errors only.
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            format: LogFormat::Compact,
            filter: None,
        }
    }
}

/// Initialize the global logging subscriber.
///
/// Call once at application startup; subsequent calls are silently
/// ignored. The `RUST_LOG` environment variable takes precedence over the
/// configured level.
pub fn init_logging(config: &LogConfig) {
    let filter = if let Some(custom) = &config.filter {
        EnvFilter::try_new(custom).unwrap_or_else(|_| EnvFilter::new(config.level.to_string()))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()))
    };

    let result = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json()),
        ),
        LogFormat::Compact => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact()),
        ),
    };

    // A subscriber may already be installed.
    let _ = result;
}
