//! Logger module for Arbor
//!
//! Simple line-oriented logging: `[LEVEL] message`
//!
//! # Usage
//!
//! ```rust
//! use arbor::util::logger;
//!
//! logger::init();
//! tracing::info!("Hello, {}", "world");
//! ```

use tracing_subscriber::{fmt, EnvFilter};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Initialize the global subscriber with the default (info) level.
///
/// Honors `RUST_LOG` when set. Safe to call more than once; later calls
/// are no-ops.
pub fn init() {
    init_with_level(LogLevel::Info);
}

/// Initialize the global subscriber with an explicit level
pub fn init_with_level(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("arbor={}", tracing::Level::from(level)))
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .try_init();
}
