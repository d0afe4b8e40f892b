//! Structured logging system for allocbot
//!
//! This module provides a small, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem debug control via `--debug <tag>` flags
//! - Dual output: colored console + daily log file
//!
//! ## Usage
//!
//! ```rust
//! use allocbot::logger::{self, LogTag};
//!
//! logger::error(LogTag::Journal, "Append failed");
//! logger::warning(LogTag::Market, "Pool file missing, skipping cycle");
//! logger::info(LogTag::Cycle, "cycle 3 complete");
//! logger::debug(LogTag::Detector, "median apr change: 1.2"); // Only with --debug detector
//! logger::verbose(LogTag::Journal, "lock marker contents: ..."); // Only with --verbose
//! ```
//!
//! ## Initialization
//!
//! Call once at startup from the binary:
//! ```rust,no_run
//! use allocbot::logger::{self, LoggerConfig};
//!
//! logger::init("allocbot", LoggerConfig::default());
//! ```
//!
//! Until `init` runs the file sink stays closed, so library code and tests
//! only ever write to the console.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Installs the given configuration and opens the daily log file
/// `<logs>/<binary>_<date>.log`. Call once per process, before starting the loop.
pub fn init(binary_name: &str, config: LoggerConfig) {
    let file_logging = config.file_logging;
    set_logger_config(config);

    if file_logging {
        file::init_file_logging(binary_name);
    }
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
///
/// Warnings are shown by default (also with `--quiet`).
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
///
/// Debug logs are ONLY shown when `--debug <tag>` was given for that tag.
///
/// # Example
/// ```rust
/// use allocbot::logger::{self, LogTag};
///
/// // Only shown with --debug planner
/// logger::debug(LogTag::Planner, "delta Prudent: -1000.00");
/// ```
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (very detailed tracing)
///
/// Verbose logs are ONLY shown when `--verbose` is provided.
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush all pending log writes
///
/// Call this during shutdown to ensure all logs are written to disk.
pub fn flush() {
    file::flush_file_logging();
}
