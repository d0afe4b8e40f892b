/// Core logging implementation with automatic filtering
///
/// This module contains the central logging logic that:
/// - Checks if a log should be displayed based on level and tag
/// - Delegates to the format module for formatting/writing
use super::config::get_logger_config;
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Check against minimum log level threshold
/// 3. Debug level requires `--debug <tag>` for that tag (or `--debug all`)
/// 4. Verbose level requires the `--verbose` flag
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = get_logger_config();

    // Rule 1: Errors always log
    if level == LogLevel::Error {
        return true;
    }

    // Rule 3: Debug level requires debug mode for that specific tag
    if level == LogLevel::Debug {
        return config.is_debug_enabled_for(tag);
    }

    // Rule 4: Verbose requires explicit --verbose
    if level == LogLevel::Verbose {
        return config.min_level == LogLevel::Verbose;
    }

    // Rule 2: Check minimum level threshold
    level <= config.min_level
}

/// Internal logging function with automatic filtering
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(tag, level.as_str(), message);
}
