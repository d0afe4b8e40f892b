/// Logger configuration shared by every logging call
///
/// Binaries build a `LoggerConfig` from their CLI flags and install it once via
/// `logger::init`. Library code only reads it.
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Global logger configuration
static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Lines above this level are dropped (Debug/Verbose have extra gates)
    pub min_level: LogLevel,

    /// Tags with debug output enabled (`--debug <tag>`); "all" enables every tag
    pub debug_tags: HashSet<String>,

    /// Mirror console output into the daily log file
    pub file_logging: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            file_logging: false,
        }
    }
}

impl LoggerConfig {
    /// Build a config from the common CLI flags
    pub fn from_flags(debug_tags: &[String], verbose: bool, quiet: bool) -> Self {
        let min_level = if verbose {
            LogLevel::Verbose
        } else if quiet {
            LogLevel::Warning
        } else {
            LogLevel::Info
        };

        Self {
            min_level,
            debug_tags: debug_tags
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            file_logging: true,
        }
    }

    pub fn is_debug_enabled_for(&self, tag: &LogTag) -> bool {
        if self.min_level == LogLevel::Verbose || self.debug_tags.contains("all") {
            return true;
        }
        self.debug_tags.contains(&tag.to_debug_key())
    }
}

/// Get a snapshot of the current logger configuration
pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

/// Replace the logger configuration
pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags_levels() {
        assert_eq!(LoggerConfig::from_flags(&[], false, false).min_level, LogLevel::Info);
        assert_eq!(LoggerConfig::from_flags(&[], false, true).min_level, LogLevel::Warning);
        assert_eq!(LoggerConfig::from_flags(&[], true, true).min_level, LogLevel::Verbose);
    }

    #[test]
    fn test_debug_tags_are_case_insensitive() {
        let config = LoggerConfig::from_flags(&["Planner".to_string()], false, false);
        assert!(config.is_debug_enabled_for(&LogTag::Planner));
        assert!(!config.is_debug_enabled_for(&LogTag::Journal));

        let all = LoggerConfig::from_flags(&["all".to_string()], false, false);
        assert!(all.is_debug_enabled_for(&LogTag::Journal));
    }
}
