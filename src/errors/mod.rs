/// Error taxonomy for allocbot
///
/// One top-level error with a nested enum per failure family:
/// - Configuration: fatal, only raised at startup validation
/// - Input: pool or state files missing/malformed, the cycle is skipped
/// - Computation: a pipeline stage rejected its inputs, a safe default is used
/// - Journal: a journal append or read failed at the I/O level
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Error)]
pub enum AllocBotError {
    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Input Error: {0}")]
    Input(#[from] InputError),

    #[error("Computation Error: {0}")]
    Computation(#[from] ComputationError),

    #[error("Journal Error: {0}")]
    Journal(#[from] JournalError),
}

impl AllocBotError {
    /// Fatal errors abort the process before the loop starts
    pub fn is_fatal(&self) -> bool {
        matches!(self, AllocBotError::Configuration(_))
    }
}

// =============================================================================
// CONFIGURATION ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("config file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to read config '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported schema_version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("missing required table [{table}]")]
    MissingTable { table: String },

    #[error("invalid config field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// INPUT ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to read '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input '{}': {message}", path.display())]
    Malformed { path: PathBuf, message: String },
}

impl InputError {
    pub fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            InputError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            InputError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

// =============================================================================
// COMPUTATION ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    #[error("{stage}: non-finite value for {field}")]
    NonFinite { stage: &'static str, field: String },

    #[error("{stage}: {reason}")]
    Rejected { stage: &'static str, reason: String },
}

impl ComputationError {
    pub fn non_finite(stage: &'static str, field: impl Into<String>) -> Self {
        ComputationError::NonFinite {
            stage,
            field: field.into(),
        }
    }

    /// Pipeline stage that raised the error
    pub fn stage(&self) -> &'static str {
        match self {
            ComputationError::NonFinite { stage, .. } => stage,
            ComputationError::Rejected { stage, .. } => stage,
        }
    }
}

/// Reject NaN/infinite inputs at a stage boundary
pub fn ensure_finite(
    stage: &'static str,
    field: &str,
    value: f64,
) -> Result<f64, ComputationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputationError::non_finite(stage, field))
    }
}

// =============================================================================
// JOURNAL ERROR TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to serialize record for '{}': {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
