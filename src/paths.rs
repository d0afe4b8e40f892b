//! Centralized path resolution for allocbot
//!
//! Every cooperating process (decision loop, anomaly watcher, journal viewer)
//! resolves its files through this module so they agree on where the shared
//! journals live.
//!
//! ## Path Strategy
//!
//! - `ALLOCBOT_HOME` environment variable, when set
//! - otherwise the platform data directory:
//!   - **macOS**: `~/Library/Application Support/allocbot/`
//!   - **Windows**: `%LOCALAPPDATA%\allocbot\`
//!   - **Linux**: `$XDG_DATA_HOME/allocbot/` (fallback `~/.local/share/allocbot/`)
//!
//! ## Directory Structure
//!
//! ```text
//! ~/allocbot/
//! ├── data/
//! │ ├── config.toml
//! │ ├── pools.json
//! │ └── state.json
//! ├── journals/
//! │ ├── signals.jsonl (+ signals.jsonl.lock while appending)
//! │ ├── decisions.jsonl
//! │ ├── allocation_state.jsonl
//! │ ├── external_signals.jsonl
//! │ └── anomalies.jsonl
//! └── logs/
//!   └── <binary>_<date>.log
//! ```

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};

/// Environment variable overriding the base directory
pub const HOME_ENV_VAR: &str = "ALLOCBOT_HOME";

const APP_DIR: &str = "allocbot";

pub const SIGNALS_JOURNAL: &str = "signals.jsonl";
pub const DECISIONS_JOURNAL: &str = "decisions.jsonl";
pub const ALLOCATION_JOURNAL: &str = "allocation_state.jsonl";
pub const EXTERNAL_SIGNALS_JOURNAL: &str = "external_signals.jsonl";
pub const ANOMALIES_JOURNAL: &str = "anomalies.jsonl";

/// Lazy-initialized base directory (thread-safe)
static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
    if let Ok(dir) = std::env::var(HOME_ENV_VAR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(APP_DIR);
    }

    PathBuf::from(APP_DIR)
}

// =============================================================================
// PRIMARY DIRECTORY ACCESSORS
// =============================================================================

/// Returns the base directory for all allocbot data
pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

/// Returns the data directory path (config, pool input, cycle state)
pub fn get_data_directory() -> PathBuf {
    BASE_DIRECTORY.join("data")
}

/// Returns the logs directory path
pub fn get_logs_directory() -> PathBuf {
    BASE_DIRECTORY.join("logs")
}

/// Returns the shared journals directory path
pub fn get_journals_directory() -> PathBuf {
    BASE_DIRECTORY.join("journals")
}

// =============================================================================
// FILE PATHS
// =============================================================================

/// Returns the default strategy configuration path
pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

/// Returns the default pool statistics input path
pub fn get_pools_path() -> PathBuf {
    get_data_directory().join("pools.json")
}

/// Returns the persisted cycle state path
pub fn get_state_path() -> PathBuf {
    get_data_directory().join("state.json")
}

/// Returns the advisory lock marker that guards `journal`
///
/// The marker is a sibling of the journal: `signals.jsonl` → `signals.jsonl.lock`.
pub fn lock_path_for(journal: &Path) -> PathBuf {
    let mut name = journal
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    journal.with_file_name(name)
}

/// Journal file paths inside one journals directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalPaths {
    pub signals: PathBuf,
    pub decisions: PathBuf,
    pub allocation: PathBuf,
    pub external_signals: PathBuf,
    pub anomalies: PathBuf,
}

impl JournalPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            signals: dir.join(SIGNALS_JOURNAL),
            decisions: dir.join(DECISIONS_JOURNAL),
            allocation: dir.join(ALLOCATION_JOURNAL),
            external_signals: dir.join(EXTERNAL_SIGNALS_JOURNAL),
            anomalies: dir.join(ANOMALIES_JOURNAL),
        }
    }
}

impl Default for JournalPaths {
    fn default() -> Self {
        Self::in_dir(&get_journals_directory())
    }
}

// =============================================================================
// DIRECTORY CREATION
// =============================================================================

/// Ensures all required directories exist
///
/// Creates the base directory plus `data/`, `logs/` and `journals/`. Every
/// directory is attempted; the returned list holds one message per failure.
pub fn ensure_all_directories() -> Vec<String> {
    create_directories(&[
        ("base", get_base_directory()),
        ("data", get_data_directory()),
        ("logs", get_logs_directory()),
        ("journals", get_journals_directory()),
    ])
}

fn create_directories(dirs: &[(&str, PathBuf)]) -> Vec<String> {
    dirs.iter()
        .filter(|(_, dir)| !dir.exists())
        .filter_map(|(name, dir)| {
            std::fs::create_dir_all(dir).err().map(|e| {
                format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    dir.display(),
                    e
                )
            })
        })
        .collect()
}
