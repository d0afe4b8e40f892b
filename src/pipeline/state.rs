//! Cycle state persisted between decision cycles
//!
//! Saved once at the end of each cycle by writing a temp file in the same
//! directory and renaming it over the old one, so a crash never leaves a
//! half-written state behind.

use crate::errors::JournalError;
use crate::logger::{self, LogTag};
use crate::market::{DetectorState, PoolSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleState {
    /// Completed cycles across restarts
    pub cycle: u64,
    #[serde(default)]
    pub detector: DetectorState,
    #[serde(default)]
    pub snapshots: BTreeMap<String, PoolSnapshot>,
}

impl CycleState {
    /// Load the saved state; missing or corrupt files give the default
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                logger::info(
                    LogTag::System,
                    &format!("No saved state at {}, starting fresh", path.display()),
                );
                return Self::default();
            }
            Err(e) => {
                logger::warning(
                    LogTag::System,
                    &format!("Cannot read state {}: {}, starting fresh", path.display(), e),
                );
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                logger::warning(
                    LogTag::System,
                    &format!("Corrupt state {}: {}, starting fresh", path.display(), e),
                );
                Self::default()
            }
        }
    }

    /// Atomically replace the saved state
    pub fn save(&self, path: &Path) -> Result<(), JournalError> {
        let write_err = |source| JournalError::Write {
            path: path.to_path_buf(),
            source,
        };

        let body = serde_json::to_vec_pretty(self).map_err(|source| JournalError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&body).map_err(write_err)?;
        tmp.as_file().sync_data().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegimeLabel;

    #[test]
    fn test_missing_state_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(CycleState::load(&dir.path().join("state.json")), CycleState::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("state.json");
        let state = CycleState {
            cycle: 12,
            detector: DetectorState {
                label: Some(RegimeLabel::Defavorable),
                score: Some(-1.4),
                cooldown_remaining: 1,
            },
            snapshots: BTreeMap::from([(
                "pool".to_string(),
                PoolSnapshot {
                    apr: 4.0,
                    tvl_usd: 1e6,
                },
            )]),
        };
        state.save(&path).unwrap();
        state.save(&path).unwrap();
        assert_eq!(CycleState::load(&path), state);
    }

    #[test]
    fn test_corrupt_state_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{\"cycle\": 3, \"detec").unwrap();
        assert_eq!(CycleState::load(&path), CycleState::default());
    }
}
