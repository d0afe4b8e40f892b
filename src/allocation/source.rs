//! Where the current allocation comes from

use super::planner::AllocationState;
use crate::journal::{read_tail, AllocationRecord};
use crate::logger::{self, LogTag};
use std::path::PathBuf;
use std::time::Duration;

/// Supplies the per-bucket USD amounts at the start of a cycle
pub trait AllocationStateSource {
    fn current_state(&self) -> AllocationState;
}

/// Last record of `allocation_state.jsonl`, else a configured initial state
pub struct JournalAllocationSource {
    path: PathBuf,
    initial: AllocationState,
    wait_timeout: Duration,
}

impl JournalAllocationSource {
    pub fn new(path: PathBuf, initial: AllocationState, wait_timeout: Duration) -> Self {
        Self {
            path,
            initial,
            wait_timeout,
        }
    }
}

impl AllocationStateSource for JournalAllocationSource {
    fn current_state(&self) -> AllocationState {
        let last: Vec<AllocationRecord> = read_tail(&self.path, 1, true, self.wait_timeout);
        match last.into_iter().next() {
            Some(record) => record.payload.state,
            None => {
                logger::debug(
                    LogTag::Journal,
                    &format!("No allocation in {}, using initial state", self.path.display()),
                );
                self.initial.clone()
            }
        }
    }
}

/// Fixed state, for tests and dry runs
impl AllocationStateSource for AllocationState {
    fn current_state(&self) -> AllocationState {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{append, AllocationPayload, JournalRecord, LockOptions};
    use crate::types::Bucket;
    use std::collections::BTreeMap;

    fn state(prudent: f64) -> AllocationState {
        AllocationState {
            amounts: BTreeMap::from([(Bucket::Prudent, prudent)]),
        }
    }

    #[test]
    fn test_missing_journal_uses_initial() {
        let dir = tempfile::tempdir().unwrap();
        let source = JournalAllocationSource::new(dir.path().join("a.jsonl"), state(7.0), Duration::ZERO);
        assert_eq!(source.current_state(), state(7.0));
    }

    #[test]
    fn test_last_record_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jsonl");
        for amount in [1.0, 2.0] {
            let record = JournalRecord::new(
                "run",
                AllocationPayload {
                    cycle: None,
                    state: state(amount),
                    source: "test".to_string(),
                },
            );
            append(&path, &record, &LockOptions::default()).unwrap();
        }

        let source = JournalAllocationSource::new(path, state(7.0), Duration::ZERO);
        assert_eq!(source.current_state(), state(2.0));
    }
}
