//! Decision journal writer
//!
//! `append` is the only way anything is written to a journal: serialize the
//! record to one line, take the advisory lock if it can be had, append the
//! line in a single write, fsync, release. The lock is best-effort: on
//! timeout the line is appended anyway.

use super::lock::{JournalLock, LockOptions};
use super::records::{
    AllocationPayload, AnomalyPayload, CycleMetrics, DecisionPayload, JournalRecord, PlanSummary,
    SignalPayload,
};
use crate::allocation::AllocationState;
use crate::errors::JournalError;
use crate::logger::{self, LogTag};
use crate::paths::JournalPaths;
use crate::pipeline::CycleOutcome;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Append one JSON line to `path`
pub fn append<T: Serialize>(path: &Path, record: &T, options: &LockOptions) -> Result<(), JournalError> {
    let mut line = serde_json::to_vec(record).map_err(|source| JournalError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    line.push(b'\n');

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| JournalError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    let _guard = JournalLock::acquire(path, options);

    let write_err = |source| JournalError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(&line).map_err(write_err)?;
    file.sync_data().map_err(write_err)?;

    logger::verbose(
        LogTag::Journal,
        &format!("Appended {} bytes to {}", line.len(), path.display()),
    );
    Ok(())
}

/// Counts of one cycle's journal writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub failed: usize,
}

impl WriteReport {
    fn track(&mut self, result: Result<(), JournalError>) {
        match result {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.failed += 1;
                logger::error(LogTag::Journal, &format!("Journal write failed: {}", e));
            }
        }
    }
}

/// Stamps records with this process's run id and appends them
pub struct JournalWriter {
    paths: JournalPaths,
    lock: LockOptions,
    run_id: String,
}

impl JournalWriter {
    pub fn new(paths: JournalPaths, lock: LockOptions, run_id: impl Into<String>) -> Self {
        Self {
            paths,
            lock,
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn paths(&self) -> &JournalPaths {
        &self.paths
    }

    fn write<T: Serialize>(&self, path: &Path, payload: T) -> Result<(), JournalError> {
        append(path, &JournalRecord::new(&self.run_id, payload), &self.lock)
    }

    /// One signal record, then one decision record per action
    ///
    /// Failures are logged and counted; the cycle goes on.
    pub fn record_cycle(&self, outcome: &CycleOutcome) -> WriteReport {
        let mut report = WriteReport::default();
        report.track(self.write(&self.paths.signals, signal_payload(outcome)));

        for action in &outcome.plan.actions {
            report.track(self.write(
                &self.paths.decisions,
                DecisionPayload {
                    cycle: outcome.cycle,
                    context: outcome.plan.context,
                    total_usd: outcome.plan.total_usd,
                    bucket: action.bucket,
                    direction: action.direction,
                    amount_usd: action.amount_usd,
                    capped: outcome.plan.safety.capped,
                },
            ));
        }
        report
    }

    pub fn record_allocation(
        &self,
        cycle: Option<u64>,
        state: &AllocationState,
        source: &str,
    ) -> Result<(), JournalError> {
        self.write(
            &self.paths.allocation,
            AllocationPayload {
                cycle,
                state: state.clone(),
                source: source.to_string(),
            },
        )
    }

    pub fn record_anomaly(&self, anomaly: AnomalyPayload) -> Result<(), JournalError> {
        self.write(&self.paths.anomalies, anomaly)
    }
}

fn signal_payload(outcome: &CycleOutcome) -> SignalPayload {
    SignalPayload {
        cycle: outcome.cycle,
        context: outcome.decision.label,
        score: outcome.decision.score,
        sample_size: outcome.decision.sample_size,
        reason: outcome.decision.reason.clone(),
        metrics: CycleMetrics {
            pools: outcome.pools_used,
            apr_change_median: outcome.decision.apr_change_median,
            tvl_change_median: outcome.decision.tvl_change_median,
            mode_inputs: outcome.mode_inputs.clone(),
        },
        mode: outcome.mode.clone(),
        policy: outcome.policy.clone(),
        plan: PlanSummary {
            actions: outcome.plan.actions.len(),
            moved_usd: outcome.plan.moved_usd(),
            total_usd: outcome.plan.total_usd,
            capped: outcome.plan.safety.capped,
            cancelled_reason: outcome.plan.safety.cancelled_reason.clone(),
        },
        exit: outcome.exit.clone(),
        scores: outcome.scores.clone(),
        fallbacks: outcome.fallbacks.clone(),
    }
}
