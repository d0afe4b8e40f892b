//! Journal record layouts
//!
//! Every line is a `JournalRecord`: the `{timestamp, run_id, version}`
//! envelope with the payload's fields flattened beside it.

use crate::allocation::{AllocationPolicy, AllocationState, Direction, ExitDirective};
use crate::mode::{ModeInputs, ModeState};
use crate::scoring::ScoreAdjustment;
use crate::types::{Bucket, ModeTier, RegimeLabel};
use crate::version::record_version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord<T> {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub version: String,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> JournalRecord<T> {
    pub fn new(run_id: &str, payload: T) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            version: record_version(),
            payload,
        }
    }
}

/// Medians and worst-case trigger inputs seen in a cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub pools: usize,
    pub apr_change_median: Option<f64>,
    pub tvl_change_median: Option<f64>,
    pub mode_inputs: ModeInputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub actions: usize,
    pub moved_usd: f64,
    pub total_usd: f64,
    pub capped: bool,
    pub cancelled_reason: Option<String>,
}

/// One line of `signals.jsonl`, written once per cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPayload {
    pub cycle: u64,
    pub context: RegimeLabel,
    pub score: f64,
    pub sample_size: usize,
    pub reason: String,
    pub metrics: CycleMetrics,
    pub mode: ModeState,
    pub policy: AllocationPolicy,
    pub plan: PlanSummary,
    pub exit: ExitDirective,
    #[serde(default)]
    pub scores: Vec<ScoreAdjustment>,
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

/// One line of `decisions.jsonl`, one per rebalance action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPayload {
    pub cycle: u64,
    pub context: RegimeLabel,
    pub total_usd: f64,
    pub bucket: Bucket,
    pub direction: Direction,
    pub amount_usd: f64,
    pub capped: bool,
}

/// One line of `allocation_state.jsonl`; the last line is the current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPayload {
    #[serde(default)]
    pub cycle: Option<u64>,
    pub state: AllocationState,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    TierEscalated,
    ContextFlip,
    ExitDirective,
    StageFallback,
    StaleJournal,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::TierEscalated => "tier_escalated",
            AnomalyKind::ContextFlip => "context_flip",
            AnomalyKind::ExitDirective => "exit_directive",
            AnomalyKind::StageFallback => "stage_fallback",
            AnomalyKind::StaleJournal => "stale_journal",
        }
    }
}

/// One line of `anomalies.jsonl`, written by the observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPayload {
    pub kind: AnomalyKind,
    pub detail: String,
    #[serde(default)]
    pub tier: Option<ModeTier>,
    /// Run and cycle of the signal record that raised it
    #[serde(default)]
    pub source_run_id: Option<String>,
    #[serde(default)]
    pub source_cycle: Option<u64>,
}

pub type SignalRecord = JournalRecord<SignalPayload>;
pub type DecisionRecord = JournalRecord<DecisionPayload>;
pub type AllocationRecord = JournalRecord<AllocationPayload>;
pub type AnomalyRecord = JournalRecord<AnomalyPayload>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_envelope_is_flattened() {
        let record = JournalRecord::new(
            "run-1",
            AllocationPayload {
                cycle: Some(4),
                state: AllocationState {
                    amounts: BTreeMap::from([(Bucket::Prudent, 100.0)]),
                },
                source: "simulated_execution".to_string(),
            },
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["cycle"], 4);
        assert_eq!(value["state"]["Prudent"], 100.0);
        assert!(value.get("payload").is_none());

        let back: AllocationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.payload.state.amount(Bucket::Prudent), 100.0);
    }

    #[test]
    fn test_decision_line_shape() {
        let record = JournalRecord::new(
            "run-2",
            DecisionPayload {
                cycle: 1,
                context: RegimeLabel::Neutre,
                total_usd: 10_000.0,
                bucket: Bucket::Modere,
                direction: Direction::Increase,
                amount_usd: 1000.0,
                capped: false,
            },
        );
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"context\":\"neutre\""));
        assert!(line.contains("\"direction\":\"increase\""));
        assert!(line.contains("\"bucket\":\"Modere\""));
    }
}
