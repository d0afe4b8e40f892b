/// Exit evaluator: liquidation directive derived from the mode tier
use crate::types::{Bucket, ModeTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitDirective {
    pub exit: bool,
    pub buckets_affected: BTreeSet<Bucket>,
    pub reason: String,
}

impl ExitDirective {
    pub fn none() -> Self {
        Self {
            exit: false,
            buckets_affected: BTreeSet::new(),
            reason: "no_exit".to_string(),
        }
    }
}

/// PANIC exits everything, CRISE exits the highest-risk bucket
pub fn evaluate_exit(tier: ModeTier) -> ExitDirective {
    match tier {
        ModeTier::Panic => ExitDirective {
            exit: true,
            buckets_affected: Bucket::ALL.into_iter().collect(),
            reason: "panic_exit_all".to_string(),
        },
        ModeTier::Crise => ExitDirective {
            exit: true,
            buckets_affected: BTreeSet::from([Bucket::HIGHEST_RISK]),
            reason: "crise_exit_highest_risk".to_string(),
        },
        _ => ExitDirective::none(),
    }
}
