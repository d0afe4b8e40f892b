//! Allocation policy resolution
//!
//! Looks up the target bucket fractions for a regime label with a fixed
//! fallback chain: the label's table, then `neutre`, then an equal split.
//! Fractions are clamped to [0, 1] and the result is renormalized so it
//! always sums to 1.

use crate::logger::{self, LogTag};
use crate::types::{Bucket, RegimeLabel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySource {
    /// Table configured for the requested label
    Exact,
    /// Requested label missing or unusable; `neutre` table used
    NeutreFallback,
    /// No usable table; equal split
    EqualSplit,
}

/// Target fraction per bucket, summing to 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    pub fractions: BTreeMap<Bucket, f64>,
    pub source: PolicySource,
}

impl AllocationPolicy {
    pub fn equal_split() -> Self {
        let share = 1.0 / Bucket::ALL.len() as f64;
        Self {
            fractions: Bucket::ALL.iter().map(|b| (*b, share)).collect(),
            source: PolicySource::EqualSplit,
        }
    }

    pub fn fraction(&self, bucket: Bucket) -> f64 {
        self.fractions.get(&bucket).copied().unwrap_or(0.0)
    }
}

/// Clamp and renormalize one configured table; `None` when nothing is left
fn normalize_table(table: &BTreeMap<String, f64>) -> Option<BTreeMap<Bucket, f64>> {
    let mut fractions: BTreeMap<Bucket, f64> = Bucket::ALL.iter().map(|b| (*b, 0.0)).collect();
    for (name, value) in table {
        let Some(bucket) = Bucket::from_name(name) else {
            logger::debug(LogTag::Policy, &format!("Ignoring unknown bucket '{}'", name));
            continue;
        };
        if value.is_finite() {
            *fractions.entry(bucket).or_insert(0.0) += value.clamp(0.0, 1.0);
        }
    }

    let total: f64 = fractions.values().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    for value in fractions.values_mut() {
        *value /= total;
    }
    Some(fractions)
}

/// Resolve the target allocation for `label`
pub fn resolve_policy(
    label: RegimeLabel,
    tables: &BTreeMap<String, BTreeMap<String, f64>>,
) -> AllocationPolicy {
    let lookup = |l: RegimeLabel| {
        tables
            .get(l.as_str())
            .or_else(|| {
                tables
                    .iter()
                    .find(|(key, _)| RegimeLabel::from_name(key) == Some(l))
                    .map(|(_, table)| table)
            })
            .and_then(normalize_table)
    };

    if let Some(fractions) = lookup(label) {
        return AllocationPolicy {
            fractions,
            source: PolicySource::Exact,
        };
    }

    if label != RegimeLabel::Neutre {
        if let Some(fractions) = lookup(RegimeLabel::Neutre) {
            logger::debug(
                LogTag::Policy,
                &format!("No usable policy for '{}', using neutre", label),
            );
            return AllocationPolicy {
                fractions,
                source: PolicySource::NeutreFallback,
            };
        }
    }

    logger::warning(
        LogTag::Policy,
        &format!("No usable policy for '{}' or neutre, using equal split", label),
    );
    AllocationPolicy::equal_split()
}
