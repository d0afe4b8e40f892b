//! Pool statistics ingestion
//!
//! Reads the pool file fresh every cycle and turns each usable record into an
//! `AssetObservation`. Change percentages missing from a record are derived
//! from the previous cycle's snapshot of the same pool.

use super::types::{AssetObservation, MetricSample, PoolRecord, PoolSnapshot};
use crate::config::IngestConfig;
use crate::errors::InputError;
use crate::logger::{self, LogTag};
use std::collections::BTreeMap;
use std::path::Path;

/// Previous values below this are too small to compute a meaningful change
const CHANGE_BASE_EPSILON: f64 = 1e-9;

/// Result of ingesting one pool file
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub observations: Vec<AssetObservation>,
    /// Snapshot of every parsed pool, to persist for the next cycle
    pub snapshots: BTreeMap<String, PoolSnapshot>,
    pub skipped_records: usize,
    pub filtered_pools: usize,
}

/// Read and parse the pool statistics file
///
/// Accepts a top-level array or an object with a `data` array. Individual
/// records that do not parse are skipped; a file that is missing or not JSON
/// is an input error and the caller skips the cycle.
pub fn load_pools(path: &Path) -> Result<(Vec<PoolRecord>, usize), InputError> {
    let contents = std::fs::read_to_string(path).map_err(|e| InputError::from_io(path, e))?;
    parse_pools(path, &contents)
}

pub fn parse_pools(path: &Path, contents: &str) -> Result<(Vec<PoolRecord>, usize), InputError> {
    let value: serde_json::Value =
        serde_json::from_str(contents).map_err(|e| InputError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("data") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(InputError::Malformed {
                    path: path.to_path_buf(),
                    message: "expected an array or an object with a `data` array".to_string(),
                })
            }
        },
        _ => {
            return Err(InputError::Malformed {
                path: path.to_path_buf(),
                message: "expected an array of pool records".to_string(),
            })
        }
    };

    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for item in items {
        match serde_json::from_value::<PoolRecord>(item) {
            Ok(record) if record.apr.is_finite() && record.tvl_usd.is_finite() => records.push(record),
            Ok(_) | Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        logger::debug(
            LogTag::Market,
            &format!("{}: skipped {} unusable pool record(s)", path.display(), skipped),
        );
    }

    Ok((records, skipped))
}

/// Turn pool records into observations, deriving changes from `previous`
pub fn build_observations(
    records: &[PoolRecord],
    previous: &BTreeMap<String, PoolSnapshot>,
    config: &IngestConfig,
) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();

    for (index, record) in records.iter().enumerate() {
        let key = record.key(index);
        let prior = previous.get(&key);

        outcome.snapshots.insert(
            key.clone(),
            PoolSnapshot {
                apr: record.apr,
                tvl_usd: record.tvl_usd,
            },
        );

        if record.tvl_usd < config.min_pool_tvl_usd {
            outcome.filtered_pools += 1;
            continue;
        }

        let sample = derive_sample(record, prior);
        outcome.observations.push(AssetObservation {
            asset: key,
            symbol: record.symbol.clone(),
            sample,
            base_score: record.score.unwrap_or(record.apr),
            apr: record.apr,
            tvl_usd: record.tvl_usd,
            volatility: record.volatility,
        });
    }

    outcome
}

fn derive_sample(record: &PoolRecord, prior: Option<&PoolSnapshot>) -> MetricSample {
    let apr_change_pct = record
        .apr_change_pct
        .or_else(|| prior.and_then(|p| pct_change(p.apr, record.apr)));
    let tvl_change_pct = record
        .tvl_change_pct
        .or_else(|| prior.and_then(|p| pct_change(p.tvl_usd, record.tvl_usd)));

    MetricSample {
        apr_change_pct,
        tvl_change_pct,
        slippage: record.slippage,
        tvl_drop_pct: record
            .tvl_drop_pct
            .or_else(|| tvl_change_pct.map(|c| (-c).max(0.0))),
        drawdown_pct: record.drawdown_pct,
        apr_spike_pct: record
            .apr_spike_pct
            .or_else(|| apr_change_pct.map(|c| c.max(0.0))),
        stablecoin_depeg_abs: record.stablecoin_price.map(|p| 1.0 - (p - 1.0).abs()),
    }
}

fn pct_change(previous: f64, current: f64) -> Option<f64> {
    if previous.abs() < CHANGE_BASE_EPSILON {
        return None;
    }
    Some((current - previous) / previous.abs() * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, apr: f64, tvl: f64) -> PoolRecord {
        serde_json::from_value(serde_json::json!({ "id": id, "apr": apr, "tvl_usd": tvl })).unwrap()
    }

    #[test]
    fn test_parse_array_and_wrapped_forms() {
        let path = Path::new("pools.json");
        let (a, _) = parse_pools(path, r#"[{"pool":"x","apy":4.0,"tvlUsd":1e6}]"#).unwrap();
        assert_eq!(a[0].id.as_deref(), Some("x"));
        assert_eq!(a[0].apr, 4.0);

        let (b, _) = parse_pools(path, r#"{"data":[{"apr":1.0,"tvl_usd":2.0}]}"#).unwrap();
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_bad_records_skipped_individually() {
        let path = Path::new("pools.json");
        let body = r#"[{"apr":1.0,"tvl_usd":5e5},{"apr":"high","tvl_usd":1.0},{"tvl_usd":3.0}]"#;
        let (records, skipped) = parse_pools(path, body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_non_json_is_input_error() {
        let err = parse_pools(Path::new("pools.json"), "apr,tvl\n1,2").unwrap_err();
        assert!(matches!(err, InputError::Malformed { .. }));
        let err = parse_pools(Path::new("pools.json"), "42").unwrap_err();
        assert!(matches!(err, InputError::Malformed { .. }));
    }

    #[test]
    fn test_changes_derived_from_snapshot() {
        let previous = BTreeMap::from([(
            "a".to_string(),
            PoolSnapshot {
                apr: 10.0,
                tvl_usd: 2_000_000.0,
            },
        )]);
        let outcome = build_observations(
            &[record("a", 12.0, 1_500_000.0)],
            &previous,
            &IngestConfig::default(),
        );
        let sample = &outcome.observations[0].sample;
        assert!((sample.apr_change_pct.unwrap() - 20.0).abs() < 1e-9);
        assert!((sample.tvl_change_pct.unwrap() + 25.0).abs() < 1e-9);
        assert!((sample.tvl_drop_pct.unwrap() - 25.0).abs() < 1e-9);
        assert!((sample.apr_spike_pct.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(outcome.snapshots["a"].apr, 12.0);
    }

    #[test]
    fn test_first_sighting_has_no_trend() {
        let outcome = build_observations(
            &[record("new", 5.0, 1_000_000.0)],
            &BTreeMap::new(),
            &IngestConfig::default(),
        );
        assert!(!outcome.observations[0].sample.has_trend());
        assert_eq!(outcome.observations[0].base_score, 5.0);
    }

    #[test]
    fn test_small_pools_filtered_but_snapshotted() {
        let outcome = build_observations(
            &[record("tiny", 50.0, 500.0)],
            &BTreeMap::new(),
            &IngestConfig::default(),
        );
        assert!(outcome.observations.is_empty());
        assert_eq!(outcome.filtered_pools, 1);
        assert!(outcome.snapshots.contains_key("tiny"));
    }

    #[test]
    fn test_stablecoin_peg_level() {
        let mut r = record("usdc-pool", 3.0, 5_000_000.0);
        r.stablecoin_price = Some(0.97);
        let outcome = build_observations(&[r], &BTreeMap::new(), &IngestConfig::default());
        let peg = outcome.observations[0].sample.stablecoin_depeg_abs.unwrap();
        assert!((peg - 0.97).abs() < 1e-12);
    }
}
