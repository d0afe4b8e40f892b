//! Market input types: raw pool records and the per-asset metric sample

use serde::{Deserialize, Serialize};

/// One asset's point-in-time metrics; every field is optional
///
/// Percentages are expressed in % (5.0 = 5%). `stablecoin_depeg_abs` is the
/// peg level of the stablecoin leg, `1 - |price - 1|`, so 1.0 is on peg and
/// lower is worse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub apr_change_pct: Option<f64>,
    pub tvl_change_pct: Option<f64>,
    pub slippage: Option<f64>,
    pub tvl_drop_pct: Option<f64>,
    pub drawdown_pct: Option<f64>,
    pub apr_spike_pct: Option<f64>,
    pub stablecoin_depeg_abs: Option<f64>,
}

impl MetricSample {
    /// Whether the sample carries anything the regime detector can use
    pub fn has_trend(&self) -> bool {
        self.apr_change_pct.is_some() || self.tvl_change_pct.is_some()
    }
}

/// One record of the pool statistics file
///
/// Only `apr` and `tvl_usd` are required. Field aliases accept the common
/// aggregator spellings (`apy`, `tvlUsd`, `apyPct1D`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolRecord {
    #[serde(default, alias = "pool")]
    pub id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(alias = "apy")]
    pub apr: f64,
    #[serde(alias = "tvlUsd")]
    pub tvl_usd: f64,
    #[serde(default, alias = "apyPct1D")]
    pub apr_change_pct: Option<f64>,
    #[serde(default)]
    pub tvl_change_pct: Option<f64>,
    /// Expected slippage for a standard trade, %
    #[serde(default)]
    pub slippage: Option<f64>,
    #[serde(default)]
    pub tvl_drop_pct: Option<f64>,
    #[serde(default)]
    pub drawdown_pct: Option<f64>,
    #[serde(default)]
    pub apr_spike_pct: Option<f64>,
    /// Annualized volatility as a fraction
    #[serde(default, alias = "sigma")]
    pub volatility: Option<f64>,
    /// Price of the stablecoin leg in USD, when the pool has one
    #[serde(default)]
    pub stablecoin_price: Option<f64>,
    /// Upstream ranking score; defaults to the APR
    #[serde(default)]
    pub score: Option<f64>,
}

impl PoolRecord {
    /// Stable key used to match a pool across cycles
    pub fn key(&self, index: usize) -> String {
        self.id
            .clone()
            .or_else(|| self.symbol.clone())
            .unwrap_or_else(|| format!("pool-{}", index))
    }
}

/// What is remembered about a pool between cycles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub apr: f64,
    pub tvl_usd: f64,
}

/// A pool after ingestion: its metric sample plus scoring inputs
#[derive(Debug, Clone, PartialEq)]
pub struct AssetObservation {
    pub asset: String,
    pub symbol: Option<String>,
    pub sample: MetricSample,
    pub base_score: f64,
    pub apr: f64,
    pub tvl_usd: f64,
    pub volatility: Option<f64>,
}
