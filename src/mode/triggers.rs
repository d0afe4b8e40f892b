//! Risk triggers and their per-tier evaluation

use crate::config::{TriggerConfig, TriggerTable};
use crate::errors::{ensure_finite, ComputationError};
use crate::market::MetricSample;
use crate::types::ModeTier;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerName {
    Slippage,
    TvlDrop,
    Drawdown,
    AprSpike,
    StablecoinDepeg,
}

impl TriggerName {
    pub const ALL: [TriggerName; 5] = [
        TriggerName::Slippage,
        TriggerName::TvlDrop,
        TriggerName::Drawdown,
        TriggerName::AprSpike,
        TriggerName::StablecoinDepeg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerName::Slippage => "slippage",
            TriggerName::TvlDrop => "tvl_drop",
            TriggerName::Drawdown => "drawdown",
            TriggerName::AprSpike => "apr_spike",
            TriggerName::StablecoinDepeg => "stablecoin_depeg",
        }
    }

    /// Lower observed values are worse for inverted triggers
    pub fn inverted(&self) -> bool {
        matches!(self, TriggerName::StablecoinDepeg)
    }

    pub fn config<'a>(&self, table: &'a TriggerTable) -> &'a TriggerConfig {
        match self {
            TriggerName::Slippage => &table.slippage,
            TriggerName::TvlDrop => &table.tvl_drop,
            TriggerName::Drawdown => &table.drawdown,
            TriggerName::AprSpike => &table.apr_spike,
            TriggerName::StablecoinDepeg => &table.stablecoin_depeg,
        }
    }
}

impl fmt::Display for TriggerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// Value reached at least the TENSION bound
    Fired,
    /// Value present but below every bound
    Quiet,
    /// No sample carried the metric
    Unavailable,
    Disabled,
}

/// Outcome of one trigger for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResult {
    pub trigger_name: TriggerName,
    pub observed_value: Option<f64>,
    /// Highest tier whose bound the value meets; NORMAL when none
    pub tier_at_value: ModeTier,
    pub status: TriggerStatus,
}

impl TriggerResult {
    pub fn fired(&self) -> bool {
        self.status == TriggerStatus::Fired
    }
}

/// Worst-case trigger inputs aggregated over all assets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeInputs {
    pub slippage: Option<f64>,
    pub tvl_drop: Option<f64>,
    pub drawdown: Option<f64>,
    pub apr_spike: Option<f64>,
    pub stablecoin_depeg: Option<f64>,
}

fn worst(values: impl Iterator<Item = f64>, lower_is_worse: bool) -> Option<f64> {
    values.fold(None, |acc, v| match acc {
        None => Some(v),
        Some(a) if lower_is_worse => Some(if v < a || v.is_nan() { v } else { a }),
        Some(a) => Some(if v > a || v.is_nan() { v } else { a }),
    })
}

impl ModeInputs {
    /// Maximum of each metric across samples; minimum for the peg level
    ///
    /// NaN values are kept so the engine can reject them.
    pub fn from_samples(samples: &[MetricSample]) -> Self {
        Self {
            slippage: worst(samples.iter().filter_map(|s| s.slippage), false),
            tvl_drop: worst(samples.iter().filter_map(|s| s.tvl_drop_pct), false),
            drawdown: worst(samples.iter().filter_map(|s| s.drawdown_pct), false),
            apr_spike: worst(samples.iter().filter_map(|s| s.apr_spike_pct), false),
            stablecoin_depeg: worst(samples.iter().filter_map(|s| s.stablecoin_depeg_abs), true),
        }
    }

    pub fn value(&self, name: TriggerName) -> Option<f64> {
        match name {
            TriggerName::Slippage => self.slippage,
            TriggerName::TvlDrop => self.tvl_drop,
            TriggerName::Drawdown => self.drawdown,
            TriggerName::AprSpike => self.apr_spike,
            TriggerName::StablecoinDepeg => self.stablecoin_depeg,
        }
    }
}

/// Evaluate one trigger against its tier bounds
pub fn evaluate_trigger(
    name: TriggerName,
    value: Option<f64>,
    config: &TriggerConfig,
) -> Result<TriggerResult, ComputationError> {
    let quiet = |status| TriggerResult {
        trigger_name: name,
        observed_value: value,
        tier_at_value: ModeTier::Normal,
        status,
    };

    if !config.enabled {
        return Ok(quiet(TriggerStatus::Disabled));
    }
    let Some(value) = value else {
        return Ok(quiet(TriggerStatus::Unavailable));
    };
    let value = ensure_finite("mode", name.as_str(), value)?;

    for tier in ModeTier::ESCALATED_DESC {
        let Some(bound) = config.bound(tier) else {
            continue;
        };
        let met = if name.inverted() {
            value <= bound
        } else {
            value >= bound
        };
        if met {
            return Ok(TriggerResult {
                trigger_name: name,
                observed_value: Some(value),
                tier_at_value: tier,
                status: TriggerStatus::Fired,
            });
        }
    }

    Ok(quiet(TriggerStatus::Quiet))
}
