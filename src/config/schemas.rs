/// Configuration schemas - every strategy table defined once with defaults
///
/// Each section is declared with the `config_struct!` macro which provides:
/// - Single-source definition (no repetition)
/// - Embedded defaults
/// - Serde support with per-field defaults
///
/// Only `schema_version` and `[policy]` are required in the file; every other
/// table falls back to the defaults below.
use crate::config_struct;
use crate::types::{ModeTier, RegimeLabel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version this build understands
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// ROOT
// ============================================================================

/// Full strategy configuration as read from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub schema_version: u32,

    /// Target bucket fractions keyed by regime label, then by bucket name
    pub policy: BTreeMap<String, BTreeMap<String, f64>>,

    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub mode: ModeConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            schema_version: SUPPORTED_SCHEMA_VERSION,
            policy: default_policy_table(),
            detector: DetectorConfig::default(),
            mode: ModeConfig::default(),
            scoring: ScoringConfig::default(),
            planner: PlannerConfig::default(),
            portfolio: PortfolioConfig::default(),
            journal: JournalConfig::default(),
            ingest: IngestConfig::default(),
            observer: ObserverConfig::default(),
        }
    }
}

fn split(prudent: f64, modere: f64, risque: f64) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("Prudent".to_string(), prudent),
        ("Modere".to_string(), modere),
        ("Risque".to_string(), risque),
    ])
}

/// Policy table used by `StrategyConfig::default()`
pub fn default_policy_table() -> BTreeMap<String, BTreeMap<String, f64>> {
    BTreeMap::from([
        (RegimeLabel::Favorable.as_str().to_string(), split(0.2, 0.4, 0.4)),
        (RegimeLabel::Neutre.as_str().to_string(), split(0.4, 0.4, 0.2)),
        (RegimeLabel::Defavorable.as_str().to_string(), split(0.6, 0.3, 0.1)),
    ])
}

// ============================================================================
// MARKET CONTEXT DETECTOR
// ============================================================================

config_struct! {
    /// Regime detection thresholds (change percentages are in %)
    pub struct DetectorConfig {
        apr_up_threshold: f64 = 5.0,
        apr_down_threshold: f64 = -5.0,
        tvl_up_threshold: f64 = 3.0,
        tvl_down_threshold: f64 = -3.0,

        /// Fewer samples than this keeps the previous label
        min_samples: usize = 3,

        /// EMA weight of the newest raw score (1.0 = no smoothing)
        smoothing_alpha: f64 = 0.5,

        /// Cycles a new label is held before it may change again
        cooldown_cycles: u32 = 3,

        /// Band around a crossed threshold where a one-step change is refused
        hysteresis_margin: f64 = 0.1,

        weight_apr: f64 = 0.5,
        weight_tvl: f64 = 0.5,

        /// Classification thresholds in normalized score space
        score_up_threshold: f64 = 1.0,
        score_down_threshold: f64 = -1.0,
    }
}

// ============================================================================
// MODE ESCALATION
// ============================================================================

config_struct! {
    /// Per-tier bounds of one risk trigger
    pub struct TriggerConfig {
        enabled: bool = true,
        tension: f64 = 0.0,
        alerte: f64 = 0.0,
        crise: f64 = 0.0,
        panic: f64 = 0.0,
    }
}

impl TriggerConfig {
    pub fn with_bounds(tension: f64, alerte: f64, crise: f64, panic: f64) -> Self {
        Self {
            enabled: true,
            tension,
            alerte,
            crise,
            panic,
        }
    }

    /// Bound for an escalated tier; `None` for NORMAL
    pub fn bound(&self, tier: ModeTier) -> Option<f64> {
        match tier {
            ModeTier::Normal => None,
            ModeTier::Tension => Some(self.tension),
            ModeTier::Alerte => Some(self.alerte),
            ModeTier::Crise => Some(self.crise),
            ModeTier::Panic => Some(self.panic),
        }
    }
}

config_struct! {
    /// Trigger table; `stablecoin_depeg` is compared inverted (lower = worse)
    pub struct TriggerTable {
        /// Worst pool slippage, %
        slippage: TriggerConfig = TriggerConfig::with_bounds(1.0, 2.0, 3.5, 6.0),
        /// Worst TVL drop since previous cycle, %
        tvl_drop: TriggerConfig = TriggerConfig::with_bounds(10.0, 20.0, 35.0, 50.0),
        /// Worst drawdown, %
        drawdown: TriggerConfig = TriggerConfig::with_bounds(5.0, 10.0, 20.0, 35.0),
        /// Worst APR jump since previous cycle, %
        apr_spike: TriggerConfig = TriggerConfig::with_bounds(50.0, 100.0, 200.0, 400.0),
        /// Lowest stablecoin peg level (1.0 = on peg)
        stablecoin_depeg: TriggerConfig = TriggerConfig::with_bounds(0.995, 0.99, 0.98, 0.95),
    }
}

config_struct! {
    /// Minimum number of corroborating triggers per tier
    pub struct TierCounts {
        tension: u32 = 1,
        alerte: u32 = 1,
        crise: u32 = 1,
        panic: u32 = 1,
    }
}

impl TierCounts {
    pub fn for_tier(&self, tier: ModeTier) -> u32 {
        match tier {
            ModeTier::Normal => 0,
            ModeTier::Tension => self.tension,
            ModeTier::Alerte => self.alerte,
            ModeTier::Crise => self.crise,
            ModeTier::Panic => self.panic,
        }
    }
}

config_struct! {
    pub struct ModeConfig {
        triggers: TriggerTable = TriggerTable::default(),
        min_trigger_count: TierCounts = TierCounts::default(),
    }
}

// ============================================================================
// SCORING
// ============================================================================

config_struct! {
    /// Score multiplier per regime label
    pub struct ContextCoeffs {
        favorable: f64 = 1.08,
        neutre: f64 = 1.0,
        defavorable: f64 = 0.90,
        inconnu: f64 = 1.0,
    }
}

impl ContextCoeffs {
    pub fn for_label(&self, label: RegimeLabel) -> f64 {
        match label {
            RegimeLabel::Favorable => self.favorable,
            RegimeLabel::Neutre => self.neutre,
            RegimeLabel::Defavorable => self.defavorable,
            RegimeLabel::Inconnu => self.inconnu,
        }
    }
}

/// Confidence band: mean confidence at or above `min` maps to `coeff`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub min: f64,
    pub coeff: f64,
}

/// Which side of a bound a ladder step matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LadderDirection {
    /// Step matches when value >= bound
    Above,
    /// Step matches when value < bound
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderStep {
    pub bound: f64,
    pub coeff: f64,
}

/// Threshold ladder: the first matching step wins, no match gives 1.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLadder {
    pub direction: LadderDirection,
    pub steps: Vec<LadderStep>,
}

impl ThresholdLadder {
    pub fn above(steps: &[(f64, f64)]) -> Self {
        Self::build(LadderDirection::Above, steps)
    }

    pub fn below(steps: &[(f64, f64)]) -> Self {
        Self::build(LadderDirection::Below, steps)
    }

    fn build(direction: LadderDirection, steps: &[(f64, f64)]) -> Self {
        Self {
            direction,
            steps: steps
                .iter()
                .map(|&(bound, coeff)| LadderStep { bound, coeff })
                .collect(),
        }
    }
}

config_struct! {
    /// Score multipliers applied while a tier is active
    pub struct ModeOverride {
        /// `false` removes the tier's override, giving a multiplier of 1.0
        enabled: bool = true,
        risk_mult: f64 = 1.0,
        apr_mult: f64 = 1.0,
        tvl_mult: f64 = 1.0,
    }
}

config_struct! {
    /// Per-tier overrides; NORMAL never has one
    pub struct ModeOverrides {
        tension: Option<ModeOverride> = Some(ModeOverride { enabled: true, risk_mult: 0.97, apr_mult: 0.98, tvl_mult: 1.0 }),
        alerte: Option<ModeOverride> = Some(ModeOverride { enabled: true, risk_mult: 0.92, apr_mult: 0.95, tvl_mult: 1.0 }),
        crise: Option<ModeOverride> = Some(ModeOverride { enabled: true, risk_mult: 0.85, apr_mult: 0.90, tvl_mult: 0.95 }),
        panic: Option<ModeOverride> = Some(ModeOverride { enabled: true, risk_mult: 0.70, apr_mult: 0.80, tvl_mult: 0.90 }),
    }
}

impl ModeOverrides {
    /// Active override for `tier`; disabled entries count as absent
    pub fn for_tier(&self, tier: ModeTier) -> Option<&ModeOverride> {
        let entry = match tier {
            ModeTier::Normal => None,
            ModeTier::Tension => self.tension.as_ref(),
            ModeTier::Alerte => self.alerte.as_ref(),
            ModeTier::Crise => self.crise.as_ref(),
            ModeTier::Panic => self.panic.as_ref(),
        };
        entry.filter(|o| o.enabled)
    }
}

config_struct! {
    pub struct ScoringConfig {
        ai_coeff_min: f64 = 0.9,
        ai_coeff_max: f64 = 1.1,
        risk_coeff_min: f64 = 0.8,
        risk_coeff_max: f64 = 1.05,

        /// penalty = 1 / (1 + k * slippage / slippage_ref_pct)
        slippage_k: f64 = 0.5,
        slippage_ref_pct: f64 = 1.0,
        slippage_penalty_min: f64 = 0.5,

        context_coeffs: ContextCoeffs = ContextCoeffs::default(),

        /// Bands checked in order; keep them sorted by descending `min`
        ai_bands: Vec<ConfidenceBand> = vec![
            ConfidenceBand { min: 0.80, coeff: 1.10 },
            ConfidenceBand { min: 0.65, coeff: 1.05 },
            ConfidenceBand { min: 0.50, coeff: 1.00 },
            ConfidenceBand { min: 0.35, coeff: 0.95 },
            ConfidenceBand { min: 0.00, coeff: 0.90 },
        ],

        /// APR in %
        apr_ladder: ThresholdLadder = ThresholdLadder::above(&[(200.0, 0.85), (100.0, 0.92), (50.0, 0.97), (5.0, 1.02)]),
        /// TVL in USD
        liquidity_ladder: ThresholdLadder = ThresholdLadder::below(&[(100_000.0, 0.90), (1_000_000.0, 0.96)]),
        /// Annualized volatility as a fraction
        volatility_ladder: ThresholdLadder = ThresholdLadder::above(&[(0.5, 0.90), (0.25, 0.95)]),

        mode_overrides: ModeOverrides = ModeOverrides::default(),
    }
}

// ============================================================================
// PLANNER / PORTFOLIO
// ============================================================================

config_struct! {
    /// Rebalancing safety options
    pub struct PlannerConfig {
        /// Deltas smaller than this are not worth moving
        min_rebal_usd: f64 = 20.0,
        /// Cap on total movement per cycle, fraction of portfolio
        max_shift_ratio: f64 = 0.3,
        /// Portfolios below this are never rebalanced
        min_total_usd: f64 = 100.0,
    }
}

config_struct! {
    pub struct PortfolioConfig {
        /// Apply plans to the allocation state and journal the result
        simulate_execution: bool = true,
        /// Used until the allocation journal holds a state
        initial_allocation: BTreeMap<String, f64> = split(5000.0, 3000.0, 2000.0),
    }
}

// ============================================================================
// JOURNAL / INGEST / OBSERVER
// ============================================================================

config_struct! {
    /// Advisory lock and tail-read tuning shared by all journals
    pub struct JournalConfig {
        lock_timeout_ms: u64 = 2_000,
        lock_poll_ms: u64 = 50,
        stale_lock_secs: u64 = 30,
        read_wait_timeout_ms: u64 = 1_000,
        /// External signal records considered per cycle
        signal_tail_lines: usize = 200,
    }
}

config_struct! {
    pub struct IngestConfig {
        /// Pools below this TVL are ignored entirely
        min_pool_tvl_usd: f64 = 10_000.0,
    }
}

config_struct! {
    pub struct ObserverConfig {
        /// Tier at or above which a cycle is reported
        alert_tier: ModeTier = ModeTier::Alerte,
        /// Silence on the signals journal longer than this is reported
        stale_after_secs: u64 = 900,
        tail_lines: usize = 50,
    }
}
