//! Mode escalation engine
//!
//! Evaluates every trigger, then walks tiers from PANIC downwards and keeps
//! the first tier with enough corroborating triggers at or above it.

use super::triggers::{evaluate_trigger, ModeInputs, TriggerName, TriggerResult};
use crate::config::{ModeConfig, TierCounts};
use crate::errors::ComputationError;
use crate::logger::{self, LogTag};
use crate::types::ModeTier;
use serde::{Deserialize, Serialize};

/// Escalation state for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeState {
    pub tier: ModeTier,
    pub fired_triggers: Vec<TriggerResult>,
    /// Every trigger including quiet, unavailable and disabled ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evaluated: Vec<TriggerResult>,
    pub rule_applied: String,
}

impl ModeState {
    pub fn normal(rule: impl Into<String>) -> Self {
        Self {
            tier: ModeTier::Normal,
            fired_triggers: Vec::new(),
            evaluated: Vec::new(),
            rule_applied: rule.into(),
        }
    }

    /// State used when the engine itself failed
    pub fn fallback(error: &ComputationError) -> Self {
        Self::normal(format!("fallback: {}", error))
    }
}

/// Pick the tier from evaluated triggers
pub fn aggregate(results: &[TriggerResult], counts: &TierCounts) -> (ModeTier, String) {
    let fired: Vec<ModeTier> = results
        .iter()
        .filter(|r| r.fired())
        .map(|r| r.tier_at_value)
        .collect();

    for tier in ModeTier::ESCALATED_DESC {
        let needed = counts.for_tier(tier).max(1) as usize;
        let at_or_above = fired.iter().filter(|t| **t >= tier).count();
        if at_or_above >= needed {
            return (
                tier,
                format!("{}: {}/{} trigger(s) at or above", tier, at_or_above, needed),
            );
        }
    }

    if fired.is_empty() {
        (ModeTier::Normal, "no_trigger_fired".to_string())
    } else {
        (ModeTier::Normal, "insufficient_corroboration".to_string())
    }
}

/// Evaluate all triggers and aggregate them into a tier
pub fn evaluate_mode(inputs: &ModeInputs, config: &ModeConfig) -> Result<ModeState, ComputationError> {
    let mut evaluated = Vec::with_capacity(TriggerName::ALL.len());
    for name in TriggerName::ALL {
        evaluated.push(evaluate_trigger(
            name,
            inputs.value(name),
            name.config(&config.triggers),
        )?);
    }

    let (tier, rule_applied) = aggregate(&evaluated, &config.min_trigger_count);
    let fired_triggers: Vec<TriggerResult> = evaluated.iter().filter(|r| r.fired()).cloned().collect();

    if tier > ModeTier::Normal {
        let names: Vec<String> = fired_triggers
            .iter()
            .map(|r| format!("{}={}", r.trigger_name, r.tier_at_value))
            .collect();
        logger::info(
            LogTag::Mode,
            &format!("Mode {} ({}) [{}]", tier, rule_applied, names.join(", ")),
        );
    } else {
        logger::debug(LogTag::Mode, &format!("Mode NORMAL ({})", rule_applied));
    }

    Ok(ModeState {
        tier,
        fired_triggers,
        evaluated,
        rule_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriggerConfig;

    fn base_inputs() -> ModeInputs {
        ModeInputs {
            slippage: Some(0.2),
            tvl_drop: Some(0.0),
            drawdown: Some(0.0),
            apr_spike: Some(0.0),
            stablecoin_depeg: Some(1.0),
        }
    }

    #[test]
    fn test_calm_market_is_normal() {
        let state = evaluate_mode(&base_inputs(), &ModeConfig::default()).unwrap();
        assert_eq!(state.tier, ModeTier::Normal);
        assert!(state.fired_triggers.is_empty());
        assert_eq!(state.evaluated.len(), 5);
    }

    #[test]
    fn test_single_panic_trigger_escalates_by_default() {
        let mut inputs = base_inputs();
        inputs.slippage = Some(7.0);
        let state = evaluate_mode(&inputs, &ModeConfig::default()).unwrap();
        assert_eq!(state.tier, ModeTier::Panic);
        assert_eq!(state.fired_triggers.len(), 1);
    }

    #[test]
    fn test_panic_with_corroboration_required() {
        let mut config = ModeConfig::default();
        config.min_trigger_count.panic = 2;
        let mut inputs = base_inputs();
        inputs.slippage = Some(7.0);
        let state = evaluate_mode(&inputs, &config).unwrap();
        // one PANIC-level trigger, PANIC needs two: falls to CRISE
        assert_eq!(state.tier, ModeTier::Crise);

        inputs.tvl_drop = Some(55.0);
        let state = evaluate_mode(&inputs, &config).unwrap();
        assert_eq!(state.tier, ModeTier::Panic);
        assert_eq!(state.fired_triggers.len(), 2);
    }

    #[test]
    fn test_raising_trigger_counts_never_raises_tier() {
        // Two triggers at PANIC, one at ALERTE, one at TENSION
        let mut inputs = base_inputs();
        inputs.slippage = Some(7.0);
        inputs.tvl_drop = Some(55.0);
        inputs.drawdown = Some(12.0);
        inputs.apr_spike = Some(60.0);

        for tier in ModeTier::ESCALATED_DESC {
            let mut config = ModeConfig::default();
            let mut previous = evaluate_mode(&inputs, &config).unwrap().tier;
            for count in 1..=6 {
                match tier {
                    ModeTier::Tension => config.min_trigger_count.tension = count,
                    ModeTier::Alerte => config.min_trigger_count.alerte = count,
                    ModeTier::Crise => config.min_trigger_count.crise = count,
                    ModeTier::Panic => config.min_trigger_count.panic = count,
                    ModeTier::Normal => unreachable!(),
                }
                let current = evaluate_mode(&inputs, &config).unwrap().tier;
                assert!(current <= previous, "{} count {} raised the tier", tier, count);
                previous = current;
            }
        }
    }

    #[test]
    fn test_crise_example() {
        let mut inputs = base_inputs();
        inputs.tvl_drop = Some(40.0);
        let state = evaluate_mode(&inputs, &ModeConfig::default()).unwrap();
        assert_eq!(state.tier, ModeTier::Crise);
        assert!(state.rule_applied.starts_with("CRISE"));
    }

    #[test]
    fn test_disabled_trigger_never_counts() {
        let mut config = ModeConfig::default();
        config.triggers.slippage = TriggerConfig {
            enabled: false,
            ..config.triggers.slippage.clone()
        };
        let mut inputs = base_inputs();
        inputs.slippage = Some(50.0);
        let state = evaluate_mode(&inputs, &config).unwrap();
        assert_eq!(state.tier, ModeTier::Normal);
    }

    #[test]
    fn test_non_finite_input_is_error() {
        let mut inputs = base_inputs();
        inputs.drawdown = Some(f64::INFINITY);
        assert!(evaluate_mode(&inputs, &ModeConfig::default()).is_err());
    }

    #[test]
    fn test_tier_is_monotonic_in_each_trigger() {
        let config = ModeConfig::default();
        let grid = [0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 40.0, 60.0, 150.0, 300.0, 500.0];
        for name in TriggerName::ALL {
            if name.inverted() {
                continue;
            }
            for other in [0.0, 3.0, 60.0] {
                let mut previous = ModeTier::Normal;
                for value in grid {
                    let mut inputs = base_inputs();
                    inputs.slippage = Some(other);
                    match name {
                        TriggerName::Slippage => inputs.slippage = Some(value),
                        TriggerName::TvlDrop => inputs.tvl_drop = Some(value),
                        TriggerName::Drawdown => inputs.drawdown = Some(value),
                        TriggerName::AprSpike => inputs.apr_spike = Some(value),
                        TriggerName::StablecoinDepeg => unreachable!(),
                    }
                    let tier = evaluate_mode(&inputs, &config).unwrap().tier;
                    assert!(tier >= previous, "{} at {} regressed", name, value);
                    previous = tier;
                }
            }
        }
    }

    #[test]
    fn test_depeg_monotonic_as_peg_worsens() {
        let config = ModeConfig::default();
        let mut previous = ModeTier::Normal;
        for peg in [1.0, 0.996, 0.993, 0.985, 0.96, 0.9, 0.5] {
            let mut inputs = base_inputs();
            inputs.stablecoin_depeg = Some(peg);
            let tier = evaluate_mode(&inputs, &config).unwrap().tier;
            assert!(tier >= previous);
            previous = tier;
        }
    }
}
