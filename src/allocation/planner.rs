//! Rebalancing planner
//!
//! Turns the gap between the current allocation and the target policy into
//! per-bucket transfer actions, then applies the safety gates: minimum
//! portfolio size, minimum trade size, the defavorable risk block and the
//! per-cycle movement cap.

use super::policy::AllocationPolicy;
use crate::config::PlannerConfig;
use crate::errors::{ensure_finite, ComputationError};
use crate::logger::{self, LogTag};
use crate::types::{Bucket, RegimeLabel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STAGE: &str = "planner";

pub const CANCEL_BELOW_MINIMUM: &str = "portfolio_below_minimum";
pub const CANCEL_DEFAVORABLE_RISK: &str = "defavorable_blocks_risk_increase";

/// Current USD amount per bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationState {
    pub amounts: BTreeMap<Bucket, f64>,
}

impl AllocationState {
    /// Build from name-keyed amounts; unknown names and negative amounts are dropped
    pub fn from_named(named: &BTreeMap<String, f64>) -> Self {
        let mut amounts = BTreeMap::new();
        for (name, amount) in named {
            if let Some(bucket) = Bucket::from_name(name) {
                if amount.is_finite() && *amount >= 0.0 {
                    *amounts.entry(bucket).or_insert(0.0) += amount;
                }
            }
        }
        Self { amounts }
    }

    pub fn amount(&self, bucket: Bucket) -> f64 {
        self.amounts.get(&bucket).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.amounts.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceAction {
    pub bucket: Bucket,
    pub direction: Direction,
    pub amount_usd: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSafety {
    pub capped: bool,
    pub cancelled_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub context: RegimeLabel,
    pub total_usd: f64,
    pub actions: Vec<RebalanceAction>,
    pub safety: PlanSafety,
}

impl RebalancePlan {
    fn cancelled(context: RegimeLabel, total_usd: f64, reason: &str) -> Self {
        Self {
            context,
            total_usd,
            actions: Vec::new(),
            safety: PlanSafety {
                capped: false,
                cancelled_reason: Some(reason.to_string()),
            },
        }
    }

    /// Plan used when the planner stage itself failed
    pub fn fallback(context: RegimeLabel, total_usd: f64, error: &ComputationError) -> Self {
        let total = if total_usd.is_finite() { total_usd } else { 0.0 };
        Self::cancelled(context, total, &format!("fallback: {}", error))
    }

    pub fn moved_usd(&self) -> f64 {
        self.actions.iter().map(|a| a.amount_usd).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Compute the rebalancing plan for one cycle
///
/// Deterministic: the same inputs always give the same plan.
pub fn plan_rebalance(
    context: RegimeLabel,
    current: &AllocationState,
    policy: &AllocationPolicy,
    total_usd: f64,
    options: &PlannerConfig,
) -> Result<RebalancePlan, ComputationError> {
    if !total_usd.is_finite() || total_usd < options.min_total_usd {
        logger::debug(
            LogTag::Planner,
            &format!("Total {:.2} below minimum {:.2}, no plan", total_usd, options.min_total_usd),
        );
        return Ok(RebalancePlan::cancelled(
            context,
            if total_usd.is_finite() { total_usd } else { 0.0 },
            CANCEL_BELOW_MINIMUM,
        ));
    }

    let mut actions = Vec::new();
    for bucket in Bucket::ALL {
        let target = ensure_finite(STAGE, "policy", policy.fraction(bucket))? * total_usd;
        let delta = target - ensure_finite(STAGE, "current", current.amount(bucket))?;
        if delta.abs() < options.min_rebal_usd || delta == 0.0 {
            continue;
        }
        actions.push(RebalanceAction {
            bucket,
            direction: if delta > 0.0 {
                Direction::Increase
            } else {
                Direction::Decrease
            },
            amount_usd: delta.abs(),
        });
    }

    if context == RegimeLabel::Defavorable
        && actions
            .iter()
            .any(|a| a.bucket == Bucket::HIGHEST_RISK && a.direction == Direction::Increase)
    {
        logger::info(
            LogTag::Planner,
            &format!("Plan cancelled: defavorable context would increase {}", Bucket::HIGHEST_RISK),
        );
        return Ok(RebalancePlan::cancelled(context, total_usd, CANCEL_DEFAVORABLE_RISK));
    }

    let moved: f64 = actions.iter().map(|a| a.amount_usd).sum();
    let cap = options.max_shift_ratio * total_usd;
    let capped = moved > cap;
    if capped {
        let ratio = if moved > 0.0 { cap / moved } else { 0.0 };
        for action in &mut actions {
            action.amount_usd *= ratio;
        }
        logger::debug(
            LogTag::Planner,
            &format!("Movement {:.2} capped to {:.2} (ratio {:.4})", moved, cap, ratio),
        );
    }

    Ok(RebalancePlan {
        context,
        total_usd,
        actions,
        safety: PlanSafety {
            capped,
            cancelled_reason: None,
        },
    })
}

/// Simulated execution: move the plan's amounts between buckets
///
/// Deltas under `min_rebal_usd` are not in the plan, so its increases and
/// decreases need not balance. The difference is settled on the bucket with
/// the largest increase (the largest decrease when nothing increases), keeping
/// the simulated total unchanged.
pub fn apply_plan(state: &AllocationState, plan: &RebalancePlan) -> AllocationState {
    let mut next = state.clone();
    for bucket in Bucket::ALL {
        next.amounts.entry(bucket).or_insert(0.0);
    }
    for action in &plan.actions {
        let amount = next.amounts.entry(action.bucket).or_insert(0.0);
        match action.direction {
            Direction::Increase => *amount += action.amount_usd,
            Direction::Decrease => *amount = (*amount - action.amount_usd).max(0.0),
        }
    }

    let drift = next.total() - state.total();
    let settle_on = plan
        .actions
        .iter()
        .filter(|a| a.direction == Direction::Increase)
        .max_by(|a, b| a.amount_usd.total_cmp(&b.amount_usd))
        .or_else(|| plan.actions.iter().max_by(|a, b| a.amount_usd.total_cmp(&b.amount_usd)));
    if let Some(action) = settle_on {
        if drift.is_finite() && drift != 0.0 {
            let amount = next.amounts.entry(action.bucket).or_insert(0.0);
            *amount = (*amount - drift).max(0.0);
            logger::debug(
                LogTag::Planner,
                &format!("Settled {:+.2} of unplanned drift on {}", -drift, action.bucket),
            );
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::policy::PolicySource;

    fn state(prudent: f64, modere: f64, risque: f64) -> AllocationState {
        AllocationState {
            amounts: BTreeMap::from([
                (Bucket::Prudent, prudent),
                (Bucket::Modere, modere),
                (Bucket::Risque, risque),
            ]),
        }
    }

    fn policy(prudent: f64, modere: f64, risque: f64) -> AllocationPolicy {
        AllocationPolicy {
            fractions: BTreeMap::from([
                (Bucket::Prudent, prudent),
                (Bucket::Modere, modere),
                (Bucket::Risque, risque),
            ]),
            source: PolicySource::Exact,
        }
    }

    fn options() -> PlannerConfig {
        PlannerConfig {
            min_rebal_usd: 20.0,
            max_shift_ratio: 0.3,
            min_total_usd: 100.0,
        }
    }

    #[test]
    fn test_reference_scenario() {
        let plan = plan_rebalance(
            RegimeLabel::Neutre,
            &state(5000.0, 3000.0, 2000.0),
            &policy(0.4, 0.4, 0.2),
            10_000.0,
            &options(),
        )
        .unwrap();

        let summary: Vec<(Bucket, Direction)> =
            plan.actions.iter().map(|a| (a.bucket, a.direction)).collect();
        assert_eq!(
            summary,
            vec![
                (Bucket::Prudent, Direction::Decrease),
                (Bucket::Modere, Direction::Increase)
            ]
        );
        for action in &plan.actions {
            assert!((action.amount_usd - 1000.0).abs() < 1e-6);
        }
        assert!(!plan.safety.capped);
        assert_eq!(plan.safety.cancelled_reason, None);
    }

    #[test]
    fn test_defavorable_blocks_risk_increase() {
        let plan = plan_rebalance(
            RegimeLabel::Defavorable,
            &state(5000.0, 3000.0, 2000.0),
            &policy(0.3, 0.2, 0.5),
            10_000.0,
            &options(),
        )
        .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.safety.cancelled_reason.as_deref(), Some(CANCEL_DEFAVORABLE_RISK));
    }

    #[test]
    fn test_defavorable_allows_risk_decrease() {
        let plan = plan_rebalance(
            RegimeLabel::Defavorable,
            &state(5000.0, 3000.0, 2000.0),
            &policy(0.6, 0.3, 0.1),
            10_000.0,
            &options(),
        )
        .unwrap();
        assert_eq!(plan.actions.len(), 2);
        assert_eq!(plan.safety.cancelled_reason, None);
    }

    #[test]
    fn test_small_portfolio_and_nan_total() {
        let plan = plan_rebalance(
            RegimeLabel::Neutre,
            &state(50.0, 0.0, 0.0),
            &policy(0.4, 0.4, 0.2),
            50.0,
            &options(),
        )
        .unwrap();
        assert_eq!(plan.safety.cancelled_reason.as_deref(), Some(CANCEL_BELOW_MINIMUM));

        let plan = plan_rebalance(
            RegimeLabel::Neutre,
            &state(50.0, 0.0, 0.0),
            &policy(0.4, 0.4, 0.2),
            f64::NAN,
            &options(),
        )
        .unwrap();
        assert_eq!(plan.safety.cancelled_reason.as_deref(), Some(CANCEL_BELOW_MINIMUM));
        assert_eq!(plan.total_usd, 0.0);
    }

    #[test]
    fn test_movement_cap_scales_uniformly() {
        let plan = plan_rebalance(
            RegimeLabel::Favorable,
            &state(10_000.0, 0.0, 0.0),
            &policy(0.0, 0.5, 0.5),
            10_000.0,
            &options(),
        )
        .unwrap();
        assert!(plan.safety.capped);
        assert!(plan.moved_usd() <= 0.3 * 10_000.0 + 1e-6);
        // 20_000 requested, scaled by 0.15
        assert!((plan.actions[0].amount_usd - 1500.0).abs() < 1e-6);
        assert!((plan.actions[1].amount_usd - 750.0).abs() < 1e-6);
    }

    #[test]
    fn test_immaterial_deltas_dropped() {
        let plan = plan_rebalance(
            RegimeLabel::Neutre,
            &state(4010.0, 3990.0, 2000.0),
            &policy(0.4, 0.4, 0.2),
            10_000.0,
            &options(),
        )
        .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.safety.cancelled_reason, None);
    }

    #[test]
    fn test_planner_is_idempotent() {
        let args = (state(7000.0, 2000.0, 1000.0), policy(0.2, 0.4, 0.4));
        let a = plan_rebalance(RegimeLabel::Favorable, &args.0, &args.1, 10_000.0, &options()).unwrap();
        let b = plan_rebalance(RegimeLabel::Favorable, &args.0, &args.1, 10_000.0, &options()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_apply_plan_moves_amounts() {
        let current = state(5000.0, 3000.0, 2000.0);
        let plan = plan_rebalance(
            RegimeLabel::Neutre,
            &current,
            &policy(0.4, 0.4, 0.2),
            10_000.0,
            &options(),
        )
        .unwrap();
        let next = apply_plan(&current, &plan);
        assert_eq!(next.amount(Bucket::Prudent), 4000.0);
        assert_eq!(next.amount(Bucket::Modere), 4000.0);
        assert!((next.total() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_plan_keeps_total_when_deltas_dropped() {
        // Risque is 15 over target, below min_rebal_usd, so only 50 leaves Prudent
        // while 65 is planned into Modere
        let current = state(4050.0, 3935.0, 2015.0);
        let plan = plan_rebalance(
            RegimeLabel::Neutre,
            &current,
            &policy(0.4, 0.4, 0.2),
            10_000.0,
            &options(),
        )
        .unwrap();
        assert_eq!(plan.actions.len(), 2);

        let next = apply_plan(&current, &plan);
        assert!((next.total() - current.total()).abs() < 1e-9);
        assert!((next.amount(Bucket::Prudent) - 4000.0).abs() < 1e-9);
        assert!((next.amount(Bucket::Modere) - 3985.0).abs() < 1e-9);
        assert!((next.amount(Bucket::Risque) - 2015.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_named_ignores_unknown() {
        let named = BTreeMap::from([
            ("prudent".to_string(), 100.0),
            ("Exotic".to_string(), 50.0),
            ("Risque".to_string(), -10.0),
        ]);
        let s = AllocationState::from_named(&named);
        assert_eq!(s.total(), 100.0);
    }
}
