//! One decision cycle
//!
//! `run_cycle` is pure: pool records, confidence signals, the current
//! allocation and the previous `CycleState` in; a `CycleOutcome` (including
//! the next state) out. A stage that fails substitutes its safe default and
//! the failure is listed in `fallbacks`, so a cycle always completes.

use super::state::CycleState;
use crate::allocation::{
    apply_plan, evaluate_exit, plan_rebalance, resolve_policy, AllocationPolicy, AllocationState,
    ExitDirective, RebalancePlan,
};
use crate::config::StrategyConfig;
use crate::errors::ComputationError;
use crate::logger::{self, LogTag};
use crate::market::{build_observations, detect, MetricSample, PoolRecord, RegimeDecision};
use crate::mode::{evaluate_mode, ModeInputs, ModeState};
use crate::scoring::{adjust_score, ScoreAdjustment, ScoringContext};
use crate::signals::ConfidenceIndex;

pub struct CycleInputs<'a> {
    pub pools: &'a [PoolRecord],
    pub confidence: &'a ConfidenceIndex,
    pub allocation: &'a AllocationState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub cycle: u64,
    pub pools_used: usize,
    pub decision: RegimeDecision,
    pub mode_inputs: ModeInputs,
    pub mode: ModeState,
    pub policy: AllocationPolicy,
    /// Highest final score first
    pub scores: Vec<ScoreAdjustment>,
    pub plan: RebalancePlan,
    pub exit: ExitDirective,
    pub fallbacks: Vec<String>,
    /// Allocation after simulated execution, when a plan was applied
    pub applied_allocation: Option<AllocationState>,
    pub next_state: CycleState,
}

fn record_fallback(fallbacks: &mut Vec<String>, error: &ComputationError) {
    logger::warning(
        LogTag::Cycle,
        &format!("Stage {} failed, using safe default: {}", error.stage(), error),
    );
    fallbacks.push(format!("{}: {}", error.stage(), error));
}

pub fn run_cycle(inputs: &CycleInputs<'_>, config: &StrategyConfig, state: &CycleState) -> CycleOutcome {
    let cycle = state.cycle + 1;
    let mut fallbacks = Vec::new();

    let ingest = build_observations(inputs.pools, &state.snapshots, &config.ingest);
    let samples: Vec<MetricSample> = ingest.observations.iter().map(|o| o.sample.clone()).collect();

    let (decision, detector_state) = match detect(&samples, &config.detector, &state.detector) {
        Ok(result) => result,
        Err(e) => {
            record_fallback(&mut fallbacks, &e);
            let trend = samples.iter().filter(|s| s.has_trend()).count();
            (RegimeDecision::fallback(trend, &e), state.detector.clone())
        }
    };

    let mode_inputs = ModeInputs::from_samples(&samples);
    let mode = match evaluate_mode(&mode_inputs, &config.mode) {
        Ok(mode) => mode,
        Err(e) => {
            record_fallback(&mut fallbacks, &e);
            ModeState::fallback(&e)
        }
    };

    let policy = resolve_policy(decision.label, &config.policy);

    let context = ScoringContext {
        label: decision.label,
        tier: mode.tier,
    };
    let mut scores: Vec<ScoreAdjustment> = ingest
        .observations
        .iter()
        .map(|o| {
            let confidences = inputs.confidence.scores_for(&o.asset, o.symbol.as_deref());
            adjust_score(o, confidences, context, &config.scoring)
        })
        .collect();
    scores.sort_by(|a, b| b.final_score.total_cmp(&a.final_score).then_with(|| a.asset.cmp(&b.asset)));
    for score in &scores {
        for note in &score.fallbacks {
            fallbacks.push(format!("scoring[{}]: {}", score.asset, note));
        }
    }

    let total_usd = inputs.allocation.total();
    let plan = match plan_rebalance(decision.label, inputs.allocation, &policy, total_usd, &config.planner) {
        Ok(plan) => plan,
        Err(e) => {
            record_fallback(&mut fallbacks, &e);
            RebalancePlan::fallback(decision.label, total_usd, &e)
        }
    };

    let exit = evaluate_exit(mode.tier);
    if exit.exit {
        let buckets: Vec<&str> = exit.buckets_affected.iter().map(|b| b.as_str()).collect();
        logger::warning(
            LogTag::Exit,
            &format!("Exit directive {} for [{}]", exit.reason, buckets.join(", ")),
        );
    }

    let applied_allocation = (config.portfolio.simulate_execution && !exit.exit && !plan.is_empty())
        .then(|| apply_plan(inputs.allocation, &plan));

    CycleOutcome {
        cycle,
        pools_used: ingest.observations.len(),
        decision,
        mode_inputs,
        mode,
        policy,
        scores,
        plan,
        exit,
        fallbacks,
        applied_allocation,
        next_state: CycleState {
            cycle,
            detector: detector_state,
            snapshots: ingest.snapshots,
        },
    }
}
