//! Per-asset score adjustment
//!
//! `final = max(0, base × context × ai × risk × mode × slippage)`. A
//! coefficient whose input is non-finite becomes 1.0 and the fallback is
//! recorded on the adjustment.

use super::coefficients::{ai_coeff, context_coeff, mode_coeff, risk_coeff, slippage_penalty};
use crate::config::ScoringConfig;
use crate::errors::ComputationError;
use crate::logger::{self, LogTag};
use crate::market::AssetObservation;
use crate::types::{ModeTier, RegimeLabel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreAdjustment {
    pub asset: String,
    pub base_score: f64,
    pub context_coeff: f64,
    pub ai_coeff: f64,
    pub risk_coeff: f64,
    pub mode_coeff: f64,
    pub slippage_penalty: f64,
    pub final_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<String>,
}

/// Cycle-wide inputs shared by every asset
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext {
    pub label: RegimeLabel,
    pub tier: ModeTier,
}

fn or_neutral(result: Result<f64, ComputationError>, name: &str, fallbacks: &mut Vec<String>) -> f64 {
    match result {
        Ok(value) => value,
        Err(e) => {
            fallbacks.push(format!("{}: {}", name, e));
            1.0
        }
    }
}

pub fn adjust_score(
    asset: &AssetObservation,
    confidences: &[f64],
    context: ScoringContext,
    config: &ScoringConfig,
) -> ScoreAdjustment {
    let mut fallbacks = Vec::new();

    let base_score = if asset.base_score.is_finite() {
        asset.base_score
    } else {
        fallbacks.push("base_score: non-finite, using 0".to_string());
        0.0
    };

    let context_coeff = context_coeff(context.label, config);
    let ai_coeff = or_neutral(ai_coeff(confidences, config), "ai_coeff", &mut fallbacks);
    let risk_coeff = or_neutral(
        risk_coeff(asset.apr, asset.tvl_usd, asset.volatility, config),
        "risk_coeff",
        &mut fallbacks,
    );
    let mode_coeff = mode_coeff(context.tier, config);
    let slippage_penalty = or_neutral(
        slippage_penalty(asset.sample.slippage, config),
        "slippage_penalty",
        &mut fallbacks,
    );

    let product = base_score * context_coeff * ai_coeff * risk_coeff * mode_coeff * slippage_penalty;
    let final_score = if product.is_finite() { product.max(0.0) } else { 0.0 };

    if !fallbacks.is_empty() {
        logger::warning(
            LogTag::Scoring,
            &format!("{}: coefficient fallback ({})", asset.asset, fallbacks.join("; ")),
        );
    }
    logger::verbose(
        LogTag::Scoring,
        &format!(
            "{} base={:.4} ctx={:.3} ai={:.3} risk={:.3} mode={:.3} slip={:.3} -> {:.4}",
            asset.asset, base_score, context_coeff, ai_coeff, risk_coeff, mode_coeff, slippage_penalty, final_score
        ),
    );

    ScoreAdjustment {
        asset: asset.asset.clone(),
        base_score,
        context_coeff,
        ai_coeff,
        risk_coeff,
        mode_coeff,
        slippage_penalty,
        final_score,
        fallbacks,
    }
}
