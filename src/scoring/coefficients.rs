/// Correction coefficients applied to an asset's base score
///
/// One function per coefficient. Functions that take market numbers fail on
/// non-finite input so the adjuster can record the fallback.
use crate::config::{LadderDirection, ScoringConfig, ThresholdLadder};
use crate::errors::{ensure_finite, ComputationError};
use crate::types::{ModeTier, RegimeLabel};

const STAGE: &str = "scoring";

pub fn context_coeff(label: RegimeLabel, config: &ScoringConfig) -> f64 {
    config.context_coeffs.for_label(label)
}

/// Band lookup on the mean of confidence scores in [0, 1]; 1.0 without data
pub fn ai_coeff(confidences: &[f64], config: &ScoringConfig) -> Result<f64, ComputationError> {
    if confidences.is_empty() {
        return Ok(1.0);
    }
    for value in confidences {
        ensure_finite(STAGE, "confidence", *value)?;
    }
    let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
    let coeff = config
        .ai_bands
        .iter()
        .find(|band| mean >= band.min)
        .map_or(1.0, |band| band.coeff);
    Ok(coeff.clamp(config.ai_coeff_min, config.ai_coeff_max))
}

/// First matching ladder step, or 1.0
pub fn ladder_coeff(ladder: &ThresholdLadder, value: f64) -> f64 {
    ladder
        .steps
        .iter()
        .find(|step| match ladder.direction {
            LadderDirection::Above => value >= step.bound,
            LadderDirection::Below => value < step.bound,
        })
        .map_or(1.0, |step| step.coeff)
}

/// Product of the APR, liquidity and volatility ladders, clamped
pub fn risk_coeff(
    apr: f64,
    tvl_usd: f64,
    volatility: Option<f64>,
    config: &ScoringConfig,
) -> Result<f64, ComputationError> {
    let apr = ensure_finite(STAGE, "apr", apr)?;
    let tvl = ensure_finite(STAGE, "tvl_usd", tvl_usd)?;
    let mut product = ladder_coeff(&config.apr_ladder, apr.abs()) * ladder_coeff(&config.liquidity_ladder, tvl);
    if let Some(vol) = volatility {
        product *= ladder_coeff(&config.volatility_ladder, ensure_finite(STAGE, "volatility", vol)?);
    }
    Ok(product.clamp(config.risk_coeff_min, config.risk_coeff_max))
}

/// Mean of the tier override multipliers; 1.0 when the tier has none
pub fn mode_coeff(tier: ModeTier, config: &ScoringConfig) -> f64 {
    match config.mode_overrides.for_tier(tier) {
        Some(o) => (o.risk_mult + o.apr_mult + o.tvl_mult) / 3.0,
        None => 1.0,
    }
}

/// `1 / (1 + k * slippage / ref)`, clamped to [min, 1]; 1.0 without data
pub fn slippage_penalty(slippage: Option<f64>, config: &ScoringConfig) -> Result<f64, ComputationError> {
    let Some(slippage) = slippage else {
        return Ok(1.0);
    };
    let slippage = ensure_finite(STAGE, "slippage", slippage)?.max(0.0);
    let reference = if config.slippage_ref_pct > 0.0 {
        config.slippage_ref_pct
    } else {
        1.0
    };
    let penalty = 1.0 / (1.0 + config.slippage_k * slippage / reference);
    Ok(penalty.clamp(config.slippage_penalty_min, 1.0))
}
