//! Market context detector
//!
//! Classifies the market into favorable / neutre / defavorable from the
//! medians of per-asset APR and TVL changes. The raw score is EMA-smoothed
//! across cycles, and the label is stabilised by hysteresis on one-step
//! changes plus a cooldown after every change. All carry-over lives in
//! `DetectorState`, which the caller threads from cycle to cycle.

use super::types::MetricSample;
use crate::config::DetectorConfig;
use crate::errors::{ensure_finite, ComputationError};
use crate::logger::{self, LogTag};
use crate::types::RegimeLabel;
use serde::{Deserialize, Serialize};

const STAGE: &str = "detector";

/// Normalized component scores are clamped to this magnitude
const NORMALIZED_CLAMP: f64 = 3.0;

pub const REASON_INSUFFICIENT: &str = "insufficient_samples";
pub const REASON_COOLDOWN: &str = "cooldown_active";
pub const REASON_HYSTERESIS: &str = "hysteresis_hold";
pub const REASON_CHANGE: &str = "regime_change";
pub const REASON_STABLE: &str = "stable";
pub const REASON_INITIAL: &str = "initial";

/// Detector memory carried between cycles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorState {
    pub label: Option<RegimeLabel>,
    pub score: Option<f64>,
    pub cooldown_remaining: u32,
}

/// Output of one detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeDecision {
    pub label: RegimeLabel,
    /// Smoothed score in normalized space
    pub score: f64,
    /// Samples that carried an APR or TVL change
    pub sample_size: usize,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apr_change_median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvl_change_median: Option<f64>,
}

impl RegimeDecision {
    /// Decision used when the detector stage itself failed
    pub fn fallback(sample_size: usize, error: &ComputationError) -> Self {
        Self {
            label: RegimeLabel::Inconnu,
            score: 0.0,
            sample_size,
            reason: format!("fallback: {}", error),
            apr_change_median: None,
            tvl_change_median: None,
        }
    }
}

/// Median of `values`; mean of the two middle values for even counts
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Map a change percentage into threshold units, clamped to [-3, 3]
fn normalized(value: f64, up_threshold: f64, down_threshold: f64) -> f64 {
    let scaled = if value >= 0.0 {
        value / up_threshold
    } else {
        value / down_threshold.abs()
    };
    scaled.clamp(-NORMALIZED_CLAMP, NORMALIZED_CLAMP)
}

fn classify(score: f64, config: &DetectorConfig) -> RegimeLabel {
    if score >= config.score_up_threshold {
        RegimeLabel::Favorable
    } else if score <= config.score_down_threshold {
        RegimeLabel::Defavorable
    } else {
        RegimeLabel::Neutre
    }
}

/// Whether a one-step label change sits inside the hysteresis band
fn held_by_hysteresis(
    previous: RegimeLabel,
    candidate: RegimeLabel,
    score: f64,
    config: &DetectorConfig,
) -> bool {
    let (Some(a), Some(b)) = (previous.severity(), candidate.severity()) else {
        return false;
    };
    if a.abs_diff(b) != 1 {
        return false;
    }
    let threshold = if previous == RegimeLabel::Favorable || candidate == RegimeLabel::Favorable {
        config.score_up_threshold
    } else {
        config.score_down_threshold
    };
    (score - threshold).abs() < config.hysteresis_margin
}

/// Classify the market for this cycle
///
/// Returns the decision and the state to carry into the next cycle. Fails
/// only on non-finite change values; the caller decides the fallback.
pub fn detect(
    samples: &[MetricSample],
    config: &DetectorConfig,
    previous: &DetectorState,
) -> Result<(RegimeDecision, DetectorState), ComputationError> {
    let mut apr_changes = Vec::new();
    let mut tvl_changes = Vec::new();
    for sample in samples {
        if let Some(v) = sample.apr_change_pct {
            apr_changes.push(ensure_finite(STAGE, "apr_change_pct", v)?);
        }
        if let Some(v) = sample.tvl_change_pct {
            tvl_changes.push(ensure_finite(STAGE, "tvl_change_pct", v)?);
        }
    }

    let sample_size = samples.iter().filter(|s| s.has_trend()).count();
    let apr_med = median(&apr_changes);
    let tvl_med = median(&tvl_changes);
    let prior_label = previous.label.filter(|l| *l != RegimeLabel::Inconnu);
    let cooldown_next = previous.cooldown_remaining.saturating_sub(1);

    if sample_size < config.min_samples {
        let decision = RegimeDecision {
            label: prior_label.unwrap_or(RegimeLabel::Neutre),
            score: previous.score.unwrap_or(0.0),
            sample_size,
            reason: REASON_INSUFFICIENT.to_string(),
            apr_change_median: apr_med,
            tvl_change_median: tvl_med,
        };
        let state = DetectorState {
            label: previous.label,
            score: previous.score,
            cooldown_remaining: cooldown_next,
        };
        return Ok((decision, state));
    }

    let mut weighted = 0.0;
    let mut weight_total = 0.0;
    if let Some(m) = apr_med {
        weighted += config.weight_apr * normalized(m, config.apr_up_threshold, config.apr_down_threshold);
        weight_total += config.weight_apr;
    }
    if let Some(m) = tvl_med {
        weighted += config.weight_tvl * normalized(m, config.tvl_up_threshold, config.tvl_down_threshold);
        weight_total += config.weight_tvl;
    }
    let raw = if weight_total > 0.0 {
        weighted / weight_total
    } else {
        0.0
    };
    let score = match previous.score {
        Some(prev) => config.smoothing_alpha * raw + (1.0 - config.smoothing_alpha) * prev,
        None => raw,
    };
    let score = ensure_finite(STAGE, "score", score)?;

    let candidate = classify(score, config);
    let (label, reason, cooldown_remaining) = match prior_label {
        None => (candidate, REASON_INITIAL, 0),
        Some(prior) if previous.cooldown_remaining > 0 => (prior, REASON_COOLDOWN, cooldown_next),
        Some(prior) if prior == candidate => (prior, REASON_STABLE, 0),
        Some(prior) if held_by_hysteresis(prior, candidate, score, config) => {
            (prior, REASON_HYSTERESIS, 0)
        }
        Some(prior) => {
            logger::info(
                LogTag::Detector,
                &format!("Regime change {} -> {} (score {:.3})", prior, candidate, score),
            );
            (candidate, REASON_CHANGE, config.cooldown_cycles.saturating_sub(1))
        }
    };

    logger::debug(
        LogTag::Detector,
        &format!(
            "raw={:.3} smoothed={:.3} samples={} label={} reason={}",
            raw, score, sample_size, label, reason
        ),
    );

    let decision = RegimeDecision {
        label,
        score,
        sample_size,
        reason: reason.to_string(),
        apr_change_median: apr_med,
        tvl_change_median: tvl_med,
    };
    let state = DetectorState {
        label: Some(label),
        score: Some(score),
        cooldown_remaining,
    };
    Ok((decision, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(apr: f64, tvl: f64, n: usize) -> Vec<MetricSample> {
        (0..n)
            .map(|_| MetricSample {
                apr_change_pct: Some(apr),
                tvl_change_pct: Some(tvl),
                ..Default::default()
            })
            .collect()
    }

    fn no_smoothing() -> DetectorConfig {
        DetectorConfig {
            smoothing_alpha: 1.0,
            ..Default::default()
        }
    }

    fn state(label: RegimeLabel, score: f64) -> DetectorState {
        DetectorState {
            label: Some(label),
            score: Some(score),
            cooldown_remaining: 0,
        }
    }

    #[test]
    fn test_median_odd_even_empty() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_clear_uptrend_is_favorable() {
        let (decision, next) =
            detect(&samples(10.0, 6.0, 5), &no_smoothing(), &DetectorState::default()).unwrap();
        assert_eq!(decision.label, RegimeLabel::Favorable);
        assert_eq!(decision.reason, REASON_INITIAL);
        assert!((decision.score - 2.0).abs() < 1e-9);
        assert_eq!(next.label, Some(RegimeLabel::Favorable));
    }

    #[test]
    fn test_insufficient_samples_keeps_previous_label() {
        let prev = state(RegimeLabel::Defavorable, -1.5);
        let (decision, next) = detect(&samples(10.0, 6.0, 2), &no_smoothing(), &prev).unwrap();
        assert_eq!(decision.label, RegimeLabel::Defavorable);
        assert_eq!(decision.reason, REASON_INSUFFICIENT);
        assert_eq!(next, prev);
    }

    #[test]
    fn test_insufficient_samples_without_history_is_neutre() {
        let (decision, next) =
            detect(&[], &DetectorConfig::default(), &DetectorState::default()).unwrap();
        assert_eq!(decision.label, RegimeLabel::Neutre);
        assert_eq!(decision.sample_size, 0);
        assert_eq!(next.label, None);
    }

    #[test]
    fn test_hysteresis_holds_one_step_change_near_threshold() {
        // score lands at 1.05, inside the 0.1 band above the up threshold
        let prev = state(RegimeLabel::Neutre, 0.5);
        let (decision, _) = detect(&samples(5.25, 3.15, 4), &no_smoothing(), &prev).unwrap();
        assert_eq!(decision.label, RegimeLabel::Neutre);
        assert_eq!(decision.reason, REASON_HYSTERESIS);

        let (decision, next) = detect(&samples(7.5, 4.5, 4), &no_smoothing(), &prev).unwrap();
        assert_eq!(decision.label, RegimeLabel::Favorable);
        assert_eq!(decision.reason, REASON_CHANGE);
        assert_eq!(next.cooldown_remaining, 2);
    }

    #[test]
    fn test_two_step_jump_ignores_hysteresis() {
        let prev = state(RegimeLabel::Defavorable, -1.2);
        let (decision, _) = detect(&samples(5.25, 3.15, 4), &no_smoothing(), &prev).unwrap();
        assert_eq!(decision.label, RegimeLabel::Favorable);
    }

    #[test]
    fn test_cooldown_blocks_flip_for_configured_cycles() {
        let config = no_smoothing();
        let prev = state(RegimeLabel::Neutre, 0.0);

        let (d1, s1) = detect(&samples(15.0, 9.0, 4), &config, &prev).unwrap();
        assert_eq!(d1.label, RegimeLabel::Favorable);

        // Two following cycles are locked even under a crash
        let (d2, s2) = detect(&samples(-15.0, -9.0, 4), &config, &s1).unwrap();
        assert_eq!(d2.label, RegimeLabel::Favorable);
        assert_eq!(d2.reason, REASON_COOLDOWN);
        let (d3, s3) = detect(&samples(-15.0, -9.0, 4), &config, &s2).unwrap();
        assert_eq!(d3.reason, REASON_COOLDOWN);

        let (d4, _) = detect(&samples(-15.0, -9.0, 4), &config, &s3).unwrap();
        assert_eq!(d4.label, RegimeLabel::Defavorable);
        assert_eq!(d4.reason, REASON_CHANGE);
    }

    #[test]
    fn test_smoothing_dampens_single_spike() {
        let config = DetectorConfig::default();
        let prev = state(RegimeLabel::Neutre, 0.0);
        // raw 1.2, smoothed 0.6 -> stays neutre
        let (decision, next) = detect(&samples(6.0, 3.6, 4), &config, &prev).unwrap();
        assert_eq!(decision.label, RegimeLabel::Neutre);
        assert!((next.score.unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_normalization_is_clamped() {
        let (decision, _) =
            detect(&samples(500.0, 500.0, 3), &no_smoothing(), &DetectorState::default()).unwrap();
        assert!((decision.score - NORMALIZED_CLAMP).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_change_is_error() {
        let mut input = samples(1.0, 1.0, 3);
        input[1].apr_change_pct = Some(f64::NAN);
        let err = detect(&input, &DetectorConfig::default(), &DetectorState::default()).unwrap_err();
        assert_eq!(err.stage(), STAGE);
    }

    #[test]
    fn test_single_component_uses_available_weight() {
        let input: Vec<MetricSample> = (0..3)
            .map(|_| MetricSample {
                tvl_change_pct: Some(-6.0),
                ..Default::default()
            })
            .collect();
        let (decision, _) = detect(&input, &no_smoothing(), &DetectorState::default()).unwrap();
        assert_eq!(decision.label, RegimeLabel::Defavorable);
        assert!((decision.score + 2.0).abs() < 1e-9);
    }
}
