/// Configuration utilities - path resolution, loading and startup validation
///
/// The strategy configuration is loaded once at startup and then passed by
/// reference through the pipeline; nothing mutates it afterwards.
use super::schemas::{LadderDirection, StrategyConfig, TriggerConfig, SUPPORTED_SCHEMA_VERSION};
use crate::errors::ConfigurationError;
use crate::logger::{self, LogTag};
use crate::paths;
use crate::types::{Bucket, RegimeLabel};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternate configuration path
pub const CONFIG_ENV_VAR: &str = "ALLOCBOT_CONFIG";

/// Resolve which configuration file to load
///
/// Precedence: explicit CLI path, then `ALLOCBOT_CONFIG`, then the default
/// `<base>/data/config.toml`.
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => paths::get_config_path(),
    }
}

/// Load and validate the strategy configuration at `path`
///
/// Any failure here is fatal for the caller: the loop must not start on a
/// configuration it cannot trust.
pub fn load_config_from_path(path: &Path) -> Result<StrategyConfig, ConfigurationError> {
    if !path.exists() {
        return Err(ConfigurationError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(path, &contents)?;
    config.validate()?;

    logger::info(
        LogTag::Config,
        &format!(
            "Loaded strategy config {} (schema v{}, {} policy labels)",
            path.display(),
            config.schema_version,
            config.policy.len()
        ),
    );

    Ok(config)
}

/// Parse TOML text, mapping missing required tables to a dedicated error
pub fn parse_config(path: &Path, contents: &str) -> Result<StrategyConfig, ConfigurationError> {
    let raw: toml::Table = toml::from_str(contents).map_err(|e| ConfigurationError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    for required in ["schema_version", "policy"] {
        if !raw.contains_key(required) {
            return Err(ConfigurationError::MissingTable {
                table: required.to_string(),
            });
        }
    }

    let mut config = toml::from_str::<StrategyConfig>(contents).map_err(|e| ConfigurationError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    config.canonicalize_policy_labels()?;
    Ok(config)
}

impl StrategyConfig {
    /// Rewrite `[policy.<label>]` keys to their canonical names
    ///
    /// Accepts any case and the English aliases (`neutral`, `unknown`).
    /// Unknown labels and two keys naming the same label are rejected.
    pub fn canonicalize_policy_labels(&mut self) -> Result<(), ConfigurationError> {
        let mut canonical = BTreeMap::new();
        for (key, table) in std::mem::take(&mut self.policy) {
            let Some(label) = RegimeLabel::from_name(&key) else {
                return Err(ConfigurationError::invalid(
                    &format!("policy.{}", key),
                    "unknown regime label (expected favorable, neutre, defavorable or inconnu)",
                ));
            };
            if canonical.insert(label.as_str().to_string(), table).is_some() {
                return Err(ConfigurationError::invalid(
                    &format!("policy.{}", key),
                    format!("duplicates the '{}' table", label),
                ));
            }
        }
        self.policy = canonical;
        Ok(())
    }

    /// Validate the whole configuration once, at load time
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(ConfigurationError::SchemaVersion {
                found: self.schema_version,
                expected: SUPPORTED_SCHEMA_VERSION,
            });
        }

        self.validate_policy()?;
        self.validate_detector()?;
        self.validate_mode()?;
        self.validate_scoring()?;
        self.validate_planner()?;

        if self.journal.lock_poll_ms == 0 {
            return Err(ConfigurationError::invalid("journal.lock_poll_ms", "must be > 0"));
        }

        for (name, amount) in &self.portfolio.initial_allocation {
            if !amount.is_finite() || *amount < 0.0 {
                return Err(ConfigurationError::invalid(
                    &format!("portfolio.initial_allocation.{}", name),
                    "must be a non-negative amount",
                ));
            }
        }

        Ok(())
    }

    fn validate_policy(&self) -> Result<(), ConfigurationError> {
        if self.policy.is_empty() {
            return Err(ConfigurationError::MissingTable {
                table: "policy".to_string(),
            });
        }

        for (label, fractions) in &self.policy {
            if RegimeLabel::from_name(label).map(|l| l.as_str()) != Some(label.as_str()) {
                return Err(ConfigurationError::invalid(
                    &format!("policy.{}", label),
                    "not a canonical regime label",
                ));
            }
            for (bucket, fraction) in fractions {
                if !fraction.is_finite() {
                    return Err(ConfigurationError::invalid(
                        &format!("policy.{}.{}", label, bucket),
                        "must be a finite number",
                    ));
                }
                if Bucket::from_name(bucket).is_none() {
                    logger::warning(
                        LogTag::Config,
                        &format!("policy.{} names unknown bucket '{}', it will be ignored", label, bucket),
                    );
                }
            }
        }
        Ok(())
    }

    fn validate_detector(&self) -> Result<(), ConfigurationError> {
        let d = &self.detector;
        if d.min_samples == 0 {
            return Err(ConfigurationError::invalid("detector.min_samples", "must be >= 1"));
        }
        if !(d.smoothing_alpha > 0.0 && d.smoothing_alpha <= 1.0) {
            return Err(ConfigurationError::invalid(
                "detector.smoothing_alpha",
                "must be in (0, 1]",
            ));
        }
        if d.apr_up_threshold <= 0.0 || d.tvl_up_threshold <= 0.0 {
            return Err(ConfigurationError::invalid(
                "detector.*_up_threshold",
                "up thresholds must be > 0",
            ));
        }
        if d.apr_down_threshold >= 0.0 || d.tvl_down_threshold >= 0.0 {
            return Err(ConfigurationError::invalid(
                "detector.*_down_threshold",
                "down thresholds must be < 0",
            ));
        }
        if d.weight_apr < 0.0 || d.weight_tvl < 0.0 || d.weight_apr + d.weight_tvl <= 0.0 {
            return Err(ConfigurationError::invalid(
                "detector.weight_*",
                "weights must be >= 0 with a positive sum",
            ));
        }
        if d.score_up_threshold <= d.score_down_threshold {
            return Err(ConfigurationError::invalid(
                "detector.score_up_threshold",
                "must be greater than score_down_threshold",
            ));
        }
        if d.hysteresis_margin < 0.0 {
            return Err(ConfigurationError::invalid("detector.hysteresis_margin", "must be >= 0"));
        }
        Ok(())
    }

    fn validate_mode(&self) -> Result<(), ConfigurationError> {
        let t = &self.mode.triggers;
        check_ladder("mode.triggers.slippage", &t.slippage, false)?;
        check_ladder("mode.triggers.tvl_drop", &t.tvl_drop, false)?;
        check_ladder("mode.triggers.drawdown", &t.drawdown, false)?;
        check_ladder("mode.triggers.apr_spike", &t.apr_spike, false)?;
        check_ladder("mode.triggers.stablecoin_depeg", &t.stablecoin_depeg, true)?;

        let c = &self.mode.min_trigger_count;
        if [c.tension, c.alerte, c.crise, c.panic].contains(&0) {
            return Err(ConfigurationError::invalid(
                "mode.min_trigger_count",
                "every tier needs at least one trigger",
            ));
        }
        Ok(())
    }

    fn validate_scoring(&self) -> Result<(), ConfigurationError> {
        let s = &self.scoring;
        if s.ai_coeff_min > s.ai_coeff_max {
            return Err(ConfigurationError::invalid("scoring.ai_coeff_min", "exceeds ai_coeff_max"));
        }
        if s.risk_coeff_min > s.risk_coeff_max {
            return Err(ConfigurationError::invalid(
                "scoring.risk_coeff_min",
                "exceeds risk_coeff_max",
            ));
        }
        let band_mins: Vec<f64> = s.ai_bands.iter().map(|b| b.min).collect();
        if !strictly_ordered(&band_mins, true) {
            return Err(ConfigurationError::invalid(
                "scoring.ai_bands",
                "band minimums must be finite and strictly decreasing",
            ));
        }
        for (field, ladder) in [
            ("scoring.apr_ladder", &s.apr_ladder),
            ("scoring.liquidity_ladder", &s.liquidity_ladder),
            ("scoring.volatility_ladder", &s.volatility_ladder),
        ] {
            let bounds: Vec<f64> = ladder.steps.iter().map(|step| step.bound).collect();
            // First match wins: `above` steps go high to low, `below` steps low to high
            let descending = ladder.direction == LadderDirection::Above;
            if !strictly_ordered(&bounds, descending) {
                let expected = if descending { "decreasing" } else { "increasing" };
                return Err(ConfigurationError::invalid(
                    field,
                    format!("step bounds must be finite and strictly {}", expected),
                ));
            }
        }
        if s.slippage_ref_pct <= 0.0 || s.slippage_k < 0.0 {
            return Err(ConfigurationError::invalid(
                "scoring.slippage_*",
                "slippage_ref_pct must be > 0 and slippage_k >= 0",
            ));
        }
        Ok(())
    }

    fn validate_planner(&self) -> Result<(), ConfigurationError> {
        let p = &self.planner;
        if !(p.max_shift_ratio > 0.0 && p.max_shift_ratio <= 1.0) {
            return Err(ConfigurationError::invalid(
                "planner.max_shift_ratio",
                "must be in (0, 1]",
            ));
        }
        if p.min_rebal_usd < 0.0 || p.min_total_usd < 0.0 {
            return Err(ConfigurationError::invalid(
                "planner.min_*",
                "minimums must be >= 0",
            ));
        }
        Ok(())
    }
}

fn strictly_ordered(values: &[f64], descending: bool) -> bool {
    values.iter().all(|v| v.is_finite())
        && values
            .windows(2)
            .all(|w| if descending { w[0] > w[1] } else { w[0] < w[1] })
}

/// Tier bounds must be strictly increasing (decreasing when inverted)
fn check_ladder(field: &str, trigger: &TriggerConfig, inverted: bool) -> Result<(), ConfigurationError> {
    if !trigger.enabled {
        return Ok(());
    }
    let bounds = [trigger.tension, trigger.alerte, trigger.crise, trigger.panic];
    if bounds.iter().any(|b| !b.is_finite()) {
        return Err(ConfigurationError::invalid(field, "bounds must be finite"));
    }
    let ordered = bounds.windows(2).all(|w| {
        if inverted {
            w[0] > w[1]
        } else {
            w[0] < w[1]
        }
    });
    if !ordered {
        let expected = if inverted { "decreasing" } else { "increasing" };
        return Err(ConfigurationError::invalid(
            field,
            format!("bounds must be strictly {} from tension to panic", expected),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
schema_version = 1

[policy.neutre]
Prudent = 0.5
Modere = 0.3
Risque = 0.2
"#;

    #[test]
    fn test_default_config_is_valid() {
        assert!(StrategyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_minimal_file_fills_defaults() {
        let config = parse_config(Path::new("mem.toml"), MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.detector.min_samples, 3);
        assert_eq!(config.mode.min_trigger_count.panic, 1);
        assert_eq!(config.policy.len(), 1);
    }

    #[test]
    fn test_missing_policy_is_fatal() {
        let err = parse_config(Path::new("mem.toml"), "schema_version = 1\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingTable { ref table } if table == "policy"));
    }

    #[test]
    fn test_missing_schema_version_is_fatal() {
        let err = parse_config(Path::new("mem.toml"), "[policy.neutre]\nPrudent = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingTable { .. }));
    }

    #[test]
    fn test_wrong_schema_version() {
        let text = MINIMAL.replace("schema_version = 1", "schema_version = 7");
        let config = parse_config(Path::new("mem.toml"), &text).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::SchemaVersion { found: 7, expected: 1 })
        ));
    }

    #[test]
    fn test_unordered_trigger_bounds_rejected() {
        let mut config = StrategyConfig::default();
        config.mode.triggers.drawdown.alerte = 1.0;
        assert!(config.validate().is_err());

        // A disabled trigger is not checked
        config.mode.triggers.drawdown.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_depeg_bounds_must_decrease() {
        let mut config = StrategyConfig::default();
        config.mode.triggers.stablecoin_depeg = TriggerConfig::with_bounds(0.95, 0.98, 0.99, 0.995);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scoring_bands_and_ladders_must_be_ordered() {
        use crate::config::{ConfidenceBand, ThresholdLadder};

        let mut config = StrategyConfig::default();
        config.scoring.ai_bands = vec![
            ConfidenceBand { min: 0.0, coeff: 0.9 },
            ConfidenceBand { min: 0.8, coeff: 1.1 },
        ];
        assert!(config.validate().is_err());

        let mut config = StrategyConfig::default();
        config.scoring.apr_ladder = ThresholdLadder::above(&[(5.0, 1.02), (200.0, 0.85)]);
        assert!(config.validate().is_err());

        let mut config = StrategyConfig::default();
        config.scoring.liquidity_ladder = ThresholdLadder::below(&[(1_000_000.0, 0.96), (100_000.0, 0.90)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shift_ratio_bounds() {
        let mut config = StrategyConfig::default();
        config.planner.max_shift_ratio = 0.0;
        assert!(config.validate().is_err());
        config.planner.max_shift_ratio = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_disk_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(matches!(
            load_config_from_path(&path),
            Err(ConfigurationError::FileNotFound { .. })
        ));

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.schema_version, 1);
    }

    #[test]
    fn test_policy_labels_canonicalized() {
        let text = MINIMAL.replace("[policy.neutre]", "[policy.Neutral]")
            + "\n[policy.Defavorable]\nPrudent = 1.0\n";
        let config = parse_config(Path::new("mem.toml"), &text).unwrap();
        config.validate().unwrap();
        let keys: Vec<&str> = config.policy.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["defavorable", "neutre"]);
    }

    #[test]
    fn test_unknown_policy_label_rejected() {
        let text = MINIMAL.replace("[policy.neutre]", "[policy.bullish]");
        assert!(matches!(
            parse_config(Path::new("mem.toml"), &text),
            Err(ConfigurationError::InvalidField { .. })
        ));

        let dup = MINIMAL.to_string() + "\n[policy.neutral]\nPrudent = 1.0\n";
        assert!(parse_config(Path::new("mem.toml"), &dup).is_err());

        // Tables assembled in code skip canonicalization but not validation
        let mut config = StrategyConfig::default();
        config.policy.insert("Favorable".to_string(), BTreeMap::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_path_wins() {
        let cli = Path::new("/etc/allocbot/strategy.toml");
        assert_eq!(resolve_config_path(Some(cli)), cli.to_path_buf());
    }
}
