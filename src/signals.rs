//! External confidence signals
//!
//! Two producer formats exist in the wild: classic ranking signals
//! (`{asset, score}` with a 0-100 score) and external model outputs
//! (`{source, symbol?, confidence}`). Both are unified at ingestion into
//! `Signal` with a confidence in [0, 1].

use crate::journal::read_tail;
use crate::logger::{self, LogTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicSignal {
    pub asset: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalSignal {
    pub source: String,
    /// Asset the signal is about; `None` applies to every asset
    #[serde(default)]
    pub symbol: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    Classic(ClassicSignal),
    External(ExternalSignal),
}

impl Signal {
    pub fn confidence(&self) -> f64 {
        match self {
            Signal::Classic(s) => s.confidence,
            Signal::External(s) => s.confidence,
        }
    }

    /// Asset the signal targets, `None` for market-wide signals
    pub fn asset(&self) -> Option<&str> {
        match self {
            Signal::Classic(s) => Some(s.asset.as_str()),
            Signal::External(s) => s.symbol.as_deref(),
        }
    }
}

/// Every accepted line shape; tagged records are tried first
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSignal {
    Tagged(Signal),
    External {
        source: String,
        #[serde(default, alias = "asset")]
        symbol: Option<String>,
        confidence: f64,
    },
    Classic {
        #[serde(alias = "pool", alias = "symbol")]
        asset: String,
        score: f64,
    },
}

/// Values above 1 are read as percentages
fn unit_confidence(value: f64) -> Option<f64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let unit = if value > 1.0 { value / 100.0 } else { value };
    Some(unit.min(1.0))
}

impl RawSignal {
    fn normalize(self) -> Option<Signal> {
        match self {
            RawSignal::Tagged(Signal::Classic(s)) => Some(Signal::Classic(ClassicSignal {
                confidence: unit_confidence(s.confidence)?,
                asset: s.asset,
            })),
            RawSignal::Tagged(Signal::External(s)) => Some(Signal::External(ExternalSignal {
                confidence: unit_confidence(s.confidence)?,
                ..s
            })),
            RawSignal::External {
                source,
                symbol,
                confidence,
            } => Some(Signal::External(ExternalSignal {
                source,
                symbol,
                confidence: unit_confidence(confidence)?,
            })),
            RawSignal::Classic { asset, score } => {
                let confidence = if score.is_finite() {
                    (score / 100.0).clamp(0.0, 1.0)
                } else {
                    return None;
                };
                Some(Signal::Classic(ClassicSignal { asset, confidence }))
            }
        }
    }
}

/// Parse one journal line into a unified signal
pub fn parse_signal(line: &str) -> Option<Signal> {
    serde_json::from_str::<RawSignal>(line)
        .ok()
        .and_then(RawSignal::normalize)
}

/// Confidence scores grouped by asset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceIndex {
    by_asset: HashMap<String, Vec<f64>>,
    market_wide: Vec<f64>,
}

impl ConfidenceIndex {
    pub fn from_signals(signals: &[Signal]) -> Self {
        let mut index = Self::default();
        for signal in signals {
            match signal.asset() {
                Some(asset) => index
                    .by_asset
                    .entry(asset.to_lowercase())
                    .or_default()
                    .push(signal.confidence()),
                None => index.market_wide.push(signal.confidence()),
            }
        }
        index
    }

    /// Asset-specific scores when present, else market-wide ones
    pub fn scores_for(&self, asset: &str, symbol: Option<&str>) -> &[f64] {
        let keys = std::iter::once(asset).chain(symbol);
        for key in keys {
            if let Some(scores) = self.by_asset.get(&key.to_lowercase()) {
                return scores;
            }
        }
        &self.market_wide
    }

    pub fn len(&self) -> usize {
        self.market_wide.len() + self.by_asset.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Supplies the external signals considered in a cycle
pub trait SignalSource {
    fn read_signals(&self) -> Vec<Signal>;
}

/// Tails `external_signals.jsonl`
pub struct JournalSignalSource {
    path: PathBuf,
    max_lines: usize,
    wait_timeout: Duration,
}

impl JournalSignalSource {
    pub fn new(path: PathBuf, max_lines: usize, wait_timeout: Duration) -> Self {
        Self {
            path,
            max_lines,
            wait_timeout,
        }
    }
}

impl SignalSource for JournalSignalSource {
    fn read_signals(&self) -> Vec<Signal> {
        let raw: Vec<RawSignal> = read_tail(&self.path, self.max_lines, true, self.wait_timeout);
        let total = raw.len();
        let signals: Vec<Signal> = raw.into_iter().filter_map(RawSignal::normalize).collect();
        if signals.len() < total {
            logger::debug(
                LogTag::Signals,
                &format!("Dropped {} signal(s) with unusable confidence", total - signals.len()),
            );
        }
        signals
    }
}

/// Fixed signal list, for tests and dry runs
impl SignalSource for Vec<Signal> {
    fn read_signals(&self) -> Vec<Signal> {
        self.clone()
    }
}
