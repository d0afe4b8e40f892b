//! Domain vocabulary shared by every pipeline stage

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// REGIME LABEL
// =============================================================================

/// Coarse market regime driving the allocation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeLabel {
    Favorable,
    Neutre,
    Defavorable,
    /// Only produced when the detector stage fails
    Inconnu,
}

impl RegimeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeLabel::Favorable => "favorable",
            RegimeLabel::Neutre => "neutre",
            RegimeLabel::Defavorable => "defavorable",
            RegimeLabel::Inconnu => "inconnu",
        }
    }

    /// Position on the favorable → defavorable ladder; `None` for `inconnu`
    pub fn severity(&self) -> Option<u8> {
        match self {
            RegimeLabel::Favorable => Some(0),
            RegimeLabel::Neutre => Some(1),
            RegimeLabel::Defavorable => Some(2),
            RegimeLabel::Inconnu => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "favorable" => Some(RegimeLabel::Favorable),
            "neutre" | "neutral" => Some(RegimeLabel::Neutre),
            "defavorable" | "défavorable" => Some(RegimeLabel::Defavorable),
            "inconnu" | "unknown" => Some(RegimeLabel::Inconnu),
            _ => None,
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MODE TIER
// =============================================================================

/// Escalation severity, strictly ordered NORMAL < TENSION < ALERTE < CRISE < PANIC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModeTier {
    Normal,
    Tension,
    Alerte,
    Crise,
    Panic,
}

impl ModeTier {
    /// Escalated tiers from most to least severe
    pub const ESCALATED_DESC: [ModeTier; 4] =
        [ModeTier::Panic, ModeTier::Crise, ModeTier::Alerte, ModeTier::Tension];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeTier::Normal => "NORMAL",
            ModeTier::Tension => "TENSION",
            ModeTier::Alerte => "ALERTE",
            ModeTier::Crise => "CRISE",
            ModeTier::Panic => "PANIC",
        }
    }
}

impl fmt::Display for ModeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// BUCKET
// =============================================================================

/// Risk category holding a fraction of the portfolio, ordered by risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bucket {
    Prudent,
    Modere,
    Risque,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Prudent, Bucket::Modere, Bucket::Risque];

    /// Bucket protected by the defavorable safety override and the CRISE exit
    pub const HIGHEST_RISK: Bucket = Bucket::Risque;

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Prudent => "Prudent",
            Bucket::Modere => "Modere",
            Bucket::Risque => "Risque",
        }
    }

    /// Case-insensitive lookup; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "prudent" => Some(Bucket::Prudent),
            "modere" | "modéré" => Some(Bucket::Modere),
            "risque" => Some(Bucket::Risque),
            _ => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
