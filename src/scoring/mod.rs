/// Score adjustment: base score times independent correction coefficients
pub mod adjuster;
pub mod coefficients;

pub use adjuster::{adjust_score, ScoreAdjustment, ScoringContext};
