//! Repository quality scoring
//!
//! A repository's score is the weighted average of per-factor sub-scores,
//! scaled to `[0, 100]`. Every factor is derived from repository metadata
//! alone, so scoring never touches the network.

mod calculator;
mod factor;
mod scoring_weights;

pub use calculator::{QualityScore, ScoreCalculator, ScoreError, sub_score};
pub use factor::Factor;
pub use scoring_weights::ScoringWeights;
