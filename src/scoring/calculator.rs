use super::{Factor, ScoringWeights};
use crate::facts::Repository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// Quality score of one repository, with the sub-score of every factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub repository_id: String,

    /// Weighted score in `[0, 100]`
    pub score: f64,

    /// Sub-score in `[0, 1]` for each factor
    pub factors: BTreeMap<Factor, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("repository has no identifier")]
    MissingIdentifier,
}

/// Computes quality scores from repository metadata alone.
///
/// Scoring is pure: the same repository, weights, and `now` always produce the
/// same score.
#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    weights: ScoringWeights,
}

impl ScoreCalculator {
    #[must_use]
    pub const fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, repository: &Repository, now: DateTime<Utc>) -> Result<QualityScore, ScoreError> {
        if repository.id.trim().is_empty() {
            return Err(ScoreError::MissingIdentifier);
        }

        let factors: BTreeMap<Factor, f64> = Factor::iter().map(|f| (f, sub_score(f, repository, now))).collect();

        let total_weight = self.weights.total();
        let score = if total_weight > 0.0 {
            let weighted: f64 = factors.iter().map(|(f, s)| self.weights.get(*f) * s).sum();
            round2((100.0 * weighted / total_weight).clamp(0.0, 100.0))
        } else {
            0.0
        };

        Ok(QualityScore {
            repository_id: repository.id.clone(),
            score,
            factors,
        })
    }
}

/// Sub-score in `[0, 1]` of a single factor.
#[must_use]
pub fn sub_score(factor: Factor, repository: &Repository, now: DateTime<Utc>) -> f64 {
    match factor {
        Factor::Description => flag(repository.description.as_deref().is_some_and(|d| !d.trim().is_empty())),
        Factor::License => flag(repository.license.is_some()),
        Factor::Topics => flag(!repository.topics.is_empty()),
        Factor::Readme => flag(repository.has_readme == Some(true)),
        Factor::Recency => repository.pushed_at.map_or(0.0, |pushed| recency_sub_score(pushed, now)),
        Factor::Stars => stars_sub_score(repository.stars),
    }
}

const fn flag(present: bool) -> f64 {
    if present { 1.0 } else { 0.0 }
}

fn recency_sub_score(pushed_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    // pushes "in the future" come from clock skew and count as fresh
    let days = now.signed_duration_since(pushed_at).num_days().max(0);
    match days {
        0..=30 => 1.0,
        31..=90 => 0.75,
        91..=180 => 0.5,
        181..=365 => 0.25,
        _ => 0.0,
    }
}

const fn stars_sub_score(stars: u64) -> f64 {
    match stars {
        0 => 0.0,
        1..=9 => 0.25,
        10..=99 => 0.5,
        100..=999 => 0.75,
        _ => 1.0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
