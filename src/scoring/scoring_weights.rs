use super::Factor;
use crate::Result;
use ohno::app_err;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// Relative weight of each [`Factor`] in the overall score.
///
/// Factors left out of a configuration keep their default weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ScoringWeights {
    weights: BTreeMap<Factor, f64>,
}

impl ScoringWeights {
    #[must_use]
    pub fn get(&self, factor: Factor) -> f64 {
        self.weights.get(&factor).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn with(mut self, factor: Factor, weight: f64) -> Self {
        let _ = self.weights.insert(factor, weight);
        self
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        self.weights.iter().map(|(factor, weight)| (*factor, *weight))
    }

    /// Every weight must be finite and non-negative, and at least one must be positive.
    pub fn validate(&self) -> Result<()> {
        for (factor, weight) in self.iter() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(app_err!("scoring weight for '{factor}' must be a non-negative number, got {weight}"));
            }
        }

        if self.total() <= 0.0 {
            return Err(app_err!("at least one scoring weight must be greater than zero"));
        }

        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            weights: Factor::iter().map(|f| (f, f.default_weight())).collect(),
        }
    }
}

impl TryFrom<BTreeMap<String, f64>> for ScoringWeights {
    type Error = String;

    fn try_from(overrides: BTreeMap<String, f64>) -> core::result::Result<Self, Self::Error> {
        let mut weights = Self::default();
        for (name, weight) in overrides {
            let factor = Factor::from_name(&name).ok_or_else(|| format!("unknown scoring factor '{name}'"))?;
            let _ = weights.weights.insert(factor, weight);
        }

        Ok(weights)
    }
}

impl From<ScoringWeights> for BTreeMap<String, f64> {
    fn from(weights: ScoringWeights) -> Self {
        weights.weights.into_iter().map(|(factor, weight)| (factor.to_string(), weight)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = ScoringWeights::default();
        assert!((weights.get(Factor::Description) - 20.0).abs() < f64::EPSILON);
        assert!((weights.get(Factor::Stars) - 10.0).abs() < f64::EPSILON);
        assert!((weights.total() - 100.0).abs() < f64::EPSILON);
        weights.validate().unwrap();
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let weights: ScoringWeights = toml::from_str("stars = 50.0").unwrap();
        assert!((weights.get(Factor::Stars) - 50.0).abs() < f64::EPSILON);
        assert!((weights.get(Factor::License) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_factor_is_rejected() {
        assert!(toml::from_str::<ScoringWeights>("popularity = 5.0").is_err());

        let overrides = BTreeMap::from([("popularity".to_owned(), 5.0)]);
        let err = ScoringWeights::try_from(overrides).unwrap_err();
        assert_eq!(err, "unknown scoring factor 'popularity'");
    }

    #[test]
    fn test_known_factor_override() {
        let overrides = BTreeMap::from([("stars".to_owned(), 40.0)]);
        let weights = ScoringWeights::try_from(overrides).unwrap();
        assert!((weights.get(Factor::Stars) - 40.0).abs() < f64::EPSILON);
        assert!((weights.get(Factor::Readme) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_weight_is_invalid() {
        let weights = ScoringWeights::default().with(Factor::Topics, -1.0);
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_all_zero_weights_are_invalid() {
        let weights = Factor::iter().fold(ScoringWeights::default(), |w, f| w.with(f, 0.0));
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_nan_weight_is_invalid() {
        let weights = ScoringWeights::default().with(Factor::Readme, f64::NAN);
        assert!(weights.validate().is_err());
    }
}
