//! Folds a contributor's raw signals into a single impact score.
//!
//! The formula is a plain weighted sum divided by a normalizer:
//!
//! ```text
//! score = (contributions * Wc + commits * Wk + additions * Wa + deletions * Wd) / N
//! ```
//!
//! Every change to the constants must ship as a new [`ScoreFormula`] with a
//! bumped `version`, so stored records can be told apart.

use crate::error::{ReputationError, Result};
use crate::reputation::ContributorAggregate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFormula {
    pub version: u32,
    pub contribution_weight: f64,
    pub commit_weight: f64,
    pub addition_weight: f64,
    pub deletion_weight: f64,
    pub normalizer: f64,
}

pub const FORMULA_V1: ScoreFormula = ScoreFormula {
    version: 1,
    contribution_weight: 0.4,
    commit_weight: 0.0,
    addition_weight: 0.4,
    deletion_weight: 0.2,
    normalizer: 100.0,
};

impl Default for ScoreFormula {
    fn default() -> Self {
        FORMULA_V1
    }
}

impl ScoreFormula {
    /// Weights must be finite and non-negative, the normalizer positive.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            self.contribution_weight,
            self.commit_weight,
            self.addition_weight,
            self.deletion_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ReputationError::InvalidInput(format!(
                "formula v{} has a negative or non-finite weight",
                self.version
            )));
        }
        if !self.normalizer.is_finite() || self.normalizer <= 0.0 {
            return Err(ReputationError::InvalidInput(format!(
                "formula v{} normalizer must be positive",
                self.version
            )));
        }
        Ok(())
    }

    pub fn score(&self, aggregate: &ContributorAggregate) -> Result<f64> {
        let fields = [
            ("commits", aggregate.commits),
            ("additions", aggregate.additions),
            ("deletions", aggregate.deletions),
            ("contributions", aggregate.contributions),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| *v < 0) {
            return Err(ReputationError::InvalidAggregate(format!(
                "{} has negative {name}: {value}",
                aggregate.username
            )));
        }

        let weighted = aggregate.contributions as f64 * self.contribution_weight
            + aggregate.commits as f64 * self.commit_weight
            + aggregate.additions as f64 * self.addition_weight
            + aggregate.deletions as f64 * self.deletion_weight;
        let score = weighted / self.normalizer;

        if !score.is_finite() {
            return Err(ReputationError::InvalidAggregate(format!(
                "{} produced a non-finite score",
                aggregate.username
            )));
        }
        Ok(score)
    }
}

/// Score an aggregate with the canonical formula.
pub fn score(aggregate: &ContributorAggregate) -> Result<f64> {
    FORMULA_V1.score(aggregate)
}
