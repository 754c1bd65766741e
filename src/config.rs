use crate::error::{ReputationError, Result};
use crate::reputation::aggregator::{ScoreFormula, FORMULA_V1};

/// GitHub caps `per_page` at 100.
pub const MAX_PER_PAGE: u8 = 100;
pub const DEFAULT_MAX_COMMITS: usize = 100;
pub const DEFAULT_CONTRIBUTOR_CONCURRENCY: usize = 4;
pub const DEFAULT_STATS_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub per_page: u8,
    /// Commit window per contributor, most recent first.
    pub max_commits: usize,
    pub contributor_concurrency: usize,
    pub stats_concurrency: usize,
    pub formula: ScoreFormula,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            per_page: MAX_PER_PAGE,
            max_commits: DEFAULT_MAX_COMMITS,
            contributor_concurrency: DEFAULT_CONTRIBUTOR_CONCURRENCY,
            stats_concurrency: DEFAULT_STATS_CONCURRENCY,
            formula: FORMULA_V1,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(ReputationError::InvalidInput(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}, got {}",
                self.per_page
            )));
        }
        if self.max_commits == 0 {
            return Err(ReputationError::InvalidInput(
                "max_commits must be at least 1".to_string(),
            ));
        }
        if self.contributor_concurrency == 0 || self.stats_concurrency == 0 {
            return Err(ReputationError::InvalidInput(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        self.formula.validate()
    }
}
