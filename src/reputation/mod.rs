use bitflags::bitflags;
use chrono::{DateTime, Utc};

pub mod aggregator;
pub mod commit_source;
pub mod commit_stats;
pub mod pipeline;
pub mod store;

/// GitHub logins are case-insensitive; this is the form used as a store key.
pub fn canonical_login(login: &str) -> String {
  login.trim().to_lowercase()
}

/// A contributor as reported by the host. Never modified by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
  pub login: String,
  pub avatar_url: Option<String>,
  /// Total historical contribution count reported by the host.
  pub contributions: i64,
}

impl Contributor {
  pub fn new(login: impl Into<String>, contributions: i64) -> Contributor {
    Contributor {
      login: login.into(),
      avatar_url: None,
      contributions,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReference {
  pub sha: String,
  /// Host locator for the commit detail.
  pub url: String,
  pub author: Option<String>,
  pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
  pub additions: i64,
  pub deletions: i64,
}

/// Per-contributor rollup for one repository and one fetch window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributorAggregate {
  pub username: String,
  pub commits: i64,
  pub additions: i64,
  pub deletions: i64,
  pub contributions: i64,
}

impl ContributorAggregate {
  pub fn empty(contributor: &Contributor) -> ContributorAggregate {
    ContributorAggregate {
      username: contributor.login.clone(),
      contributions: contributor.contributions,
      ..Default::default()
    }
  }
}

/// The persisted unit, unique per (repository, owner, username).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
  pub repository: String,
  pub owner: String,
  pub username: String,
  pub score: f64,
  pub additions: i64,
  pub deletions: i64,
  pub commits: i64,
  pub formula_version: u32,
  pub updated_at: DateTime<Utc>,
}

impl ScoreRecord {
  /// Score rounded to two decimals for display.
  pub fn display_score(&self) -> f64 {
    (self.score * 100.0).round() / 100.0
  }
}

bitflags! {
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct ContributorFlags: u8 {
    const COMPLETE = 0b0000;
    /// The commit list could not be fetched; scored as zero commits.
    const COMMITS_UNAVAILABLE = 0b0001;
    /// At least one commit detail failed and counted as zero.
    const PARTIAL_STATS = 0b0010;
    /// More commits may exist beyond the fetch window.
    const WINDOW_TRUNCATED = 0b0100;
    /// The host returned no commits for the contributor.
    const NO_COMMITS = 0b1000;
  }
}
