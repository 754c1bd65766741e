use futures::stream::{self, StreamExt};
use log::*;

use crate::config::ScoringConfig;
use crate::error::{ReputationError, Result};
use crate::reputation::commit_source::{fetch_commit_window, CommitSource};
use crate::reputation::commit_stats::extract_aggregate;
use crate::reputation::store::{reconcile, ScoreStore};
use crate::reputation::{
    canonical_login, Contributor, ContributorAggregate, ContributorFlags, ScoreRecord,
};

/// What a trigger asks for: a whole repository, or one contributor in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRequest {
    pub owner: String,
    pub repo: String,
    pub contributor: Option<String>,
}

impl ScoreRequest {
    pub fn repository(owner: impl Into<String>, repo: impl Into<String>) -> ScoreRequest {
        ScoreRequest {
            owner: owner.into(),
            repo: repo.into(),
            contributor: None,
        }
    }

    pub fn for_contributor(mut self, login: impl Into<String>) -> ScoreRequest {
        self.contributor = Some(login.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let parts = [("owner", &self.owner), ("repo", &self.repo)];
        for (name, value) in parts {
            if value.trim().is_empty() || value.contains('/') {
                return Err(ReputationError::InvalidInput(format!(
                    "{name} must be a single non-empty path segment, got {value:?}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContributorOutcome {
    pub aggregate: ContributorAggregate,
    pub score: f64,
    pub flags: ContributorFlags,
}

/// A contributor that could not be scored. Nothing was written for it.
#[derive(Debug)]
pub struct ContributorFailure {
    pub username: String,
    pub error: ReputationError,
}

#[derive(Debug)]
pub struct ScoringReport {
    pub owner: String,
    pub repo: String,
    pub formula_version: u32,
    /// Highest score first.
    pub outcomes: Vec<ContributorOutcome>,
    pub failures: Vec<ContributorFailure>,
    pub records: Vec<ScoreRecord>,
}

pub struct ScoringPipeline<'a> {
    source: &'a dyn CommitSource,
    store: &'a dyn ScoreStore,
    config: &'a ScoringConfig,
}

impl<'a> ScoringPipeline<'a> {
    pub fn new(
        source: &'a dyn CommitSource,
        store: &'a dyn ScoreStore,
        config: &'a ScoringConfig,
    ) -> ScoringPipeline<'a> {
        ScoringPipeline {
            source,
            store,
            config,
        }
    }

    /// Run one scoring invocation end to end.
    ///
    /// Nothing is written until every requested contributor has been scored,
    /// so dropping the returned future before it resolves leaves the store
    /// untouched.
    pub async fn run(&self, request: &ScoreRequest) -> Result<ScoringReport> {
        request.validate()?;
        self.config.validate()?;

        let contributors = self.contributors_for(request).await?;
        info!(
            "Scoring {} contributor(s) of {}/{}",
            contributors.len(),
            request.owner,
            request.repo
        );

        let results: Vec<(String, Result<ContributorOutcome>)> = stream::iter(contributors)
            .map(|contributor| async move {
                let result = self.score_contributor(request, &contributor).await;
                (contributor.login, result)
            })
            .buffer_unordered(self.config.contributor_concurrency)
            .collect()
            .await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (username, result) in results {
            match result {
                Ok(outcome) => {
                    report_line(request, &outcome);
                    outcomes.push(outcome);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(error) => {
                    warn!("Skipping {username} in {}/{}: {error}", request.owner, request.repo);
                    failures.push(ContributorFailure { username, error });
                }
            }
        }

        outcomes.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.aggregate.username.cmp(&b.aggregate.username))
        });

        let pairs: Vec<(ContributorAggregate, f64)> = outcomes
            .iter()
            .map(|o| (o.aggregate.clone(), o.score))
            .collect();
        let records = reconcile(
            self.store,
            &request.repo,
            &request.owner,
            &pairs,
            self.config.formula.version,
        )
        .await?;

        Ok(ScoringReport {
            owner: request.owner.clone(),
            repo: request.repo.clone(),
            formula_version: self.config.formula.version,
            outcomes,
            failures,
            records,
        })
    }

    async fn contributors_for(&self, request: &ScoreRequest) -> Result<Vec<Contributor>> {
        let listed = self
            .source
            .list_contributors(&request.owner, &request.repo)
            .await;

        let Some(login) = request.contributor.as_deref() else {
            return listed;
        };

        let listed = match listed {
            Ok(listed) => listed,
            Err(ReputationError::UpstreamUnavailable(reason)) => {
                warn!("Contributor list unavailable, scoring {login} without it: {reason}");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let found = listed
            .into_iter()
            .find(|c| c.login.eq_ignore_ascii_case(login));
        Ok(vec![found.unwrap_or_else(|| {
            debug!("{login} is not a listed contributor; reported contributions count as 0");
            Contributor::new(canonical_login(login), 0)
        })])
    }

    async fn score_contributor(
        &self,
        request: &ScoreRequest,
        contributor: &Contributor,
    ) -> Result<ContributorOutcome> {
        let (window, window_flags) =
            fetch_commit_window(self.source, &request.owner, &request.repo, contributor).await?;

        let (aggregate, stats_flags) = extract_aggregate(
            self.source,
            &request.owner,
            &request.repo,
            contributor,
            &window,
            self.config.stats_concurrency,
        )
        .await?;

        let score = self.config.formula.score(&aggregate)?;
        Ok(ContributorOutcome {
            aggregate,
            score,
            flags: window_flags | stats_flags,
        })
    }
}

/// Log one line describing how complete a contributor's data was.
fn report_line(request: &ScoreRequest, outcome: &ContributorOutcome) {
    let who = &outcome.aggregate.username;
    let repo = format!("{}/{}", request.owner, request.repo);
    let flags = outcome.flags;

    if flags.contains(ContributorFlags::COMMITS_UNAVAILABLE) {
        warn!("{who} in {repo}: commit list unavailable, scored on contributions only.");
    }
    if flags.contains(ContributorFlags::PARTIAL_STATS) {
        warn!("{who} in {repo}: some commit stats were unavailable and counted as zero.");
    }
    if flags.contains(ContributorFlags::WINDOW_TRUNCATED) {
        info!("{who} in {repo}: older commits fall outside the fetch window.");
    }
    if flags.contains(ContributorFlags::NO_COMMITS) {
        debug!("{who} in {repo}: no commits found.");
    }
    info!(
        "{who} in {repo}: score {:.2} ({} commits, +{} -{})",
        outcome.score,
        outcome.aggregate.commits,
        outcome.aggregate.additions,
        outcome.aggregate.deletions
    );
}
