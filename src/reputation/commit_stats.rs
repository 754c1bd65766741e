use futures::stream::{self, StreamExt};
use log::{debug, warn};

use crate::error::{ReputationError, Result};
use crate::reputation::commit_source::{CommitSource, CommitWindow};
use crate::reputation::{CommitStats, Contributor, ContributorAggregate, ContributorFlags};

/// Order-independent sum of per-commit stats.
pub fn sum_stats<I>(stats: I) -> CommitStats
where
    I: IntoIterator<Item = CommitStats>,
{
    stats
        .into_iter()
        .fold(CommitStats::default(), |acc, s| CommitStats {
            additions: acc.additions.saturating_add(s.additions),
            deletions: acc.deletions.saturating_add(s.deletions),
        })
}

/// Fetch stats for every commit in `window` (at most `concurrency` at a time)
/// and fold them into the contributor's aggregate.
///
/// A commit whose detail cannot be fetched contributes nothing and marks the
/// aggregate with [`ContributorFlags::PARTIAL_STATS`]. A credential failure
/// aborts the extraction.
pub async fn extract_aggregate(
    source: &dyn CommitSource,
    owner: &str,
    repo: &str,
    contributor: &Contributor,
    window: &CommitWindow,
    concurrency: usize,
) -> Result<(ContributorAggregate, ContributorFlags)> {
    let results: Vec<Result<CommitStats>> = stream::iter(window.commits.iter())
        .map(|commit| async move {
            source.commit_stats(owner, repo, commit).await.map_err(|e| {
                if let ReputationError::UpstreamUnavailable(reason) = &e {
                    warn!(
                        "Stats for commit {} in {owner}/{repo} unavailable, counting zero: {reason}",
                        commit.sha
                    );
                }
                e
            })
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut flags = ContributorFlags::COMPLETE;
    let mut fetched = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(stats) => fetched.push(stats),
            Err(ReputationError::Unauthenticated(reason)) => {
                return Err(ReputationError::Unauthenticated(reason))
            }
            Err(_) => flags |= ContributorFlags::PARTIAL_STATS,
        }
    }

    let totals = sum_stats(fetched);
    debug!(
        "{}: {} commits, +{} -{}",
        contributor.login,
        window.commits.len(),
        totals.additions,
        totals.deletions
    );

    Ok((
        ContributorAggregate {
            username: contributor.login.clone(),
            commits: window.commits.len() as i64,
            additions: totals.additions,
            deletions: totals.deletions,
            contributions: contributor.contributions,
        },
        flags,
    ))
}
