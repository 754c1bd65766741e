use async_trait::async_trait;
use log::{debug, warn};

use crate::error::{ReputationError, Result};
use crate::github;
use crate::reputation::{CommitReference, CommitStats, Contributor, ContributorFlags};

/// The commits found for one contributor, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitWindow {
    pub commits: Vec<CommitReference>,
    /// More commits may exist past the end of the window.
    pub truncated: bool,
}

/// Read-only access to a version-control host.
#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn list_contributors(&self, owner: &str, repo: &str) -> Result<Vec<Contributor>>;

    async fn list_commits(&self, owner: &str, repo: &str, author: &str) -> Result<CommitWindow>;

    async fn commit_stats(
        &self,
        owner: &str,
        repo: &str,
        commit: &CommitReference,
    ) -> Result<CommitStats>;
}

pub struct GitHubSource {
    gh: octocrab::Octocrab,
    per_page: u8,
    max_commits: usize,
}

impl GitHubSource {
    pub fn new(gh: octocrab::Octocrab, per_page: u8, max_commits: usize) -> GitHubSource {
        GitHubSource {
            gh,
            per_page: per_page.clamp(1, 100),
            max_commits,
        }
    }
}

#[async_trait]
impl CommitSource for GitHubSource {
    async fn list_contributors(&self, owner: &str, repo: &str) -> Result<Vec<Contributor>> {
        let mut to_return = Vec::new();
        let mut page_number = 1u32;

        loop {
            let current_page =
                github::list_contributors_page(&self.gh, owner, repo, self.per_page, page_number)
                    .await?;
            let short_page = current_page.len() < self.per_page as usize;

            to_return.extend(current_page.into_iter().map(|c| Contributor {
                login: c.login,
                avatar_url: c.avatar_url,
                contributions: c.contributions,
            }));

            // Stop looking if we're not getting any more items
            if short_page {
                debug!("Finished paging through contributors of {owner}/{repo}.");
                break;
            }
            page_number += 1;
        }

        Ok(to_return)
    }

    async fn list_commits(&self, owner: &str, repo: &str, author: &str) -> Result<CommitWindow> {
        let mut window = CommitWindow::default();
        let mut page_number = 1u32;

        'pagination_loop: loop {
            let current_page = github::list_commits_page(
                &self.gh,
                owner,
                repo,
                author,
                self.per_page,
                page_number,
            )
            .await?;
            let short_page = current_page.len() < self.per_page as usize;

            for item in current_page {
                if window.commits.len() >= self.max_commits {
                    window.truncated = true;
                    break 'pagination_loop;
                }
                window.commits.push(CommitReference {
                    sha: item.sha,
                    url: item.url,
                    author: item.author.map(|a| a.login),
                    timestamp: item.commit.and_then(|c| c.author).and_then(|a| a.date),
                });
            }

            if short_page {
                break 'pagination_loop;
            }
            if window.commits.len() >= self.max_commits {
                window.truncated = true;
                break 'pagination_loop;
            }
            page_number += 1;
        }

        debug!(
            "Fetched {} commits by {author} in {owner}/{repo} over {page_number} page(s).",
            window.commits.len()
        );
        Ok(window)
    }

    async fn commit_stats(
        &self,
        owner: &str,
        repo: &str,
        commit: &CommitReference,
    ) -> Result<CommitStats> {
        let detail = github::get_commit_detail(&self.gh, owner, repo, &commit.sha).await?;
        let stats = detail.stats.ok_or_else(|| {
            ReputationError::UpstreamUnavailable(format!("commit {} has no stats", detail.sha))
        })?;
        Ok(CommitStats {
            additions: stats.additions,
            deletions: stats.deletions,
        })
    }
}

/// Fetch a contributor's commit window, treating an unavailable host as an
/// empty window. Only credential failures are passed back to the caller.
pub async fn fetch_commit_window(
    source: &dyn CommitSource,
    owner: &str,
    repo: &str,
    contributor: &Contributor,
) -> Result<(CommitWindow, ContributorFlags)> {
    match source.list_commits(owner, repo, &contributor.login).await {
        Ok(window) => {
            let mut flags = ContributorFlags::COMPLETE;
            if window.commits.is_empty() {
                flags |= ContributorFlags::NO_COMMITS;
            }
            if window.truncated {
                flags |= ContributorFlags::WINDOW_TRUNCATED;
            }
            Ok((window, flags))
        }
        Err(ReputationError::UpstreamUnavailable(reason)) => {
            warn!(
                "Commit list for {} in {owner}/{repo} unavailable, counting zero commits: {reason}",
                contributor.login
            );
            Ok((CommitWindow::default(), ContributorFlags::COMMITS_UNAVAILABLE))
        }
        Err(e) => Err(e),
    }
}
