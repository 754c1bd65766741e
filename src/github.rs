use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ReputationError, Result};

/// This function returns a live Octocrab instance authenticated with `token`.
///
/// A missing or blank token is refused up front; GitHub would otherwise answer
/// every call with a 401 and each contributor would be reported separately.
pub fn octocrab_handle(token: Option<&str>, base_uri: Option<&str>) -> Result<octocrab::Octocrab> {
    let token = match token.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            return Err(ReputationError::Unauthenticated(
                "no GitHub token was supplied".to_string(),
            ))
        }
    };

    let mut builder = octocrab::Octocrab::builder().personal_token(token);
    if let Some(uri) = base_uri {
        debug!("Using GitHub API at {}", uri);
        builder = builder
            .base_uri(uri)
            .map_err(|e| ReputationError::InvalidInput(format!("bad GitHub API URL {uri}: {e}")))?;
    }

    builder
        .build()
        .map_err(|e| ReputationError::UpstreamUnavailable(format!("failed to build client: {e}")))
}

#[derive(Debug, Serialize)]
struct CommitPageParams<'a> {
    author: &'a str,
    per_page: u8,
    page: u32,
}

/// One entry of `GET /repos/{owner}/{repo}/contributors`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributorPayload {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub contributions: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitUserPayload {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitSignaturePayload {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCommitPayload {
    #[serde(default)]
    pub author: Option<GitSignaturePayload>,
}

/// One entry of `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitSummaryPayload {
    pub sha: String,
    pub url: String,
    #[serde(default)]
    pub author: Option<CommitUserPayload>,
    #[serde(default)]
    pub commit: Option<GitCommitPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsPayload {
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
}

/// `GET /repos/{owner}/{repo}/commits/{sha}`, trimmed to what scoring reads.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetailPayload {
    pub sha: String,
    #[serde(default)]
    pub stats: Option<StatsPayload>,
}

/// GitHub answers `204 No Content` instead of `[]` for an empty repository.
pub async fn list_contributors_page(
    gh: &octocrab::Octocrab,
    owner: &str,
    name: &str,
    per_page: u8,
    page: u32,
) -> Result<Vec<ContributorPayload>> {
    let route = format!("/repos/{owner}/{name}/contributors?per_page={per_page}&page={page}");
    let response = octocrab::map_github_error(gh._get(route).await?).await?;
    let body = gh.body_to_string(response).await?;

    if body.trim().is_empty() {
        debug!("No contributors body for {owner}/{name}, treating it as an empty page.");
        return Ok(Vec::new());
    }
    serde_json::from_str(&body).map_err(|e| {
        ReputationError::UpstreamUnavailable(format!("malformed contributors page: {e}"))
    })
}

pub async fn list_commits_page(
    gh: &octocrab::Octocrab,
    owner: &str,
    name: &str,
    author: &str,
    per_page: u8,
    page: u32,
) -> Result<Vec<CommitSummaryPayload>> {
    let route = format!("/repos/{owner}/{name}/commits");
    let params = CommitPageParams {
        author,
        per_page,
        page,
    };
    Ok(gh.get(route, Some(&params)).await?)
}

pub async fn get_commit_detail(
    gh: &octocrab::Octocrab,
    owner: &str,
    name: &str,
    sha: &str,
) -> Result<CommitDetailPayload> {
    let route = format!("/repos/{owner}/{name}/commits/{sha}");
    Ok(gh.get(route, None::<&()>).await?)
}
