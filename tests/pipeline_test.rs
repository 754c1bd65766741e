use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use contributor_reputation::config::ScoringConfig;
use contributor_reputation::reputation::commit_source::{CommitSource, CommitWindow};
use contributor_reputation::reputation::pipeline::{ScoreRequest, ScoringPipeline};
use contributor_reputation::reputation::store::{ScoreStore, SqliteScoreStore};
use contributor_reputation::reputation::{
    CommitReference, CommitStats, Contributor, ContributorFlags, ScoreRecord,
};
use contributor_reputation::{ReputationError, Result};

/// In-memory stand-in for the GitHub API.
#[derive(Default)]
struct FakeSource {
    contributors: Vec<Contributor>,
    commits: HashMap<String, Vec<String>>,
    stats: HashMap<String, CommitStats>,
    unavailable_authors: HashSet<String>,
    failing_commits: HashSet<String>,
    unauthenticated: bool,
    hang_on_stats: bool,
}

impl FakeSource {
    fn with_contributor(mut self, login: &str, contributions: i64, stats: &[(i64, i64)]) -> Self {
        self.contributors.push(Contributor::new(login, contributions));
        let mut shas = Vec::new();
        for (i, (additions, deletions)) in stats.iter().enumerate() {
            let sha = format!("{login}-{i}");
            self.stats.insert(
                sha.clone(),
                CommitStats {
                    additions: *additions,
                    deletions: *deletions,
                },
            );
            shas.push(sha);
        }
        self.commits.insert(login.to_string(), shas);
        self
    }
}

#[async_trait]
impl CommitSource for FakeSource {
    async fn list_contributors(&self, _owner: &str, _repo: &str) -> Result<Vec<Contributor>> {
        Ok(self.contributors.clone())
    }

    async fn list_commits(&self, owner: &str, repo: &str, author: &str) -> Result<CommitWindow> {
        if self.unauthenticated {
            return Err(ReputationError::Unauthenticated("Bad credentials".into()));
        }
        if self.unavailable_authors.contains(author) {
            return Err(ReputationError::UpstreamUnavailable("502".into()));
        }
        let commits = self
            .commits
            .get(author)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|sha| CommitReference {
                url: format!("https://api.github.com/repos/{owner}/{repo}/commits/{sha}"),
                sha,
                author: Some(author.to_string()),
                timestamp: None,
            })
            .collect();
        Ok(CommitWindow {
            commits,
            truncated: false,
        })
    }

    async fn commit_stats(
        &self,
        _owner: &str,
        _repo: &str,
        commit: &CommitReference,
    ) -> Result<CommitStats> {
        if self.hang_on_stats {
            futures::future::pending::<()>().await;
        }
        if self.failing_commits.contains(&commit.sha) {
            return Err(ReputationError::UpstreamUnavailable("404".into()));
        }
        self.stats
            .get(&commit.sha)
            .copied()
            .ok_or_else(|| ReputationError::UpstreamUnavailable("unknown commit".into()))
    }
}

struct UnreachableStore;

#[async_trait]
impl ScoreStore for UnreachableStore {
    async fn upsert_batch(&self, _records: &[ScoreRecord]) -> Result<()> {
        Err(ReputationError::StoreUnavailable("connection refused".into()))
    }

    async fn find(&self, _: &str, _: &str, _: &str) -> Result<Option<ScoreRecord>> {
        Err(ReputationError::StoreUnavailable("connection refused".into()))
    }

    async fn list(&self, _: &str, _: &str) -> Result<Vec<ScoreRecord>> {
        Err(ReputationError::StoreUnavailable("connection refused".into()))
    }
}

fn alice_source() -> FakeSource {
    FakeSource::default().with_contributor("alice", 20, &[(10, 2), (5, 1), (0, 0)])
}

fn request() -> ScoreRequest {
    ScoreRequest::repository("acme", "widgets")
}

#[tokio::test]
async fn test_scores_and_stores_a_contributor() {
    let source = alice_source();
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let report = ScoringPipeline::new(&source, &store, &config)
        .run(&request())
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    let alice = &report.outcomes[0];
    assert_eq!(alice.aggregate.commits, 3);
    assert_eq!(alice.aggregate.additions, 15);
    assert_eq!(alice.aggregate.deletions, 3);
    assert!((alice.score - 0.146).abs() < 1e-9);
    assert_eq!(alice.flags, ContributorFlags::COMPLETE);

    let stored = store.find("widgets", "acme", "alice").await.unwrap().unwrap();
    assert_eq!(stored.additions, 15);
    assert_eq!(stored.deletions, 3);
    assert_eq!(stored.commits, 3);
    assert!((stored.score - 0.146).abs() < 1e-9);
}

#[tokio::test]
async fn test_unavailable_commit_list_counts_as_zero_and_others_still_score() {
    let mut source = alice_source().with_contributor("bob", 7, &[(100, 100)]);
    source.unavailable_authors.insert("bob".to_string());
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let report = ScoringPipeline::new(&source, &store, &config)
        .run(&request())
        .await
        .unwrap();

    assert!(report.failures.is_empty());
    let bob = report
        .outcomes
        .iter()
        .find(|o| o.aggregate.username == "bob")
        .unwrap();
    assert_eq!(bob.aggregate.commits, 0);
    assert_eq!(bob.aggregate.additions, 0);
    assert_eq!(bob.aggregate.deletions, 0);
    assert!(bob.flags.contains(ContributorFlags::COMMITS_UNAVAILABLE));

    let alice = store.find("widgets", "acme", "alice").await.unwrap().unwrap();
    assert_eq!(alice.additions, 15);
    assert_eq!(store.list("widgets", "acme").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_commit_detail_counts_as_zero() {
    let mut source = alice_source();
    source.failing_commits.insert("alice-0".to_string());
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let report = ScoringPipeline::new(&source, &store, &config)
        .run(&request())
        .await
        .unwrap();

    let alice = &report.outcomes[0];
    assert_eq!(alice.aggregate.commits, 3);
    assert_eq!(alice.aggregate.additions, 5);
    assert_eq!(alice.aggregate.deletions, 1);
    assert!(alice.flags.contains(ContributorFlags::PARTIAL_STATS));
}

#[tokio::test]
async fn test_negative_stats_skip_only_that_contributor() {
    let source = alice_source().with_contributor("carol", 3, &[(-5, 1)]);
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let report = ScoringPipeline::new(&source, &store, &config)
        .run(&request())
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].username, "carol");
    assert_eq!(report.failures[0].error.kind(), "invalid_aggregate");
    assert!(store.find("widgets", "acme", "carol").await.unwrap().is_none());
    assert!(store.find("widgets", "acme", "alice").await.unwrap().is_some());
}

#[tokio::test]
async fn test_bad_credentials_abort_without_writing() {
    let mut source = alice_source();
    source.unauthenticated = true;
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let err = ScoringPipeline::new(&source, &store, &config)
        .run(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, ReputationError::Unauthenticated(_)));
    assert!(store.list("widgets", "acme").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_store_fails_the_invocation() {
    let source = alice_source();
    let config = ScoringConfig::default();

    let err = ScoringPipeline::new(&source, &UnreachableStore, &config)
        .run(&request())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "store_unavailable");
}

#[tokio::test]
async fn test_rerunning_leaves_one_record_per_contributor() {
    let source = alice_source().with_contributor("bob", 1, &[(1, 1)]);
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();
    let pipeline = ScoringPipeline::new(&source, &store, &config);

    let first = pipeline.run(&request()).await.unwrap();
    let second = pipeline.run(&request()).await.unwrap();

    let stored = store.list("widgets", "acme").await.unwrap();
    assert_eq!(stored.len(), 2);
    for record in &stored {
        let latest = second
            .records
            .iter()
            .find(|r| r.username == record.username)
            .unwrap();
        assert_eq!(record.score, latest.score);
        assert_eq!(record.additions, latest.additions);
        assert_eq!(record.deletions, latest.deletions);
        assert_eq!(record.commits, latest.commits);
    }
    assert_eq!(first.outcomes, second.outcomes);
}

#[tokio::test]
async fn test_single_contributor_request() {
    let source = alice_source().with_contributor("bob", 1, &[(1, 1)]);
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let report = ScoringPipeline::new(&source, &store, &config)
        .run(&request().for_contributor("Alice"))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].aggregate.username, "alice");
    assert_eq!(report.outcomes[0].aggregate.contributions, 20);
    assert!(store.find("widgets", "acme", "bob").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unlisted_contributor_is_scored_without_reported_contributions() {
    let source = alice_source();
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let report = ScoringPipeline::new(&source, &store, &config)
        .run(&request().for_contributor("dave"))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    let dave = &report.outcomes[0];
    assert_eq!(dave.aggregate.contributions, 0);
    assert!(dave.flags.contains(ContributorFlags::NO_COMMITS));
    assert_eq!(dave.score, 0.0);
}

#[tokio::test]
async fn test_outcomes_are_sorted_by_score() {
    let source = FakeSource::default()
        .with_contributor("small", 1, &[(1, 0)])
        .with_contributor("large", 50, &[(500, 10)])
        .with_contributor("medium", 10, &[(40, 4)]);
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let report = ScoringPipeline::new(&source, &store, &config)
        .run(&request())
        .await
        .unwrap();

    let names: Vec<&str> = report
        .outcomes
        .iter()
        .map(|o| o.aggregate.username.as_str())
        .collect();
    assert_eq!(names, vec!["large", "medium", "small"]);
}

#[tokio::test]
async fn test_abandoned_invocation_writes_nothing() {
    let mut source = alice_source();
    source.hang_on_stats = true;
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();
    let pipeline = ScoringPipeline::new(&source, &store, &config);

    let result = tokio::time::timeout(Duration::from_millis(50), pipeline.run(&request())).await;

    assert!(result.is_err());
    assert!(store.list("widgets", "acme").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let source = alice_source();
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let err = ScoringPipeline::new(&source, &store, &config)
        .run(&ScoreRequest::repository("acme/evil", "widgets"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
}

#[tokio::test]
async fn test_login_casing_does_not_duplicate_records() {
    let source = alice_source();
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();
    let pipeline = ScoringPipeline::new(&source, &store, &config);

    pipeline.run(&request().for_contributor("Dave")).await.unwrap();
    pipeline.run(&request().for_contributor("dave")).await.unwrap();
    pipeline.run(&request().for_contributor("DAVE")).await.unwrap();

    let rows: Vec<String> = store
        .list("widgets", "acme")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.username)
        .collect();
    assert_eq!(rows, vec!["dave"]);
    assert!(store.find("widgets", "acme", "Dave").await.unwrap().is_some());
}

#[tokio::test]
async fn test_repository_without_contributors_yields_an_empty_report() {
    let source = FakeSource::default();
    let store = SqliteScoreStore::open_in_memory().unwrap();
    let config = ScoringConfig::default();

    let report = ScoringPipeline::new(&source, &store, &config)
        .run(&request())
        .await
        .unwrap();

    assert!(report.outcomes.is_empty());
    assert!(report.failures.is_empty());
    assert!(report.records.is_empty());
}
