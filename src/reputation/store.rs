use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{ReputationError, Result};
use crate::reputation::{canonical_login, ContributorAggregate, ScoreRecord};

/// Persistent home of [`ScoreRecord`]s, keyed by (repository, owner, username).
///
/// Usernames are GitHub logins and compare case-insensitively.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Insert each record, or overwrite the one already stored under its key.
    /// The batch is applied atomically: either every record lands or none do.
    async fn upsert_batch(&self, records: &[ScoreRecord]) -> Result<()>;

    async fn find(&self, repository: &str, owner: &str, username: &str)
        -> Result<Option<ScoreRecord>>;

    /// All records for a repository, highest score first.
    async fn list(&self, repository: &str, owner: &str) -> Result<Vec<ScoreRecord>>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scores (
    repository      TEXT    NOT NULL,
    owner           TEXT    NOT NULL,
    username        TEXT    NOT NULL COLLATE NOCASE,
    score           REAL    NOT NULL,
    additions       INTEGER NOT NULL,
    deletions       INTEGER NOT NULL,
    commits         INTEGER NOT NULL,
    formula_version INTEGER NOT NULL,
    updated_at      TEXT    NOT NULL,
    PRIMARY KEY (repository, owner, username)
);";

const UPSERT: &str = "
INSERT INTO scores (repository, owner, username, score, additions, deletions, commits, formula_version, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(repository, owner, username) DO UPDATE SET
    score           = excluded.score,
    additions       = excluded.additions,
    deletions       = excluded.deletions,
    commits         = excluded.commits,
    formula_version = excluded.formula_version,
    updated_at      = excluded.updated_at";

const SELECT_COLUMNS: &str = "SELECT repository, owner, username, score, additions, deletions, commits, formula_version, updated_at FROM scores";

pub struct SqliteScoreStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteScoreStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| ReputationError::StoreUnavailable("connection lock poisoned".into()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| ReputationError::StoreUnavailable(format!("store task failed: {e}")))?
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ScoreRecord> {
    let updated_at: String = row.get(8)?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(ScoreRecord {
        repository: row.get(0)?,
        owner: row.get(1)?,
        username: row.get(2)?,
        score: row.get(3)?,
        additions: row.get(4)?,
        deletions: row.get(5)?,
        commits: row.get(6)?,
        formula_version: row.get(7)?,
        updated_at,
    })
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn upsert_batch(&self, records: &[ScoreRecord]) -> Result<()> {
        let records = records.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(UPSERT)?;
                for r in &records {
                    stmt.execute(params![
                        r.repository,
                        r.owner,
                        canonical_login(&r.username),
                        r.score,
                        r.additions,
                        r.deletions,
                        r.commits,
                        r.formula_version,
                        r.updated_at.to_rfc3339(),
                    ])?;
                }
            }
            tx.commit()?;
            debug!("Upserted {} score record(s).", records.len());
            Ok(())
        })
        .await
    }

    async fn find(
        &self,
        repository: &str,
        owner: &str,
        username: &str,
    ) -> Result<Option<ScoreRecord>> {
        let (repository, owner, username) =
            (repository.to_owned(), owner.to_owned(), canonical_login(username));
        self.with_conn(move |conn| {
            let sql =
                format!("{SELECT_COLUMNS} WHERE repository = ?1 AND owner = ?2 AND username = ?3");
            let record = conn
                .query_row(&sql, params![repository, owner, username], record_from_row)
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn list(&self, repository: &str, owner: &str) -> Result<Vec<ScoreRecord>> {
        let (repository, owner) = (repository.to_owned(), owner.to_owned());
        self.with_conn(move |conn| {
            let sql = format!(
                "{SELECT_COLUMNS} WHERE repository = ?1 AND owner = ?2 ORDER BY score DESC, username ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![repository, owner], record_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

/// Write one invocation's scores for `owner/repository`.
///
/// Every pair becomes a [`ScoreRecord`] stamped with `formula_version` and the
/// current time; the whole batch goes to the store in one atomic upsert.
/// Logins are canonicalised so `Alice` and `alice` share one record.
pub async fn reconcile(
    store: &dyn ScoreStore,
    repository: &str,
    owner: &str,
    scored: &[(ContributorAggregate, f64)],
    formula_version: u32,
) -> Result<Vec<ScoreRecord>> {
    let now = Utc::now();
    let records: Vec<ScoreRecord> = scored
        .iter()
        .map(|(aggregate, score)| ScoreRecord {
            repository: repository.to_string(),
            owner: owner.to_string(),
            username: canonical_login(&aggregate.username),
            score: *score,
            additions: aggregate.additions,
            deletions: aggregate.deletions,
            commits: aggregate.commits,
            formula_version,
            updated_at: now,
        })
        .collect();

    if records.is_empty() {
        return Ok(records);
    }
    store.upsert_batch(&records).await?;
    Ok(records)
}
