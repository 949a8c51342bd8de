use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Minimum score an issue needs to stay in the store.
///
/// Anything below this is either assigned, paid out, or too vague to be
/// worth surfacing, so it is never inserted and gets pruned if it decays.
pub const MIN_SCORE_THRESHOLD: u32 = 30;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid issue data: {0}")]
    InvalidIssue(String),

    #[error("Issue {github_id} scored {score}, below storage threshold")]
    BelowThreshold { github_id: u64, score: u32 },

    #[error("Issue not found: {0}")]
    IssueNotFound(u64),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Unknown setting key: {0}")]
    UnknownSettingKey(String),

    #[error("Malformed value for setting {key}: {reason}")]
    MalformedSetting { key: String, reason: String },
}

type Result<T> = std::result::Result<T, StoreError>;

/// SQLite store for scored issues, repositories, statuses, and settings.
///
/// SQLite was chosen because:
/// - Zero-config embedded database
/// - Battle-tested and reliable
/// - Doesn't require a separate process
pub struct Store {
    conn: Mutex<Connection>,
}

/// What an upsert did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Everything the sync layer persists for one scored issue.
#[derive(Debug, Clone)]
pub struct IssueUpsert {
    pub github_id: u64,
    /// Normalized "owner/repo" name.
    pub repository: String,
    pub repository_url: String,
    pub language: Option<String>,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub body: String,
    pub state: String,
    pub comments: u32,
    pub created_at: String,
    pub updated_at: String,
    pub score: u32,
    pub has_bounty_label: bool,
    pub has_bounty_comment: bool,
    pub has_payout_comment: bool,
    pub has_assignment_comment: bool,
    pub has_implementation_details: bool,
    pub bounty_value: u64,
    pub labels: Vec<String>,
}

/// A stored issue row, joined with its repository and user status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredIssue {
    pub id: i64,
    pub github_id: u64,
    pub repository_id: i64,
    pub repository: String,
    pub language: Option<String>,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub body: String,
    pub state: String,
    pub comments: u32,
    pub created_at: String,
    pub updated_at: String,
    pub score: u32,
    pub has_bounty_label: bool,
    pub has_bounty_comment: bool,
    pub has_payout_comment: bool,
    pub has_assignment_comment: bool,
    pub has_implementation_details: bool,
    pub bounty_value: u64,
    pub labels: Vec<String>,
    pub last_fetched_at: String,
    pub user_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRepository {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub repo_name: String,
    pub language: Option<String>,
    pub url: String,
    pub is_active: bool,
    pub is_hidden: bool,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS repositories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                owner TEXT NOT NULL,
                repo_name TEXT NOT NULL,
                language TEXT,
                url TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_hidden INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS repositories_name_idx ON repositories(name);
            CREATE INDEX IF NOT EXISTS repositories_is_hidden_idx ON repositories(is_hidden);

            CREATE TABLE IF NOT EXISTS bounty_issues (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                github_id INTEGER NOT NULL UNIQUE,
                repository_id INTEGER NOT NULL REFERENCES repositories(id),
                number INTEGER NOT NULL,
                title TEXT NOT NULL,
                html_url TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL,
                comments INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                score INTEGER NOT NULL DEFAULT 0,
                has_bounty_label INTEGER NOT NULL DEFAULT 0,
                has_bounty_comment INTEGER NOT NULL DEFAULT 0,
                has_payout_comment INTEGER NOT NULL DEFAULT 0,
                has_assignment_comment INTEGER NOT NULL DEFAULT 0,
                has_implementation_details INTEGER NOT NULL DEFAULT 0,
                bounty_value INTEGER NOT NULL DEFAULT 0,
                labels TEXT NOT NULL DEFAULT '[]',
                last_fetched_at TEXT NOT NULL,
                created_local_at TEXT NOT NULL,
                updated_local_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS bounty_issues_github_id_idx ON bounty_issues(github_id);
            CREATE INDEX IF NOT EXISTS bounty_issues_score_idx ON bounty_issues(score);
            CREATE INDEX IF NOT EXISTS bounty_issues_repository_id_idx ON bounty_issues(repository_id);
            CREATE INDEX IF NOT EXISTS bounty_issues_state_idx ON bounty_issues(state);

            CREATE TABLE IF NOT EXISTS issue_status (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                issue_id INTEGER NOT NULL,
                github_id INTEGER NOT NULL UNIQUE,
                status TEXT NOT NULL CHECK (status IN ('interested', 'in_progress', 'unwanted')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS issue_status_github_id_idx ON issue_status(github_id);
            CREATE INDEX IF NOT EXISTS issue_status_status_idx ON issue_status(status);

            CREATE TABLE IF NOT EXISTS user_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                setting_key TEXT NOT NULL UNIQUE,
                setting_value TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS user_settings_setting_key_idx ON user_settings(setting_key);",
        )?;
        Ok(())
    }

    /// Look up a repository by name, creating it on first sighting.
    ///
    /// A fresh non-empty language observation refreshes the stored one;
    /// repositories are never deleted here.
    pub fn get_or_create_repository(
        &self,
        name: &str,
        url: &str,
        language: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        let now = now();

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM repositories WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            if let Some(language) = language.filter(|l| !l.is_empty()) {
                conn.execute(
                    "UPDATE repositories SET language = ?1, updated_at = ?2 WHERE id = ?3",
                    params![language, now, id],
                )?;
            }
            return Ok(id);
        }

        let mut parts = name.splitn(2, '/');
        let owner = parts.next().filter(|s| !s.is_empty()).unwrap_or("unknown");
        let repo_name = parts.next().unwrap_or(name);

        conn.execute(
            "INSERT INTO repositories (name, owner, repo_name, language, url, is_active, is_hidden, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, ?6, ?6)",
            params![name, owner, repo_name, language.filter(|l| !l.is_empty()), url, now],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Insert or update one scored issue, keyed by its GitHub id.
    pub fn upsert_issue(&self, issue: &IssueUpsert) -> Result<UpsertOutcome> {
        if issue.github_id == 0 || issue.title.is_empty() || issue.html_url.is_empty() {
            return Err(StoreError::InvalidIssue(format!(
                "issue {} is missing required fields",
                issue.github_id
            )));
        }

        // Below-threshold issues never make it into the store
        if issue.score < MIN_SCORE_THRESHOLD {
            return Err(StoreError::BelowThreshold {
                github_id: issue.github_id,
                score: issue.score,
            });
        }

        let repository_id = self.get_or_create_repository(
            &issue.repository,
            &issue.repository_url,
            issue.language.as_deref(),
        )?;

        let labels_json = serde_json::to_string(&issue.labels)?;
        let conn = self.conn();
        let now = now();

        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM bounty_issues WHERE github_id = ?1",
                params![issue.github_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = exists {
            conn.execute(
                "UPDATE bounty_issues SET
                    repository_id = ?1, number = ?2, title = ?3, html_url = ?4,
                    body = ?5, state = ?6, comments = ?7, created_at = ?8,
                    updated_at = ?9, score = ?10, has_bounty_label = ?11,
                    has_bounty_comment = ?12, has_payout_comment = ?13,
                    has_assignment_comment = ?14, has_implementation_details = ?15,
                    bounty_value = ?16, labels = ?17, last_fetched_at = ?18,
                    updated_local_at = ?18
                 WHERE id = ?19",
                params![
                    repository_id,
                    issue.number,
                    issue.title,
                    issue.html_url,
                    issue.body,
                    issue.state,
                    issue.comments,
                    issue.created_at,
                    issue.updated_at,
                    issue.score,
                    issue.has_bounty_label,
                    issue.has_bounty_comment,
                    issue.has_payout_comment,
                    issue.has_assignment_comment,
                    issue.has_implementation_details,
                    issue.bounty_value,
                    labels_json,
                    now,
                    id,
                ],
            )?;
            debug!(github_id = issue.github_id, "Updated stored issue");
            Ok(UpsertOutcome::Updated)
        } else {
            conn.execute(
                "INSERT INTO bounty_issues (
                    github_id, repository_id, number, title, html_url, body,
                    state, comments, created_at, updated_at, score,
                    has_bounty_label, has_bounty_comment, has_payout_comment,
                    has_assignment_comment, has_implementation_details,
                    bounty_value, labels, last_fetched_at, created_local_at,
                    updated_local_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                           ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19, ?19)",
                params![
                    issue.github_id,
                    repository_id,
                    issue.number,
                    issue.title,
                    issue.html_url,
                    issue.body,
                    issue.state,
                    issue.comments,
                    issue.created_at,
                    issue.updated_at,
                    issue.score,
                    issue.has_bounty_label,
                    issue.has_bounty_comment,
                    issue.has_payout_comment,
                    issue.has_assignment_comment,
                    issue.has_implementation_details,
                    issue.bounty_value,
                    labels_json,
                    now,
                ],
            )?;
            debug!(github_id = issue.github_id, "Inserted new issue");
            Ok(UpsertOutcome::Inserted)
        }
    }

    /// Remove one stored issue by GitHub id. Returns whether a row existed.
    pub fn delete_issue(&self, github_id: u64) -> Result<bool> {
        let conn = self.conn();
        let removed = conn.execute(
            "DELETE FROM bounty_issues WHERE github_id = ?1",
            params![github_id],
        )?;
        conn.execute(
            "DELETE FROM issue_status WHERE github_id = ?1",
            params![github_id],
        )?;

        if removed > 0 {
            debug!(github_id, "Deleted stored issue");
        }
        Ok(removed > 0)
    }

    /// Delete every stored issue whose score fell below `threshold`.
    pub fn prune_below(&self, threshold: u32) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM bounty_issues WHERE score < ?1",
            params![threshold],
        )?;

        if removed > 0 {
            info!(removed, threshold, "Pruned low-scoring issues");
        }
        Ok(removed)
    }

    /// Fetch one stored issue by GitHub id.
    pub fn issue_by_github_id(&self, github_id: u64) -> Result<Option<StoredIssue>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT i.id, i.github_id, i.repository_id, r.name, r.language,
                    i.number, i.title, i.html_url, i.body, i.state, i.comments,
                    i.created_at, i.updated_at, i.score, i.has_bounty_label,
                    i.has_bounty_comment, i.has_payout_comment,
                    i.has_assignment_comment, i.has_implementation_details,
                    i.bounty_value, i.labels, i.last_fetched_at, s.status
             FROM bounty_issues i
             JOIN repositories r ON i.repository_id = r.id
             LEFT JOIN issue_status s ON i.github_id = s.github_id
             WHERE i.github_id = ?1",
        )?;

        let issue = stmt
            .query_row(params![github_id], map_stored_issue)
            .optional()?;
        Ok(issue)
    }

    /// Number of issues currently stored.
    pub fn issue_count(&self) -> Result<u64> {
        let count: u64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM bounty_issues", [], |row| row.get(0))?;
        Ok(count)
    }

    /// When the store last saw fresh data, if ever.
    pub fn last_fetched_at(&self) -> Result<Option<String>> {
        let last: Option<String> = self.conn().query_row(
            "SELECT MAX(last_fetched_at) FROM bounty_issues",
            [],
            |row| row.get(0),
        )?;
        Ok(last)
    }

    /// All active repositories, ordered by name.
    pub fn repositories(&self) -> Result<Vec<StoredRepository>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, owner, repo_name, language, url, is_active, is_hidden
             FROM repositories WHERE is_active = 1 ORDER BY name ASC",
        )?;

        let repos = stmt
            .query_map([], |row| {
                Ok(StoredRepository {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    owner: row.get(2)?,
                    repo_name: row.get(3)?,
                    language: row.get(4)?,
                    url: row.get(5)?,
                    is_active: row.get(6)?,
                    is_hidden: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    /// Toggle a repository's visibility in search results.
    pub fn set_repository_hidden(&self, name: &str, hidden: bool) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE repositories SET is_hidden = ?1, updated_at = ?2 WHERE name = ?3",
            params![hidden, now(), name],
        )?;

        if changed == 0 {
            return Err(StoreError::RepositoryNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Names of all hidden repositories.
    pub fn hidden_repositories(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT name FROM repositories WHERE is_hidden = 1 ORDER BY name ASC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn map_stored_issue(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredIssue> {
    let labels_json: String = row.get(20)?;
    // A corrupt labels blob should not make the row unreadable
    let labels: Vec<String> = serde_json::from_str(&labels_json).unwrap_or_default();

    Ok(StoredIssue {
        id: row.get(0)?,
        github_id: row.get(1)?,
        repository_id: row.get(2)?,
        repository: row.get(3)?,
        language: row.get(4)?,
        number: row.get(5)?,
        title: row.get(6)?,
        html_url: row.get(7)?,
        body: row.get(8)?,
        state: row.get(9)?,
        comments: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        score: row.get(13)?,
        has_bounty_label: row.get(14)?,
        has_bounty_comment: row.get(15)?,
        has_payout_comment: row.get(16)?,
        has_assignment_comment: row.get(17)?,
        has_implementation_details: row.get(18)?,
        bounty_value: row.get(19)?,
        labels,
        last_fetched_at: row.get(21)?,
        user_status: row.get(22)?,
    })
}

#[cfg(test)]
pub(crate) fn sample_upsert(github_id: u64, score: u32) -> IssueUpsert {
    IssueUpsert {
        github_id,
        repository: "facebook/react".to_string(),
        repository_url: "https://api.github.com/repos/facebook/react".to_string(),
        language: Some("JavaScript".to_string()),
        number: github_id,
        title: format!("Issue {}", github_id),
        html_url: format!("https://github.com/facebook/react/issues/{}", github_id),
        body: "A body".to_string(),
        state: "open".to_string(),
        comments: 3,
        created_at: "2024-01-01T00:00:00Z".to_string(),
        updated_at: "2024-01-02T00:00:00Z".to_string(),
        score,
        has_bounty_label: true,
        has_bounty_comment: false,
        has_payout_comment: false,
        has_assignment_comment: false,
        has_implementation_details: true,
        bounty_value: 500,
        labels: vec!["bounty".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_inserts_then_updates() {
        let store = Store::open_in_memory().unwrap();

        let outcome = store.upsert_issue(&sample_upsert(1, 75)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let outcome = store.upsert_issue(&sample_upsert(1, 80)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        assert_eq!(store.issue_count().unwrap(), 1);
        let issue = store.issue_by_github_id(1).unwrap().unwrap();
        assert_eq!(issue.score, 80);
        assert_eq!(issue.repository, "facebook/react");
        assert_eq!(issue.labels, vec!["bounty".to_string()]);
    }

    #[test]
    fn upsert_rejects_below_threshold() {
        let store = Store::open_in_memory().unwrap();

        let result = store.upsert_issue(&sample_upsert(2, 10));
        assert!(matches!(
            result,
            Err(StoreError::BelowThreshold { score: 10, .. })
        ));
        assert_eq!(store.issue_count().unwrap(), 0);
    }

    #[test]
    fn upsert_rejects_missing_fields() {
        let store = Store::open_in_memory().unwrap();

        let mut issue = sample_upsert(3, 75);
        issue.html_url.clear();
        assert!(matches!(
            store.upsert_issue(&issue),
            Err(StoreError::InvalidIssue(_))
        ));
    }

    #[test]
    fn delete_removes_issue_and_its_status() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_issue(&sample_upsert(1, 75)).unwrap();
        store
            .set_issue_status(1, Some(crate::IssueStatusKind::Interested))
            .unwrap();

        assert!(store.delete_issue(1).unwrap());
        assert!(store.issue_by_github_id(1).unwrap().is_none());
        assert_eq!(store.issue_status(1).unwrap(), None);

        // Deleting a missing issue is not an error
        assert!(!store.delete_issue(1).unwrap());
    }

    #[test]
    fn prune_removes_decayed_scores() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_issue(&sample_upsert(1, 75)).unwrap();
        store.upsert_issue(&sample_upsert(2, 40)).unwrap();

        // Simulate a later run re-scoring issue 2 below the bar
        store
            .conn()
            .execute("UPDATE bounty_issues SET score = 15 WHERE github_id = 2", [])
            .unwrap();

        let pruned = store.prune_below(MIN_SCORE_THRESHOLD).unwrap();
        assert_eq!(pruned, 1);
        assert!(store.issue_by_github_id(2).unwrap().is_none());
        assert!(store.issue_by_github_id(1).unwrap().is_some());
    }

    #[test]
    fn repository_language_refreshes_on_resighting() {
        let store = Store::open_in_memory().unwrap();

        let id = store
            .get_or_create_repository("acme/widgets", "https://api.github.com/repos/acme/widgets", None)
            .unwrap();
        let again = store
            .get_or_create_repository(
                "acme/widgets",
                "https://api.github.com/repos/acme/widgets",
                Some("Rust"),
            )
            .unwrap();
        assert_eq!(id, again);

        let repos = store.repositories().unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].language.as_deref(), Some("Rust"));
        assert_eq!(repos[0].owner, "acme");
        assert_eq!(repos[0].repo_name, "widgets");
    }

    #[test]
    fn hidden_repositories_round_trip() {
        let store = Store::open_in_memory().unwrap();
        store
            .get_or_create_repository("acme/widgets", "url", None)
            .unwrap();

        store.set_repository_hidden("acme/widgets", true).unwrap();
        assert_eq!(store.hidden_repositories().unwrap(), vec!["acme/widgets"]);

        store.set_repository_hidden("acme/widgets", false).unwrap();
        assert!(store.hidden_repositories().unwrap().is_empty());

        assert!(matches!(
            store.set_repository_hidden("nope/missing", true),
            Err(StoreError::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn freshness_reflects_upserts() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.last_fetched_at().unwrap().is_none());

        store.upsert_issue(&sample_upsert(1, 75)).unwrap();
        assert!(store.last_fetched_at().unwrap().is_some());
    }
}
