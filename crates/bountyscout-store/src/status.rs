use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::store::{now, Store, StoreError};
use crate::Result;

/// User-assigned tri-state label on an issue, independent of its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatusKind {
    Interested,
    InProgress,
    Unwanted,
}

impl IssueStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatusKind::Interested => "interested",
            IssueStatusKind::InProgress => "in_progress",
            IssueStatusKind::Unwanted => "unwanted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "interested" => Some(IssueStatusKind::Interested),
            "in_progress" => Some(IssueStatusKind::InProgress),
            "unwanted" => Some(IssueStatusKind::Unwanted),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub interested: u64,
    pub in_progress: u64,
    pub unwanted: u64,
}

impl Store {
    /// Set or clear the user status for an issue. `None` removes the row.
    pub fn set_issue_status(
        &self,
        github_id: u64,
        status: Option<IssueStatusKind>,
    ) -> Result<()> {
        let conn = self.conn();

        let issue_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM bounty_issues WHERE github_id = ?1",
                params![github_id],
                |row| row.get(0),
            )
            .optional()?;

        let issue_id = issue_id.ok_or(StoreError::IssueNotFound(github_id))?;

        match status {
            None => {
                conn.execute(
                    "DELETE FROM issue_status WHERE github_id = ?1",
                    params![github_id],
                )?;
            }
            Some(status) => {
                conn.execute(
                    "INSERT INTO issue_status (issue_id, github_id, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(github_id) DO UPDATE SET status = ?3, updated_at = ?4",
                    params![issue_id, github_id, status.as_str(), now()],
                )?;
            }
        }

        Ok(())
    }

    pub fn issue_status(&self, github_id: u64) -> Result<Option<IssueStatusKind>> {
        let status: Option<String> = self
            .conn()
            .query_row(
                "SELECT status FROM issue_status WHERE github_id = ?1",
                params![github_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(status.as_deref().and_then(IssueStatusKind::parse))
    }

    pub fn status_counts(&self) -> Result<StatusCounts> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM issue_status GROUP BY status")?;

        let mut counts = StatusCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            match IssueStatusKind::parse(&status) {
                Some(IssueStatusKind::Interested) => counts.interested = count,
                Some(IssueStatusKind::InProgress) => counts.in_progress = count,
                Some(IssueStatusKind::Unwanted) => counts.unwanted = count,
                None => {}
            }
        }

        Ok(counts)
    }
}
