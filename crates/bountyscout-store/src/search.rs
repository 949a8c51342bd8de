use rusqlite::types::Value;
use serde::Serialize;

use crate::store::{map_stored_issue, Store, StoredIssue};
use crate::Result;

/// Explicit status filters for the browse surface.
///
/// With no filter the default view hides issues the user marked unwanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Interested,
    InProgress,
    /// Only issues with no user status at all.
    NoStatus,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub issues: Vec<StoredIssue>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
}

impl Store {
    /// Search stored issues, ordered by score descending.
    ///
    /// Semantics: only open issues, hidden repositories excluded,
    /// `repo:owner/name` tokens restrict to exactly those repositories, the
    /// remaining free text matches title/body/repository name, and unwanted
    /// issues stay out of the default view.
    pub fn search_issues(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
        status: Option<StatusFilter>,
    ) -> Result<SearchResults> {
        let parsed = parse_query(query);

        let mut conditions = vec![
            "i.state = 'open'".to_string(),
            "r.is_hidden = 0".to_string(),
        ];
        let mut bindings: Vec<Value> = Vec::new();

        if !parsed.text.is_empty() {
            let like = format!("%{}%", parsed.text);
            conditions
                .push("(i.title LIKE ? OR i.body LIKE ? OR r.name LIKE ?)".to_string());
            bindings.push(Value::Text(like.clone()));
            bindings.push(Value::Text(like.clone()));
            bindings.push(Value::Text(like));
        }

        if !parsed.repo_filters.is_empty() {
            let placeholders = vec!["?"; parsed.repo_filters.len()].join(", ");
            conditions.push(format!("r.name IN ({})", placeholders));
            for repo in &parsed.repo_filters {
                bindings.push(Value::Text(repo.clone()));
            }
        }

        match status {
            Some(StatusFilter::Interested) => {
                conditions.push("s.status = 'interested'".to_string());
            }
            Some(StatusFilter::InProgress) => {
                conditions.push("s.status = 'in_progress'".to_string());
            }
            Some(StatusFilter::NoStatus) => {
                conditions.push("s.status IS NULL".to_string());
            }
            None => {
                conditions.push("(s.status IS NULL OR s.status != 'unwanted')".to_string());
            }
        }

        let where_clause = conditions.join(" AND ");

        let from_clause = "FROM bounty_issues i
             JOIN repositories r ON i.repository_id = r.id
             LEFT JOIN issue_status s ON i.github_id = s.github_id";

        let conn = self.conn();

        let count_sql = format!("SELECT COUNT(*) {} WHERE {}", from_clause, where_clause);
        let total_count: u64 = conn.query_row(
            &count_sql,
            rusqlite::params_from_iter(bindings.iter()),
            |row| row.get(0),
        )?;

        let page = page.max(1);
        // Widened so an absurd page number cannot overflow the multiply
        let offset = u64::from(page - 1) * u64::from(per_page);
        let select_sql = format!(
            "SELECT i.id, i.github_id, i.repository_id, r.name, r.language,
                    i.number, i.title, i.html_url, i.body, i.state, i.comments,
                    i.created_at, i.updated_at, i.score, i.has_bounty_label,
                    i.has_bounty_comment, i.has_payout_comment,
                    i.has_assignment_comment, i.has_implementation_details,
                    i.bounty_value, i.labels, i.last_fetched_at, s.status
             {} WHERE {} ORDER BY i.score DESC LIMIT {} OFFSET {}",
            from_clause, where_clause, per_page, offset
        );

        let mut stmt = conn.prepare(&select_sql)?;
        let issues = stmt
            .query_map(rusqlite::params_from_iter(bindings.iter()), map_stored_issue)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SearchResults {
            issues,
            total_count,
            page,
            per_page,
        })
    }
}

#[derive(Debug, Default, PartialEq)]
struct ParsedQuery {
    text: String,
    repo_filters: Vec<String>,
}

/// Split a query into `repo:owner/name` filters and the free-text remainder.
fn parse_query(query: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    let mut text_terms: Vec<&str> = Vec::new();

    for term in query.split_whitespace() {
        if let Some(repo) = term.strip_prefix("repo:") {
            let repo = repo.trim_matches('"');
            if !repo.is_empty() {
                parsed.repo_filters.push(repo.to_string());
            }
        } else {
            text_terms.push(term);
        }
    }

    parsed.text = text_terms.join(" ");
    parsed
}
