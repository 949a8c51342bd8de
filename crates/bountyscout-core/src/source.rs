use bountyscout_api::{CommentRecord, IssueRecord};

use crate::Result;

/// The remote issue tracker, seen through the narrow contract the core
/// needs. Trait seam so tests can rank and refresh without the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IssueSource: Send + Sync {
    /// Fetch every page of matching issues, up to the page cap.
    ///
    /// Page-level failures are the source's problem: it logs, skips, and
    /// returns whatever it got. An empty result is a normal outcome.
    async fn fetch_issues(
        &self,
        query: &str,
        sort: &str,
        order: &str,
        per_page: u32,
        max_pages: u32,
    ) -> Vec<IssueRecord>;

    /// Primary language of the repository behind an API URL.
    async fn repository_language(&self, repository_url: &str) -> Result<String>;

    /// Comments on one issue.
    async fn issue_comments(&self, comments_url: &str) -> Result<Vec<CommentRecord>>;
}
