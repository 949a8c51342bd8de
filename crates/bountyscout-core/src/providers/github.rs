// GitHub provider implementation - bridges the API client with the IssueSource trait
use async_trait::async_trait;
use bountyscout_api::{CommentRecord, GitHubClient, IssueRecord};

use crate::{source::IssueSource, Error, Result};

/// Wrapper around GitHubClient that implements IssueSource
pub struct GitHubIssueSource {
    client: GitHubClient,
}

impl GitHubIssueSource {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IssueSource for GitHubIssueSource {
    async fn fetch_issues(
        &self,
        query: &str,
        sort: &str,
        order: &str,
        per_page: u32,
        max_pages: u32,
    ) -> Vec<IssueRecord> {
        self.client
            .fetch_all_issues(query, sort, order, per_page, max_pages)
            .await
    }

    async fn repository_language(&self, repository_url: &str) -> Result<String> {
        self.client
            .repository_language(repository_url)
            .await
            .map_err(|e| Error::ApiError(e.to_string()))
    }

    async fn issue_comments(&self, comments_url: &str) -> Result<Vec<CommentRecord>> {
        self.client
            .issue_comments(comments_url)
            .await
            .map_err(|e| Error::ApiError(e.to_string()))
    }
}
