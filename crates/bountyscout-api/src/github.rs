use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::retry::{is_retryable_status, with_retry, RetryConfig};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Delay between paginated search requests.
const PAGE_DELAY_MS: u64 = 250;

/// When remaining quota drops below this, slow down.
const RATE_LIMIT_FLOOR: u32 = 10;
const RATE_LIMIT_PENALTY_MS: u64 = 1000;

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid repository URL: {0}")]
    InvalidRepositoryUrl(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

pub struct GitHubClient {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
    retry_config: RetryConfig,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, GITHUB_API_BASE.to_string())
    }

    /// For GitHub Enterprise or test servers
    pub fn with_base_url(token: Option<String>, base_url: String) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("BountyScout/0.1.0"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github.v3+json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            token,
            base_url,
            retry_config: RetryConfig::default(),
        }
    }

    /// Create client with custom retry configuration
    pub fn with_retry_config(token: Option<String>, retry_config: RetryConfig) -> Self {
        let mut client = Self::new(token);
        client.retry_config = retry_config;
        client
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch a single page of issue search results.
    pub async fn search_issues(
        &self,
        query: &str,
        sort: &str,
        order: &str,
        per_page: u32,
        page: u32,
    ) -> Result<SearchPage> {
        let url = format!("{}/search/issues", self.base_url);

        with_retry(&self.retry_config, || async {
            let request = self.authorize(self.client.get(&url)).query(&[
                ("q", query),
                ("sort", sort),
                ("order", order),
                ("per_page", &per_page.to_string()),
                ("page", &page.to_string()),
            ]);

            let response = request.send().await?;

            if response.status() == 401 {
                return Err(GitHubError::AuthRequired);
            }

            if response.status() == 403 || response.status() == 429 {
                return Err(GitHubError::RateLimitExceeded);
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if is_retryable_status(status) {
                    debug!(%status, "Retryable search failure");
                }
                return Err(GitHubError::RequestFailed(format!(
                    "Status {}: {}",
                    status, body
                )));
            }

            let rate_limit_remaining = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u32>().ok());

            let body: SearchResponse = response.json().await?;

            Ok(SearchPage {
                items: body.items,
                total_count: body.total_count,
                rate_limit_remaining,
            })
        })
        .await
    }

    /// Fetch every page of search results up to `max_pages`.
    ///
    /// A failed page is logged and skipped; pagination stops on an empty or
    /// short page. Never returns an error: the caller gets whatever pages
    /// came back clean.
    pub async fn fetch_all_issues(
        &self,
        query: &str,
        sort: &str,
        order: &str,
        per_page: u32,
        max_pages: u32,
    ) -> Vec<IssueRecord> {
        let mut all_issues = Vec::new();

        info!(
            query,
            sort, order, per_page, max_pages, "Starting GitHub issue fetch"
        );

        for page in 1..=max_pages {
            let result = self
                .search_issues(query, sort, order, per_page, page)
                .await;

            let page_result = match result {
                Ok(p) => p,
                Err(err) => {
                    // Page-level failure: skip it and keep going
                    warn!(page, %err, "Failed to fetch search page, skipping");
                    continue;
                }
            };

            if page_result.items.is_empty() {
                debug!(page, "Empty page, stopping pagination");
                break;
            }

            let fetched = page_result.items.len();
            all_issues.extend(page_result.items);
            debug!(page, fetched, total = all_issues.len(), "Fetched page");

            // Short page means we reached the end of results
            if fetched < per_page as usize {
                break;
            }

            if let Some(remaining) = page_result.rate_limit_remaining {
                if remaining < RATE_LIMIT_FLOOR {
                    warn!(remaining, "GitHub rate limit low, backing off");
                    sleep(Duration::from_millis(RATE_LIMIT_PENALTY_MS)).await;
                }
            }

            if page < max_pages {
                sleep(Duration::from_millis(PAGE_DELAY_MS)).await;
            }
        }

        info!(total = all_issues.len(), "GitHub issue fetch complete");
        all_issues
    }

    /// Fetch the comments for a single issue.
    pub async fn issue_comments(&self, comments_url: &str) -> Result<Vec<CommentRecord>> {
        if comments_url.is_empty() {
            return Ok(Vec::new());
        }

        with_retry(&self.retry_config, || async {
            let response = self.authorize(self.client.get(comments_url)).send().await?;

            if response.status() == 404 {
                return Err(GitHubError::NotFound(comments_url.to_string()));
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(GitHubError::RequestFailed(format!(
                    "Status {}: {}",
                    status, body
                )));
            }

            let comments: Vec<CommentRecord> = response.json().await?;
            Ok(comments)
        })
        .await
    }

    /// Resolve the primary language of the repository behind an API URL
    /// like `https://api.github.com/repos/facebook/react`.
    ///
    /// Picks the language with the most bytes of code. Returns "Unknown"
    /// when the repository reports no languages at all.
    pub async fn repository_language(&self, repository_url: &str) -> Result<String> {
        let slug = repo_slug(repository_url)
            .ok_or_else(|| GitHubError::InvalidRepositoryUrl(repository_url.to_string()))?;

        let url = format!("{}/repos/{}/languages", self.base_url, slug);

        with_retry(&self.retry_config, || async {
            let response = self.authorize(self.client.get(&url)).send().await?;

            if response.status() == 404 {
                return Err(GitHubError::NotFound(slug.clone()));
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(GitHubError::RequestFailed(format!(
                    "Status {}: {}",
                    status, body
                )));
            }

            let languages: HashMap<String, u64> = response.json().await?;

            let main_language = languages
                .into_iter()
                .max_by_key(|(_, bytes)| *bytes)
                .map(|(name, _)| name)
                .unwrap_or_else(|| "Unknown".to_string());

            Ok(main_language)
        })
        .await
    }
}

/// Extract `owner/repo` from a GitHub API repository URL.
fn repo_slug(repository_url: &str) -> Option<String> {
    let rest = repository_url.split("/repos/").nth(1)?;
    let mut segments = rest.split('/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let repo = segments.next().filter(|s| !s.is_empty())?;
    Some(format!("{}/{}", owner, repo))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<IssueRecord>,
    #[serde(default)]
    total_count: Option<u64>,
}

/// One page of search results plus the rate-limit signal from the headers.
#[derive(Debug)]
pub struct SearchPage {
    pub items: Vec<IssueRecord>,
    pub total_count: Option<u64>,
    pub rate_limit_remaining: Option<u32>,
}

/// A raw issue as the search API returns it.
///
/// Fields the ranking layer validates itself are defaulted rather than
/// required, so one malformed record cannot sink a whole page of JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub comments: u32,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub repository_url: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub comments_url: String,
    #[serde(default)]
    pub user: Option<Author>,
}

fn default_state() -> String {
    "open".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: Option<Author>,
    #[serde(default)]
    pub created_at: String,
}
