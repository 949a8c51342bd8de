// GitHub REST collaborators: issue search, comments, repository languages
pub mod github;
pub mod retry;

// Re-export common types
pub use github::{CommentRecord, GitHubClient, GitHubError, IssueRecord, Label, SearchPage};
pub use retry::RetryConfig;
