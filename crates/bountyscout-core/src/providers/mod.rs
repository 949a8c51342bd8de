// Issue source implementations
pub mod github;

pub use github::GitHubIssueSource;
