// SQLite-backed storage for scored bounty issues
// One row per GitHub issue id, kept in sync by upsert + threshold pruning

pub mod search;
pub mod settings;
pub mod status;
pub mod store;

pub use search::{SearchResults, StatusFilter};
pub use settings::{Setting, DEFAULT_SEARCH_QUERY};
pub use status::{IssueStatusKind, StatusCounts};
pub use store::{
    IssueUpsert, Store, StoreError, StoredIssue, StoredRepository, UpsertOutcome,
    MIN_SCORE_THRESHOLD,
};

pub type Result<T> = std::result::Result<T, StoreError>;
