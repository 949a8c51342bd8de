// Core business logic lives here - the brain of the operation
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod ranking;
pub mod refresh;
pub mod source;
pub mod sync;

pub use config::Config;
pub use error::Error;
pub use models::RankedIssue;
pub use ranking::{LanguageCache, RankingConfig, RankingEngine};
pub use refresh::{RefreshOptions, RefreshOrchestrator, RefreshOutcome, RefreshReport};
pub use source::IssueSource;
pub use sync::{SyncEngine, SyncReport};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
