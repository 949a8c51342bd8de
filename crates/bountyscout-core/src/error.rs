use thiserror::Error;

/// All the ways things can go wrong in bountyscout
///
/// We use thiserror here because it generates the boilerplate for us.
/// Life's too short to manually implement Display and Error traits.
#[derive(Error, Debug)]
pub enum Error {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Store operation failed: {0}")]
    StoreError(#[from] bountyscout_store::StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("GitHub token is not configured")]
    MissingToken,

    #[error("Refresh timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
