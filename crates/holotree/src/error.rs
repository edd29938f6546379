//! Holotree error types.

use thiserror::Error;

/// Holotree operation errors.
#[derive(Debug, Error)]
pub enum HolotreeError {
    #[error("catalog not found: {0}")]
    CatalogNotFound(String),

    #[error("invalid catalog name: {0}")]
    InvalidCatalogName(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("malformed catalog {name}: {source}")]
    MalformedCatalog {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("unsafe archive entry: {0}")]
    UnsafeEntry(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for HolotreeError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Result type for holotree operations.
pub type HolotreeResult<T> = std::result::Result<T, HolotreeError>;
