use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No chat with the given identifier exists.
    #[error("Chat not found: {0}")]
    ChatNotFound(Uuid),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Reading, writing or renaming the document file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document on disk is not valid JSON for the expected layout.
    #[error("Document (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ChatNotFound(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
