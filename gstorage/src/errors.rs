use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite operation failed: {0}")]
    SQLite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Element already exists: {0}")]
    DuplicateElement(String),

    #[error("Identifier {id} is not a valid {kind} id")]
    InvalidId { id: u64, kind: &'static str },

    #[error("Property '{key}' rejected: {reason}")]
    PropertyRejected { key: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Rejections are local to one property write; callers may skip them.
    pub fn is_property_rejection(&self) -> bool {
        matches!(self, StorageError::PropertyRejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
