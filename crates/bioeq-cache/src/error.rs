use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to persist cache snapshot {path}: {reason}")]
    Persist { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CacheError>;
