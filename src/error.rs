use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy shared by every service and store in the crate.
///
/// The first five variants are the caller-visible outcomes; the rest are
/// plumbing for the interface and storage layers.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The actor is not a legitimate party for the requested operation.
    #[error("Unauthorized")]
    Unauthorized,
    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The requested status change is not in the legal transition table for
    /// the actor's role and the current state. Deliberately generic: wrong
    /// role and wrong current state are not distinguished.
    #[error("Invalid status transition")]
    InvalidTransition,
    /// A uniqueness rule was violated, e.g. a second dispute on the same
    /// transaction.
    #[error("{0}")]
    Conflict(String),
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    Rocks(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}
