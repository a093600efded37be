use thiserror::Error;

/// Load and configuration failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the vector tier. These always propagate to the caller: the
/// vector index is the baseline capability of every query.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("Vector backend error: {0}")]
    Backend(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] anyhow::Error),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VectorError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Failures of the graph tier. Retrieval absorbs these and falls back to
/// vector-only results; only construction-time configuration errors are
/// expected to reach a caller.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Invalid graph configuration: {0}")]
    InvalidConfig(String),

    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    #[error("Graph query failed: {0}")]
    Query(String),

    #[error("Invalid relationship type: {0:?}")]
    InvalidRelationship(String),
}
