use thiserror::Error;

/// Errors raised while talking to a vector collection.
#[derive(Debug, Error)]
pub enum VecDbError {
    /// Transport-level failure (connection refused, timeout, TLS...).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-zero status code.
    #[error("server error {code}: {message}")]
    Server {
        /// Milvus status code.
        code: i64,
        /// Server-provided explanation.
        message: String,
    },

    /// The collection schema is unusable.
    #[error("invalid collection: {0}")]
    InvalidCollection(String),

    /// A vector does not match the collection's dimensionality.
    #[error("vector dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A search limit outside `1..=MAX_LIMIT`.
    #[error("invalid search limit {0} (must be between 1 and {max})", max = crate::index::MAX_LIMIT)]
    InvalidLimit(usize),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The collection has not been created.
    #[error("collection {0:?} does not exist")]
    CollectionNotFound(String),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for vector collection operations.
pub type Result<T> = std::result::Result<T, VecDbError>;
