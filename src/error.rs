//! Error types for delegated-routing-http.

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The routing operation is not supported by this implementation.
    #[error("routing: operation or key not supported")]
    NotSupported,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
