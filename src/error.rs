//! Error types for the order-book delta engine.
//!
//! Clean error handling using `thiserror` for ergonomic error definitions.
//! All domain failures share one enum so boundary layers can catch broadly
//! and decide per-variant whether to drop, log, or propagate.

use thiserror::Error;

/// Result type alias for book operations.
pub type Result<T> = std::result::Result<T, BookError>;

/// Main error type for order-book processing.
#[derive(Error, Debug, Clone)]
pub enum BookError {
    /// An update arrived before any snapshot/recap established the book.
    /// The book is left unmodified; the boundary layer should log and drop.
    #[error("update received before initial snapshot (seq {0})")]
    UpdateBeforeSnapshot(u64),

    /// The field dictionary does not contain a name this engine requires.
    #[error("field dictionary missing required field: {0}")]
    UnresolvedField(&'static str),

    /// Side byte not one of the known encodings.
    #[error("invalid side: {0}")]
    InvalidSide(u8),

    /// Action byte not one of the known encodings.
    #[error("invalid action: {0}")]
    InvalidAction(u8),

    /// Generic error with context.
    #[error("error: {0}")]
    Generic(String),
}

impl BookError {
    /// Create a generic error from any string-like type.
    pub fn generic(msg: impl Into<String>) -> Self {
        BookError::Generic(msg.into())
    }
}

impl From<String> for BookError {
    fn from(err: String) -> Self {
        BookError::Generic(err)
    }
}

impl From<&str> for BookError {
    fn from(err: &str) -> Self {
        BookError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BookError::UpdateBeforeSnapshot(42);
        assert_eq!(
            err.to_string(),
            "update received before initial snapshot (seq 42)"
        );
    }

    #[test]
    fn test_unresolved_field_display() {
        let err = BookError::UnresolvedField("wBookTime");
        assert!(err.to_string().contains("wBookTime"));
    }

    #[test]
    fn test_result_type() {
        let result: Result<i32> = Err(BookError::generic("boom"));
        assert!(result.is_err());
    }
}
