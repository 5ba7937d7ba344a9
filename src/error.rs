//! Error types for grammar evolution.

/// Errors raised by grammar generation, breeding and persistence.
///
/// Argument and precondition failures are fatal to a run: callers are
/// expected to propagate them and abort rather than retry.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    /// A configuration value or call argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was invoked on state it cannot work with.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// Reading a corpus or checkpoint failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A checkpoint could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GrammarError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation(message.into())
    }
}

/// Result type for fallible grammar operations.
pub type Result<T> = std::result::Result<T, GrammarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GrammarError::invalid("node_budget must be greater than zero");
        assert_eq!(
            err.to_string(),
            "invalid argument: node_budget must be greater than zero"
        );

        let err = GrammarError::precondition("cannot select from an empty population");
        assert!(err.to_string().starts_with("precondition violated"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GrammarError = io.into();
        assert!(matches!(err, GrammarError::Io(_)));
    }
}
