//! Error types for the workflow viewer graph engine
//!
//! All fallible operations return `Result<T, Error>`.
//! Malformed input is reported at the boundary instead of producing
//! stale or partial state.

use thiserror::Error;

/// Graph engine error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The raw graph document could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Structural precondition violated (dangling parent, cycle, id collision)
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// Query on an id that is not present in the canonical graph
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for graph engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = Error::NodeNotFound("workflow_viewer_65".into());
        assert_eq!(err.to_string(), "Node not found: workflow_viewer_65");

        let err = Error::InvalidGraph("cycle detected: A -> A".into());
        assert!(err.to_string().starts_with("Invalid graph:"));
    }
}
