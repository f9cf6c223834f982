use std::time::Duration;

use thiserror::Error;

/// Core error type for drip operations.
#[derive(Error, Debug)]
pub enum DripError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("No start node found")]
    NoStartNode,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Unknown {kind}: {name}")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("{0}")]
    Handler(String),

    #[error("Step timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Secret store error: {0}")]
    Secret(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DripError {
    /// Whether the error came from the database layer rather than from a workflow itself.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, DripError::Database(_) | DripError::Sql(_) | DripError::Io(_))
    }
}

impl From<serde_json::Error> for DripError {
    fn from(e: serde_json::Error) -> Self {
        DripError::Serialization(e.to_string())
    }
}

/// Result type alias using DripError.
pub type Result<T> = std::result::Result<T, DripError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = DripError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "Step timed out after 30s");
    }

    #[test]
    fn test_handler_message_is_verbatim() {
        let err = DripError::Handler("no recipient email found in context".into());
        assert_eq!(err.to_string(), "no recipient email found in context");
    }

    #[test]
    fn test_infrastructure_classification() {
        assert!(DripError::Database("connection refused".into()).is_infrastructure());
        assert!(DripError::Sql(sqlx::Error::PoolTimedOut).is_infrastructure());
        assert!(DripError::Io(std::io::Error::other("reset")).is_infrastructure());

        assert!(!DripError::NoStartNode.is_infrastructure());
        assert!(!DripError::Handler("boom".into()).is_infrastructure());
        assert!(!DripError::Timeout(Duration::from_secs(2)).is_infrastructure());
    }
}
