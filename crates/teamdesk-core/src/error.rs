use thiserror::Error;

/// Core error type for TeamDesk operations.
#[derive(Error, Debug)]
pub enum TeamdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Duplicate key in {collection}: {key}")]
    Duplicate { collection: String, key: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TeamdeskError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a missing entity.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Shorthand for an authorization failure.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Whether this error came from a store uniqueness constraint.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl From<serde_json::Error> for TeamdeskError {
    fn from(e: serde_json::Error) -> Self {
        TeamdeskError::Serialization(e.to_string())
    }
}

/// Result type alias using TeamdeskError.
pub type Result<T> = std::result::Result<T, TeamdeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_detection() {
        let err = TeamdeskError::Duplicate {
            collection: "users".into(),
            key: "email".into(),
        };
        assert!(err.is_duplicate());
        assert!(!TeamdeskError::validation("x").is_duplicate());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            TeamdeskError::not_found("Task").to_string(),
            "Not found: Task"
        );
        assert_eq!(
            TeamdeskError::forbidden("nope").to_string(),
            "Forbidden: nope"
        );
    }
}
