//! Error types for the Juju client surface

use thiserror::Error;

/// Result type alias using the Juju client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by Juju client operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} \"{id}\" not found")]
    NotFound { kind: String, id: String },

    #[error("{kind} \"{id}\" already exists")]
    AlreadyExists { kind: String, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn already_exists(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::AlreadyExists {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Whether the backing object is gone. Reads translate this into removal
    /// from state rather than an error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<crate::constraints::ConstraintsError> for Error {
    fn from(e: crate::constraints::ConstraintsError) -> Self {
        Error::InvalidInput(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(Error::not_found("model", "abc").is_not_found());
        assert!(!Error::already_exists("model", "abc").is_not_found());
        assert!(!Error::Internal("boom".into()).is_not_found());
    }

    #[test]
    fn test_display_names_kind_and_id() {
        let e = Error::not_found("application", "postgresql");
        assert_eq!(e.to_string(), "application \"postgresql\" not found");
    }
}
