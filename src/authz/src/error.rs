//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Malformed input (blank field, empty request list, bad id)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No subject could be resolved for the request
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// Caller is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced user, role or policy does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Role or policy is still referenced by assignments
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backing store failure
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// Whether the error came from the backing store rather than the request
    pub fn is_store_failure(&self) -> bool {
        matches!(self, AuthzError::DatabaseError(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AuthzError {
    fn from(err: sqlx::Error) -> Self {
        AuthzError::DatabaseError(err.to_string())
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
