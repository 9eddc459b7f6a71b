//! Error types for Chirp Core

use thiserror::Error;

use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum Error {
    // Errors a user can see and correct
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Invalid username or password")]
    Authentication,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Store errors
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the kinds a workflow reports back to the caller as a
    /// rendering decision rather than an infrastructure fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Authentication
                | Error::AuthenticationRequired
                | Error::NotFound(_)
                | Error::Forbidden(_)
        )
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(Error::Authentication.is_client_error());
        assert!(Error::NotFound("tweet 1".to_string()).is_client_error());
        assert!(Error::Forbidden("tweet 1".to_string()).is_client_error());
        assert!(!Error::Database("locked".to_string()).is_client_error());
        assert!(!Error::DuplicateUsername("alice".to_string()).is_client_error());
    }

    #[test]
    fn test_validation_conversion() {
        let mut errors = ValidationErrors::new();
        errors.add("content", "This field is required.");
        let err: Error = errors.into();
        match err {
            Error::Validation(e) => assert_eq!(e.get("content"), ["This field is required."]),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
