//! Crate-level error type
//!
//! Repository operations return [`RepositoryError`] directly; this type covers
//! everything around them (configuration, pool setup, migrations) and wraps
//! repository errors for callers that want a single error type.

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Connecting to or configuring the database failed
    #[error("Database error: {0}")]
    Database(Box<sqlx::Error>),

    /// Applying embedded migrations failed
    #[error("Migration error: {0}")]
    Migration(Box<sqlx::migrate::MigrateError>),

    /// A repository operation failed
    #[error("{0}")]
    Repository(RepositoryError),

    /// A loaded configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(Box::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::Migration(Box::new(err))
    }
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        Error::Repository(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryErrorKind;

    #[test]
    fn test_repository_error_passes_through() {
        let err: Error = RepositoryError::not_found("Donation", "abc").into();
        match &err {
            Error::Repository(inner) => assert_eq!(inner.kind, RepositoryErrorKind::NotFound),
            other => panic!("unexpected variant: {:?}", other),
        }
        assert!(err.to_string().contains("[Donation: abc]"));
    }

    #[test]
    fn test_sqlx_error_is_boxed() {
        let err: Error = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(err.to_string().starts_with("Database error:"));
    }
}
