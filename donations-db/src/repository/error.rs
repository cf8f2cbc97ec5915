//! Repository error types
//!
//! Structured errors for repository operations. Every error carries the
//! operation that was running, a coarse [`RepositoryErrorKind`] for callers
//! to branch on, and optionally the entity involved.
//!
//! # Example
//!
//! ```rust
//! use donations_db::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("Donation", "4f1c8e36-2e52-4b8f-9f55-0d6c9b6d3a11");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.entity_id.is_some());
//! ```

use std::fmt;

/// The repository call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Finding a single entity by predicate or ID
    FindOne,
    /// Finding a page of entities with filters
    FindPage,
    Count,
    Exists,
    /// Inserting one entity
    Create,
    /// Overwriting one entity
    Update,
    /// Inserting a batch of entities
    BulkImport,
    /// Marking and removing entities
    SoftDelete,
    /// Binding or clearing a related entity
    AssignRelation,
    /// Eager loading of related entities
    BatchLoad,
    /// Autocomplete lookup
    Suggest,
    /// Compiling a filter into a predicate
    CompileFilter,
}

impl RepositoryOperation {
    /// Stable snake_case name, used in messages and log fields
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FindOne => "find_one",
            Self::FindPage => "find_page",
            Self::Count => "count",
            Self::Exists => "exists",
            Self::Create => "create",
            Self::Update => "update",
            Self::BulkImport => "bulk_import",
            Self::SoftDelete => "soft_delete",
            Self::AssignRelation => "assign_relation",
            Self::BatchLoad => "batch_load",
            Self::Suggest => "suggest",
            Self::CompileFilter => "compile_filter",
        }
    }
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Entity was not found (or was already removed)
    NotFound,
    /// A malformed identifier was passed to a lookup or filter
    InvalidIdentifier,
    /// Input or backend constraint validation failed (unique, foreign key, not null)
    ValidationFailed,
    /// Beginning, committing or rolling back a transaction failed
    TransactionFailed,
    /// The pool or connection is unusable
    ConnectionFailed,
    /// Acquiring a connection took too long
    Timeout,
    /// Any other backend failure
    DatabaseError,
    /// A stored value could not be decoded
    SerializationError,
}

impl RepositoryErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidIdentifier => "invalid_identifier",
            Self::ValidationFailed => "validation_failed",
            Self::TransactionFailed => "transaction_failed",
            Self::ConnectionFailed => "connection_failed",
            Self::Timeout => "timeout",
            Self::DatabaseError => "database_error",
            Self::SerializationError => "serialization_error",
        }
    }
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use donations_db::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::invalid_identifier(RepositoryOperation::FindPage, "not-a-uuid");
/// assert_eq!(
///     error.to_string(),
///     "Repository invalid_identifier error during find_page: Malformed identifier [identifier: not-a-uuid]"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "Donation", "User")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// Create a "not found" error with entity context
    ///
    /// The operation defaults to [`RepositoryOperation::FindOne`]; chain
    /// [`with_operation`](Self::with_operation) to attribute it elsewhere.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::FindOne,
            kind: RepositoryErrorKind::NotFound,
            message: "Entity not found".to_string(),
            entity_type: Some(entity_type.into()),
            entity_id: Some(entity_id.into()),
        }
    }

    /// Create an "invalid identifier" error for a malformed id
    pub fn invalid_identifier(operation: RepositoryOperation, identifier: impl Into<String>) -> Self {
        Self {
            operation,
            kind: RepositoryErrorKind::InvalidIdentifier,
            message: "Malformed identifier".to_string(),
            entity_type: Some("identifier".to_string()),
            entity_id: Some(identifier.into()),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a transaction failed error
    pub fn transaction_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::TransactionFailed, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// Classify an SQLx error raised while running `operation`
    ///
    /// Constraint violations (unique, foreign key, not null, check) become
    /// [`RepositoryErrorKind::ValidationFailed`]; the backend message is kept
    /// verbatim.
    pub fn from_sqlx(operation: RepositoryOperation, err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::RowNotFound => Self::new(operation, RepositoryErrorKind::NotFound, "Row not found"),
            E::PoolTimedOut => Self::new(
                operation,
                RepositoryErrorKind::Timeout,
                "Connection pool timed out",
            ),
            E::PoolClosed => Self::new(
                operation,
                RepositoryErrorKind::ConnectionFailed,
                "Connection pool is closed",
            ),
            E::WorkerCrashed => Self::new(
                operation,
                RepositoryErrorKind::ConnectionFailed,
                "Database worker crashed",
            ),
            E::Io(e) => Self::new(operation, RepositoryErrorKind::ConnectionFailed, e.to_string()),
            E::Tls(e) => Self::new(
                operation,
                RepositoryErrorKind::ConnectionFailed,
                format!("TLS error: {}", e),
            ),
            E::ColumnDecode { index, source } => Self::serialization_error(
                operation,
                format!("Failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::serialization_error(operation, e.to_string()),
            E::Database(db_err) => {
                let kind = if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                    || matches!(db_err.kind(), sqlx::error::ErrorKind::NotNullViolation)
                {
                    RepositoryErrorKind::ValidationFailed
                } else {
                    RepositoryErrorKind::DatabaseError
                };
                Self::new(operation, kind, db_err.to_string())
            }
            other => Self::new(operation, RepositoryErrorKind::DatabaseError, other.to_string()),
        }
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    ///
    /// The repository itself never retries; this is a hint for callers.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed
                | RepositoryErrorKind::Timeout
                | RepositoryErrorKind::TransactionFailed
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::FindOne), "find_one");
        assert_eq!(format!("{}", RepositoryOperation::FindPage), "find_page");
        assert_eq!(format!("{}", RepositoryOperation::BulkImport), "bulk_import");
        assert_eq!(
            format!("{}", RepositoryOperation::SoftDelete),
            "soft_delete"
        );
        assert_eq!(
            format!("{}", RepositoryOperation::AssignRelation),
            "assign_relation"
        );
        assert_eq!(format!("{}", RepositoryOperation::Suggest), "suggest");
    }

    #[test]
    fn test_repository_error_kind_display() {
        assert_eq!(format!("{}", RepositoryErrorKind::NotFound), "not_found");
        assert_eq!(
            format!("{}", RepositoryErrorKind::InvalidIdentifier),
            "invalid_identifier"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::ValidationFailed),
            "validation_failed"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::TransactionFailed),
            "transaction_failed"
        );
    }

    #[test]
    fn test_not_found_carries_entity() {
        let error = RepositoryError::not_found("Donation", "abc")
            .with_operation(RepositoryOperation::Update);
        assert_eq!(error.operation, RepositoryOperation::Update);
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.entity_type, Some("Donation".to_string()));
        assert_eq!(error.entity_id, Some("abc".to_string()));
    }

    #[test]
    fn test_invalid_identifier_display() {
        let error = RepositoryError::invalid_identifier(RepositoryOperation::FindPage, "xyz");
        let display = error.to_string();
        assert!(display.contains("invalid_identifier"));
        assert!(display.contains("find_page"));
        assert!(display.contains("[identifier: xyz]"));
    }

    #[test]
    fn test_display_without_entity() {
        let error = RepositoryError::validation_failed(RepositoryOperation::Create, "bad bound");
        let display = error.to_string();
        assert!(display.contains("validation_failed"));
        assert!(display.contains("create"));
        assert!(!display.contains('['));
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error = RepositoryError::from_sqlx(RepositoryOperation::FindOne, sqlx::Error::RowNotFound);
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.operation, RepositoryOperation::FindOne);
    }

    #[test]
    fn test_from_sqlx_pool_errors() {
        let timeout = RepositoryError::from_sqlx(RepositoryOperation::Count, sqlx::Error::PoolTimedOut);
        assert_eq!(timeout.kind, RepositoryErrorKind::Timeout);
        assert!(timeout.is_retriable());

        let closed = RepositoryError::from_sqlx(RepositoryOperation::Count, sqlx::Error::PoolClosed);
        assert_eq!(closed.kind, RepositoryErrorKind::ConnectionFailed);
    }

    #[test]
    fn test_is_retriable_permanent_errors() {
        assert!(!RepositoryError::not_found("Donation", "1").is_retriable());
        assert!(
            !RepositoryError::invalid_identifier(RepositoryOperation::FindOne, "1").is_retriable()
        );
        assert!(
            !RepositoryError::validation_failed(RepositoryOperation::Create, "dup").is_retriable()
        );
    }

    #[test]
    fn test_error_is_error_trait() {
        let error: Box<dyn std::error::Error> =
            Box::new(RepositoryError::not_found("Donation", "123"));
        assert!(error.to_string().contains("not_found"));
    }
}
