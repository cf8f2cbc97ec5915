//! Per-call context passed to repository operations

use std::fmt;

use uuid::Uuid;

/// The principal performing a repository operation
///
/// Lifecycle columns (`created_by_id`, `updated_by_id`, `deleted_by`) are
/// stamped from the actor. Anonymous callers use [`Actor::anonymous`], which
/// records `NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Actor {
    /// The acting user's id, if known
    pub id: Option<Uuid>,
}

impl Actor {
    /// An identified actor
    pub const fn user(id: Uuid) -> Self {
        Self { id: Some(id) }
    }

    /// An actor with no identity
    pub const fn anonymous() -> Self {
        Self { id: None }
    }

    /// The actor id as stored in lifecycle columns
    pub fn column_value(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "anonymous"),
        }
    }
}

/// Options for read queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryOptions {
    /// Skip row materialization and return only the match count
    pub count_only: bool,
}

impl QueryOptions {
    /// Options for a count-only query
    pub const fn count_only() -> Self {
        Self { count_only: true }
    }
}
