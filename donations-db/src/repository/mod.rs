//! Repository building blocks shared by every entity repository
//!
//! # Features
//!
//! - **Lifecycle traits**: [`Repository`], [`SoftDeleteRepository`],
//!   [`BulkImportRepository`], [`AutocompleteRepository`]
//! - **Relation loading**: [`RelationLoader`] for eager loading (N+1 prevention)
//! - **Predicates**: [`Predicate`] trees of [`FilterCondition`]s rendered to SQL
//! - **Pagination**: [`PageRequest`], [`Pagination`] and [`Page`]
//! - **Context**: [`Actor`] and [`QueryOptions`] passed explicitly to every call
//! - **Errors**: [`RepositoryError`] classified by [`RepositoryErrorKind`]

mod context;
mod error;
mod pagination;
mod predicate;
mod traits;

pub use context::{Actor, QueryOptions};
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use pagination::{
    OrderDirection, Page, PageRequest, Pagination, ParseOrderDirectionError, Sort,
};
pub use predicate::{fold_case, like_pattern, Field, FilterCondition, FilterOperator, FilterValue, Predicate};
pub use traits::{
    AutocompleteRepository, BulkImportRepository, RelationLoader, Repository, RepositoryResult,
    SoftDeleteRepository, Suggestion,
};
