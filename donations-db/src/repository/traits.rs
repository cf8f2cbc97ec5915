//! Repository trait definitions
//!
//! Traits use RPITIT (Return Position Impl Trait In Traits) so implementations
//! can be written with plain `async fn`.
//!
//! - [`Repository`]: create / update / lookup / paginated search
//! - [`SoftDeleteRepository`]: two-phase mark-then-remove deletion
//! - [`BulkImportRepository`]: all-or-nothing batch insert
//! - [`AutocompleteRepository`]: narrow `(id, label)` lookups
//! - [`RelationLoader`]: eager loading of a one-to-one relation (N+1 prevention)
//!
//! Repositories borrow a connection for their lifetime, so the same code runs
//! on a pooled connection or inside a caller-held transaction:
//!
//! ```rust,ignore
//! let mut tx = pool.begin().await?;
//! let mut donations = Donations::new(&mut tx, &settings);
//! let created = donations.create(input, &actor).await?;
//! tx.commit().await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use serde::Serialize;

use super::context::{Actor, QueryOptions};
use super::error::RepositoryError;
use super::pagination::{Page, PageRequest};
use super::predicate::{Field, Predicate};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Base repository trait for an entity's record lifecycle and queries
///
/// # Associated Types
///
/// - `Id`: the identifier type (e.g. `Uuid`)
/// - `Entity`: the full entity returned from queries, associations resolved
/// - `Input`: the data written by `create` and `update`
/// - `Filter`: the loosely-typed filter object compiled into a [`Predicate`]
/// - `Field`: the entity's filterable / sortable columns
pub trait Repository: Send {
    type Id: Send + Sync;
    type Entity: Send;
    type Input: Send;
    type Filter: Send + Sync;
    type Field: Field;

    /// Persist a new entity stamped with `actor`, then assign its relations
    fn create(
        &mut self,
        data: Self::Input,
        actor: &Actor,
    ) -> impl Future<Output = RepositoryResult<Self::Entity>> + Send;

    /// Overwrite the mutable attributes of an existing entity
    ///
    /// Attributes missing from `data` are reset, not kept.
    ///
    /// # Errors
    ///
    /// `NotFound` if the entity doesn't exist.
    fn update(
        &mut self,
        id: &Self::Id,
        data: Self::Input,
        actor: &Actor,
    ) -> impl Future<Output = RepositoryResult<Self::Entity>> + Send;

    /// First entity matching `predicate`, or `Ok(None)`
    fn find_one(
        &mut self,
        predicate: &Predicate<Self::Field>,
    ) -> impl Future<Output = RepositoryResult<Option<Self::Entity>>> + Send;

    /// Entity with the given identifier, or `Ok(None)`
    fn find_by_id(
        &mut self,
        id: &Self::Id,
    ) -> impl Future<Output = RepositoryResult<Option<Self::Entity>>> + Send;

    /// One page of entities matching `filter`, plus the total match count
    fn find_page(
        &mut self,
        filter: &Self::Filter,
        request: &PageRequest<Self::Field>,
        options: QueryOptions,
    ) -> impl Future<Output = RepositoryResult<Page<Self::Entity>>> + Send;

    /// Number of entities matching `filter`
    fn count(
        &mut self,
        filter: &Self::Filter,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Check if an entity exists by its identifier
    fn exists(&mut self, id: &Self::Id) -> impl Future<Output = RepositoryResult<bool>> + Send;
}

/// Two-phase deletion: mark the deleting actor, then remove the row
///
/// Removed rows are gone for good; there is no restore.
pub trait SoftDeleteRepository: Repository {
    /// Mark then remove one entity, returning its marked snapshot
    ///
    /// # Errors
    ///
    /// `NotFound` if the entity doesn't exist.
    fn soft_delete_one(
        &mut self,
        id: &Self::Id,
        actor: &Actor,
    ) -> impl Future<Output = RepositoryResult<Self::Entity>> + Send;

    /// Mark every entity, then remove every entity, inside one transaction
    ///
    /// Either every row is removed or none is.
    fn soft_delete_many(
        &mut self,
        ids: &[Self::Id],
        actor: &Actor,
    ) -> impl Future<Output = RepositoryResult<Vec<Self::Entity>>> + Send;
}

/// Batch insert with the same defaulting as [`Repository::create`]
pub trait BulkImportRepository: Repository {
    /// Insert all `items` or none of them
    ///
    /// Relations are not assigned for imported rows.
    fn bulk_import(
        &mut self,
        items: Vec<Self::Input>,
        actor: &Actor,
    ) -> impl Future<Output = RepositoryResult<Vec<Self::Entity>>> + Send;
}

/// A minimal autocomplete result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion<Id> {
    /// Identifier of the matching entity
    pub id: Id,
    /// Display label (may be absent when the label column is null)
    pub label: Option<String>,
}

/// Read-only lookups for incremental search UIs
pub trait AutocompleteRepository: Send {
    type Id: Send;

    /// Up to `limit` suggestions for `query`, ordered by label
    ///
    /// `None` uses the repository default limit.
    fn suggest(
        &mut self,
        query: &str,
        limit: Option<u64>,
    ) -> impl Future<Output = RepositoryResult<Vec<Suggestion<Self::Id>>>> + Send;
}

/// Trait for eager loading a one-to-one relation (N+1 prevention)
///
/// # Type Parameters
///
/// - `Entity`: the parent entity type
/// - `RelatedId`: the identifier type for the related entity
/// - `Related`: the related entity type
pub trait RelationLoader<Entity, RelatedId, Related>: Send
where
    RelatedId: Eq + Hash,
{
    /// Load the related entity for the given parent
    ///
    /// Returns `None` if the parent has no relation.
    fn load_one(
        &mut self,
        entity: &Entity,
    ) -> impl Future<Output = RepositoryResult<Option<Related>>> + Send;

    /// Batch load related entities by their IDs with a single query
    fn batch_load(
        &mut self,
        ids: &[RelatedId],
    ) -> impl Future<Output = RepositoryResult<HashMap<RelatedId, Related>>> + Send;
}
