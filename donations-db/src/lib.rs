//! # donations-db
//!
//! Persistence layer for donation records on SQLite.
//!
//! ## Features
//!
//! - **Record lifecycle**: create, full-overwrite update, two-phase soft delete
//!   (mark the deleting actor, then remove) and all-or-nothing bulk import
//! - **Filter compiler**: loosely-typed JSON filters (ranges, tri-state flags,
//!   free text, id lists) compiled into parameterized predicates
//! - **Paginated search**: page/size requests with total counts and batched
//!   donor loading
//! - **Autocomplete**: `(id, label)` suggestions by id or item text
//! - **Configuration**: figment layering of defaults, TOML files and env vars
//! - **Observability**: structured JSON logs via `tracing`
//!
//! ## Example
//!
//! ```rust,no_run
//! use donations_db::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let pool = connect(&config.database).await?;
//!     let mut conn = pool.acquire().await?;
//!     let mut donations = Donations::new(&mut conn, &config.repository);
//!
//!     let actor = Actor::anonymous();
//!     let imported = donations
//!         .bulk_import(
//!             vec![
//!                 DonationInput::new().item("rice").quantity(10),
//!                 DonationInput::new().item("beans").quantity(4),
//!             ],
//!             &actor,
//!         )
//!         .await?;
//!
//!     let ids: Vec<_> = imported.iter().map(|d| d.id).collect();
//!     donations.soft_delete_many(&ids, &actor).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod donations;
pub mod error;
pub mod ids;
pub mod observability;
pub mod repository;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, RepositoryConfig, ServiceConfig};
    pub use crate::database::{connect, create_pool, migrate};
    pub use crate::donations::{
        parse_sort, Donation, DonationField, DonationFilter, DonationInput, Donations, User,
        UserLoader,
    };
    pub use crate::error::{Error, Result};
    pub use crate::ids::generate_id;
    pub use crate::observability::init_tracing;
    pub use crate::repository::{
        Actor, AutocompleteRepository, BulkImportRepository, OrderDirection, Page, PageRequest,
        Predicate, QueryOptions, RelationLoader, Repository, RepositoryError, RepositoryErrorKind,
        RepositoryResult, SoftDeleteRepository, Sort, Suggestion,
    };

    pub use uuid::Uuid;
}
