//! Donation records: model, filter compiler and repository
//!
//! - [`Donations`]: the repository, implementing every lifecycle trait
//! - [`DonationFilter`]: client filter object compiled into a predicate
//! - [`UserLoader`]: the donor association
//!
//! # Example
//!
//! ```rust,no_run
//! use donations_db::prelude::*;
//!
//! # async fn run(pool: sqlx::SqlitePool, config: Config) -> donations_db::Result<()> {
//! let mut conn = pool.acquire().await?;
//! let mut donations = Donations::new(&mut conn, &config.repository);
//!
//! let rice = donations
//!     .create(DonationInput::new().item("rice").quantity(10), &Actor::anonymous())
//!     .await?;
//!
//! let page = donations
//!     .find_page(
//!         &DonationFilter::new().item("ric").quantity_range(Some(5), None),
//!         &PageRequest::new(0, 20),
//!         QueryOptions::default(),
//!     )
//!     .await?;
//! assert_eq!(page.rows[0].id, rice.id);
//! # Ok(())
//! # }
//! ```

mod filter;
mod model;
mod repository;
mod users;

pub use filter::DonationFilter;
pub use model::{parse_sort, Donation, DonationField, DonationInput, User};
pub use repository::Donations;
pub use users::UserLoader;
