//! Pagination and ordering types for repository queries
//!
//! # Example
//!
//! ```rust
//! use donations_db::repository::{OrderDirection, Pagination};
//!
//! // Third page (zero-indexed) of 20 rows
//! let pagination = Pagination::from_page(2, 20);
//! assert_eq!(pagination.offset, 40);
//! assert_eq!(pagination.limit, 20);
//!
//! assert_eq!("DESC".parse::<OrderDirection>().unwrap(), OrderDirection::Descending);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    #[serde(alias = "asc", alias = "ASC")]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    #[serde(alias = "desc", alias = "DESC")]
    Descending,
}

impl OrderDirection {
    /// SQL keyword for this direction
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Error returned when a sort direction string is not `asc` or `desc`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort direction: {0}")]
pub struct ParseOrderDirectionError(pub String);

impl FromStr for OrderDirection {
    type Err = ParseOrderDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            _ => Err(ParseOrderDirectionError(s.to_string())),
        }
    }
}

/// An explicit ordering on a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    /// The field to order by
    pub field: F,
    /// The ordering direction
    pub direction: OrderDirection,
}

impl<F> Sort<F> {
    /// Order ascending by `field`
    pub const fn asc(field: F) -> Self {
        Self {
            field,
            direction: OrderDirection::Ascending,
        }
    }

    /// Order descending by `field`
    pub const fn desc(field: F) -> Self {
        Self {
            field,
            direction: OrderDirection::Descending,
        }
    }
}

/// Pagination parameters for limiting query results
///
/// A `limit` of 0 means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return (0 = no limit)
    pub limit: u64,
}

impl Pagination {
    /// Create new pagination parameters
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// No limit, no offset
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { offset: 0, limit: 0 }
    }

    /// Pagination for a zero-indexed page: `offset = page * page_size`
    #[must_use]
    pub const fn from_page(page: u64, page_size: u64) -> Self {
        Self {
            offset: page.saturating_mul(page_size),
            limit: page_size,
        }
    }

    /// Whether no row limit applies
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.limit == 0
    }
}

/// Which page to fetch and how to order it
///
/// `page` is zero-indexed; a `page_size` of 0 returns every matching row.
/// With no explicit `sort` the repository applies its default ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<F> {
    /// Zero-indexed page number
    pub page: u64,
    /// Rows per page (0 = unbounded)
    pub page_size: u64,
    /// Explicit ordering, if any
    pub sort: Option<Sort<F>>,
}

impl<F> PageRequest<F> {
    /// Request `page` of `page_size` rows in default order
    pub const fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            sort: None,
        }
    }

    /// Every matching row in default order
    pub const fn all() -> Self {
        Self::new(0, 0)
    }

    /// Set an explicit ordering
    #[must_use]
    pub fn sorted_by(mut self, sort: Sort<F>) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Offset and limit for this request
    pub const fn pagination(&self) -> Pagination {
        Pagination::from_page(self.page, self.page_size)
    }
}

/// A page of rows plus the size of the whole filtered set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Rows on this page (empty for count-only queries)
    pub rows: Vec<T>,
    /// Number of rows matching the filter, ignoring pagination
    pub total_count: u64,
}

impl<T> Page<T> {
    /// A count-only page
    pub fn count_only(total_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            total_count,
        }
    }
}
