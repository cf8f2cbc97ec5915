//! Donation records, inputs and columns

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::{
    fold_case, Actor, Field, OrderDirection, RepositoryError, RepositoryOperation, RepositoryResult, Sort,
};

/// Entity name used in error context
pub(crate) const ENTITY: &str = "Donation";

/// A persisted donation with its donor association resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: Uuid,
    pub item: Option<String>,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub import_hash: Option<String>,
    pub active: bool,
    pub user_id: Option<Uuid>,
    pub created_by_id: Option<Uuid>,
    pub updated_by_id: Option<Uuid>,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The donor, when associated and still present
    pub user: Option<User>,
}

/// The donor principal as seen from a donation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

/// Data written by `create`, `update` and `bulk_import`
///
/// Identifiers are kept as strings so malformed values surface as
/// `InvalidIdentifier` from the repository rather than as a decode error.
/// Update overwrites item, quantity, location and the donor: a `None` there
/// clears the column. `active` is only read by create and import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DonationInput {
    /// Caller-supplied identifier (create and import only)
    pub id: Option<String>,
    pub item: Option<String>,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    /// Import provenance marker (create and import only)
    pub import_hash: Option<String>,
    /// Initial activity flag (create and import only)
    pub active: bool,
    /// Donor identifier; `None` clears the association
    pub user: Option<String>,
}

impl DonationInput {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    #[must_use]
    pub fn item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    #[must_use]
    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn import_hash(mut self, import_hash: impl Into<String>) -> Self {
        self.import_hash = Some(import_hash.into());
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl ToString) -> Self {
        self.user = Some(user.to_string());
        self
    }
}

/// Filterable and sortable donation columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DonationField {
    Id,
    Item,
    Quantity,
    Location,
    ImportHash,
    Active,
    UserId,
    CreatedById,
    UpdatedById,
    DeletedBy,
    CreatedAt,
    UpdatedAt,
}

impl DonationField {
    pub const ALL: [DonationField; 12] = [
        Self::Id,
        Self::Item,
        Self::Quantity,
        Self::Location,
        Self::ImportHash,
        Self::Active,
        Self::UserId,
        Self::CreatedById,
        Self::UpdatedById,
        Self::DeletedBy,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    /// Name used by API clients (camelCase)
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Item => "item",
            Self::Quantity => "quantity",
            Self::Location => "location",
            Self::ImportHash => "importHash",
            Self::Active => "active",
            Self::UserId => "userId",
            Self::CreatedById => "createdById",
            Self::UpdatedById => "updatedById",
            Self::DeletedBy => "deletedBy",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }
}

impl Field for DonationField {
    fn column_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Item => "item",
            Self::Quantity => "quantity",
            Self::Location => "location",
            Self::ImportHash => "import_hash",
            Self::Active => "active",
            Self::UserId => "user_id",
            Self::CreatedById => "created_by_id",
            Self::UpdatedById => "updated_by_id",
            Self::DeletedBy => "deleted_by",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn search_column(self) -> Option<&'static str> {
        match self {
            Self::Item => Some("item_search"),
            Self::Location => Some("location_search"),
            _ => None,
        }
    }
}

impl fmt::Display for DonationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for DonationField {
    type Err = RepositoryError;

    /// Accepts wire names (`createdAt`) and column names (`created_at`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.wire_name() == s || field.column_name() == s)
            .ok_or_else(|| {
                RepositoryError::validation_failed(
                    RepositoryOperation::FindPage,
                    format!("Unknown sort field: {}", s),
                )
            })
    }
}

/// Parse a client ordering such as `("createdAt", "desc")`
///
/// # Errors
///
/// `ValidationFailed` for an unknown field or direction.
pub fn parse_sort(field: &str, direction: &str) -> RepositoryResult<Sort<DonationField>> {
    let field = field.parse::<DonationField>()?;
    let direction = direction.parse::<OrderDirection>().map_err(|e| {
        RepositoryError::validation_failed(RepositoryOperation::FindPage, e.to_string())
    })?;
    Ok(Sort { field, direction })
}

/// Column list matching [`DonationRow`]
pub(crate) const SELECT_COLUMNS: &str = "id, item, quantity, location, import_hash, active, \
     user_id, created_by_id, updated_by_id, deleted_by, created_at, updated_at";

/// Storage representation: ids as canonical text, timestamps as epoch millis
#[derive(Debug, Clone, FromRow)]
pub(crate) struct DonationRow {
    pub id: String,
    pub item: Option<String>,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub import_hash: Option<String>,
    pub active: bool,
    pub user_id: Option<String>,
    pub created_by_id: Option<String>,
    pub updated_by_id: Option<String>,
    pub deleted_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DonationRow {
    /// Decode into a [`Donation`] without its association loaded
    pub fn into_donation(self, operation: RepositoryOperation) -> RepositoryResult<Donation> {
        Ok(Donation {
            id: decode_id(&self.id, operation)?,
            item: self.item,
            quantity: self.quantity,
            location: self.location,
            import_hash: self.import_hash,
            active: self.active,
            user_id: decode_optional_id(self.user_id.as_deref(), operation)?,
            created_by_id: decode_optional_id(self.created_by_id.as_deref(), operation)?,
            updated_by_id: decode_optional_id(self.updated_by_id.as_deref(), operation)?,
            deleted_by: decode_optional_id(self.deleted_by.as_deref(), operation)?,
            created_at: decode_millis(self.created_at, operation)?,
            updated_at: decode_millis(self.updated_at, operation)?,
            user: None,
        })
    }
}

/// A fully-defaulted row ready for INSERT
#[derive(Debug, Clone)]
pub(crate) struct NewDonation {
    pub id: Uuid,
    pub item: Option<String>,
    pub quantity: Option<i64>,
    pub location: Option<String>,
    pub import_hash: Option<String>,
    pub active: bool,
    pub created_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewDonation {
    /// Apply create defaulting: blank text becomes `NULL`, the actor is stamped
    pub fn from_input(
        id: Uuid,
        input: &DonationInput,
        actor: &Actor,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            item: non_blank(input.item.as_deref()),
            quantity: input.quantity,
            location: non_blank(input.location.as_deref()),
            import_hash: non_blank(input.import_hash.as_deref()),
            active: input.active,
            created_by_id: actor.id,
            created_at,
            updated_at,
        }
    }

    /// The donation this row becomes once inserted (no association)
    pub fn to_donation(&self) -> Donation {
        Donation {
            id: self.id,
            item: self.item.clone(),
            quantity: self.quantity,
            location: self.location.clone(),
            import_hash: self.import_hash.clone(),
            active: self.active,
            user_id: None,
            created_by_id: self.created_by_id,
            updated_by_id: self.created_by_id,
            deleted_by: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
            user: None,
        }
    }
}

/// `None` for missing or empty text
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Value for the folded `*_search` copy of a text column
pub(crate) fn search_text(value: Option<&str>) -> Option<String> {
    value.map(fold_case)
}

/// Current time truncated to the stored millisecond precision
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn decode_id(raw: &str, operation: RepositoryOperation) -> RepositoryResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        RepositoryError::serialization_error(operation, format!("Stored id {:?} is not a UUID: {}", raw, e))
    })
}

fn decode_optional_id(raw: Option<&str>, operation: RepositoryOperation) -> RepositoryResult<Option<Uuid>> {
    raw.map(|raw| decode_id(raw, operation)).transpose()
}

fn decode_millis(millis: i64, operation: RepositoryOperation) -> RepositoryResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        RepositoryError::serialization_error(operation, format!("Stored timestamp {} is out of range", millis))
    })
}
