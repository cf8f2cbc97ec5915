//! Donor association: eager loading and assignment

use std::collections::HashMap;

use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::model::{Donation, User, ENTITY};
use crate::repository::{RelationLoader, RepositoryError, RepositoryOperation, RepositoryResult};

/// Ids per `IN (...)` lookup
const LOOKUP_CHUNK: usize = 500;

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

impl UserRow {
    fn into_user(self) -> RepositoryResult<User> {
        let id = Uuid::parse_str(&self.id).map_err(|e| {
            RepositoryError::serialization_error(
                RepositoryOperation::BatchLoad,
                format!("Stored user id {:?} is not a UUID: {}", self.id, e),
            )
        })?;
        Ok(User {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        })
    }
}

/// Loads and assigns a donation's donor over a borrowed connection
pub struct UserLoader<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> UserLoader<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Point `donation_id` at `user`, or clear the association with `None`
    ///
    /// # Errors
    ///
    /// - `NotFound` if the donation doesn't exist
    /// - `ValidationFailed` if `user` doesn't reference an existing user
    pub async fn assign(&mut self, donation_id: &Uuid, user: Option<Uuid>) -> RepositoryResult<()> {
        let op = RepositoryOperation::AssignRelation;
        let result = sqlx::query("UPDATE donations SET user_id = ? WHERE id = ?")
            .bind(user.map(|id| id.to_string()))
            .bind(donation_id.to_string())
            .execute(&mut *self.conn)
            .await
            .map_err(|e| {
                RepositoryError::from_sqlx(op, e).with_entity(ENTITY, donation_id.to_string())
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(ENTITY, donation_id.to_string()).with_operation(op));
        }

        tracing::debug!(donation_id = %donation_id, user_id = ?user, "Assigned donation user");
        Ok(())
    }

    /// Resolve `user` on every donation with one lookup per chunk of ids
    pub async fn attach(&mut self, donations: &mut [Donation]) -> RepositoryResult<()> {
        let mut ids: Vec<Uuid> = donations.iter().filter_map(|d| d.user_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let users = self.batch_load(&ids).await?;
        for donation in donations.iter_mut() {
            donation.user = donation.user_id.and_then(|id| users.get(&id).cloned());
        }
        Ok(())
    }
}

impl RelationLoader<Donation, Uuid, User> for UserLoader<'_> {
    async fn load_one(&mut self, donation: &Donation) -> RepositoryResult<Option<User>> {
        let Some(user_id) = donation.user_id else {
            return Ok(None);
        };
        Ok(self.batch_load(&[user_id]).await?.remove(&user_id))
    }

    async fn batch_load(&mut self, ids: &[Uuid]) -> RepositoryResult<HashMap<Uuid, User>> {
        let mut users = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT id, first_name, last_name, email FROM users WHERE id IN (",
            );
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.to_string());
            }
            separated.push_unseparated(")");

            let rows: Vec<UserRow> = builder
                .build_query_as()
                .fetch_all(&mut *self.conn)
                .await
                .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::BatchLoad, e))?;

            for row in rows {
                let user = row.into_user()?;
                users.insert(user.id, user);
            }
        }

        tracing::debug!(requested = ids.len(), found = users.len(), "Batch loaded users");
        Ok(users)
    }
}
