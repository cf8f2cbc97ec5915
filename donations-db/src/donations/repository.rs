//! SQLite-backed donation repository
//!
//! [`Donations`] borrows a connection for its lifetime. Pass a pooled
//! connection for standalone calls or the inside of a caller-held
//! transaction to compose several calls atomically; the multi-row operations
//! (`soft_delete_many`, `bulk_import`) open their own transaction on top, which
//! becomes a SAVEPOINT when one is already in progress.

use std::collections::{HashMap, HashSet};

use chrono::DateTime;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::filter::DonationFilter;
use super::model::{
    non_blank, now_millis, search_text, Donation, DonationField, DonationInput, DonationRow, NewDonation,
    ENTITY, SELECT_COLUMNS,
};
use super::users::UserLoader;
use crate::config::RepositoryConfig;
use crate::ids::{generate_id, normalize_id, try_normalize_id};
use crate::repository::{
    Actor, AutocompleteRepository, BulkImportRepository, Field, FilterCondition, Page,
    PageRequest, Pagination, Predicate, QueryOptions, Repository, RepositoryError,
    RepositoryErrorKind, RepositoryOperation, RepositoryResult, SoftDeleteRepository, Sort,
    Suggestion,
};

/// Rows per multi-row INSERT (12 binds each, well under SQLite's parameter limit)
const INSERT_CHUNK_ROWS: usize = 500;

/// Ids per `IN (...)` list
const ID_CHUNK: usize = 500;

/// Newest first
const DEFAULT_SORT: Sort<DonationField> = Sort::desc(DonationField::CreatedAt);

/// Donation repository over a borrowed SQLite connection
pub struct Donations<'c> {
    conn: &'c mut SqliteConnection,
    settings: RepositoryConfig,
}

impl<'c> Donations<'c> {
    pub fn new(conn: &'c mut SqliteConnection, settings: &RepositoryConfig) -> Self {
        Self {
            conn,
            settings: settings.clone(),
        }
    }

    pub fn with_default_settings(conn: &'c mut SqliteConnection) -> Self {
        Self {
            conn,
            settings: RepositoryConfig::default(),
        }
    }

    pub fn settings(&self) -> &RepositoryConfig {
        &self.settings
    }

    /// Compile a filter with this repository's list delimiter
    pub fn compile_filter(&self, filter: &DonationFilter) -> RepositoryResult<Predicate<DonationField>> {
        filter.compile(&self.settings.list_delimiter).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected donation filter");
        })
    }

    async fn require(&mut self, id: &Uuid, op: RepositoryOperation) -> RepositoryResult<Donation> {
        self.find_by_id(id)
            .await
            .map_err(|e| e.with_operation(op))?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id.to_string()).with_operation(op))
    }
}

impl Repository for Donations<'_> {
    type Id = Uuid;
    type Entity = Donation;
    type Input = DonationInput;
    type Filter = DonationFilter;
    type Field = DonationField;

    async fn create(&mut self, data: DonationInput, actor: &Actor) -> RepositoryResult<Donation> {
        let op = RepositoryOperation::Create;
        let id = resolve_id(data.id.as_deref(), op)?;
        let user = resolve_user(data.user.as_deref(), op)?;
        let now = now_millis();
        let record = NewDonation::from_input(id, &data, actor, now, now);

        insert_rows(&mut *self.conn, std::slice::from_ref(&record), op)
            .await
            .map_err(|e| e.with_entity(ENTITY, id.to_string()))?;
        UserLoader::new(&mut *self.conn).assign(&id, user).await?;

        tracing::info!(donation_id = %id, actor = %actor, "Created donation");
        self.require(&id, op).await
    }

    async fn update(
        &mut self,
        id: &Uuid,
        data: DonationInput,
        actor: &Actor,
    ) -> RepositoryResult<Donation> {
        let op = RepositoryOperation::Update;
        let user = resolve_user(data.user.as_deref(), op)?;

        let item = non_blank(data.item.as_deref());
        let item_search = search_text(item.as_deref());
        let location = non_blank(data.location.as_deref());
        let location_search = search_text(location.as_deref());

        let result = sqlx::query(
            "UPDATE donations SET item = ?, item_search = ?, quantity = ?, location = ?, \
             location_search = ?, updated_by_id = ?, updated_at = MAX(?, created_at) WHERE id = ?",
        )
        .bind(item)
        .bind(item_search)
        .bind(data.quantity)
        .bind(location)
        .bind(location_search)
        .bind(actor.column_value())
        .bind(now_millis().timestamp_millis())
        .bind(id.to_string())
        .execute(&mut *self.conn)
        .await
        .map_err(|e| RepositoryError::from_sqlx(op, e).with_entity(ENTITY, id.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(ENTITY, id.to_string()).with_operation(op));
        }
        UserLoader::new(&mut *self.conn).assign(id, user).await?;

        tracing::info!(donation_id = %id, actor = %actor, "Updated donation");
        self.require(id, op).await
    }

    async fn find_one(
        &mut self,
        predicate: &Predicate<DonationField>,
    ) -> RepositoryResult<Option<Donation>> {
        let op = RepositoryOperation::FindOne;
        let mut rows =
            select_rows(&mut *self.conn, predicate, DEFAULT_SORT, Pagination::new(0, 1), op).await?;
        UserLoader::new(&mut *self.conn).attach(&mut rows).await?;

        tracing::debug!(found = !rows.is_empty(), "Donation lookup");
        Ok(rows.pop())
    }

    async fn find_by_id(&mut self, id: &Uuid) -> RepositoryResult<Option<Donation>> {
        let predicate: Predicate<DonationField> =
            FilterCondition::eq(DonationField::Id, id.to_string()).into();
        self.find_one(&predicate).await
    }

    async fn find_page(
        &mut self,
        filter: &DonationFilter,
        request: &PageRequest<DonationField>,
        options: QueryOptions,
    ) -> RepositoryResult<Page<Donation>> {
        let op = RepositoryOperation::FindPage;
        let predicate = self.compile_filter(filter)?;
        let total_count = count_rows(&mut *self.conn, &predicate, op).await?;

        if options.count_only {
            tracing::debug!(total_count, "Counted donations");
            return Ok(Page::count_only(total_count));
        }

        let sort = request.sort.unwrap_or(DEFAULT_SORT);
        let mut rows =
            select_rows(&mut *self.conn, &predicate, sort, request.pagination(), op).await?;
        UserLoader::new(&mut *self.conn).attach(&mut rows).await?;

        tracing::debug!(
            page = request.page,
            page_size = request.page_size,
            returned = rows.len(),
            total_count,
            "Listed donations"
        );
        Ok(Page { rows, total_count })
    }

    async fn count(&mut self, filter: &DonationFilter) -> RepositoryResult<u64> {
        let predicate = self.compile_filter(filter)?;
        count_rows(&mut *self.conn, &predicate, RepositoryOperation::Count).await
    }

    async fn exists(&mut self, id: &Uuid) -> RepositoryResult<bool> {
        let found: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM donations WHERE id = ?)")
            .bind(id.to_string())
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| RepositoryError::from_sqlx(RepositoryOperation::Exists, e))?;
        Ok(found != 0)
    }
}

impl SoftDeleteRepository for Donations<'_> {
    async fn soft_delete_one(&mut self, id: &Uuid, actor: &Actor) -> RepositoryResult<Donation> {
        let op = RepositoryOperation::SoftDelete;
        let mut donation = self.require(id, op).await?;
        let ids = std::slice::from_ref(id);

        mark_deleted(&mut *self.conn, ids, actor).await?;
        remove_rows(&mut *self.conn, ids).await?;
        donation.deleted_by = actor.id;

        tracing::info!(donation_id = %id, actor = %actor, "Deleted donation");
        Ok(donation)
    }

    async fn soft_delete_many(
        &mut self,
        ids: &[Uuid],
        actor: &Actor,
    ) -> RepositoryResult<Vec<Donation>> {
        let op = RepositoryOperation::SoftDelete;
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.conn.begin().await.map_err(|e| {
            RepositoryError::transaction_failed(op, format!("Failed to begin transaction: {}", e))
        })?;

        match delete_in_transaction(&mut tx, &ids, actor).await {
            Ok(donations) => {
                tx.commit().await.map_err(|e| {
                    RepositoryError::transaction_failed(op, format!("Failed to commit transaction: {}", e))
                })?;
                tracing::info!(count = donations.len(), actor = %actor, "Deleted donations");
                Ok(donations)
            }
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    tracing::error!(error = %e, "Failed to roll back donation delete");
                }
                tracing::warn!(error = %err, "Donation delete rolled back");
                Err(err)
            }
        }
    }
}

impl BulkImportRepository for Donations<'_> {
    async fn bulk_import(
        &mut self,
        items: Vec<DonationInput>,
        actor: &Actor,
    ) -> RepositoryResult<Vec<Donation>> {
        let op = RepositoryOperation::BulkImport;
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let step = self.settings.bulk_import_step_ms;
        if step < 1 {
            return Err(RepositoryError::validation_failed(
                op,
                format!("Import timestamp step must be at least 1ms, got {}", step),
            ));
        }

        let now = now_millis();
        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let id = resolve_id(item.id.as_deref(), op)?;
            let created_at = i64::try_from(index)
                .ok()
                .and_then(|index| index.checked_mul(step))
                .and_then(|offset| now.timestamp_millis().checked_add(offset))
                .and_then(DateTime::from_timestamp_millis)
                .ok_or_else(|| {
                    RepositoryError::validation_failed(op, "Import timestamps out of range")
                })?;
            records.push(NewDonation::from_input(id, item, actor, created_at, now));
        }

        let mut tx = self.conn.begin().await.map_err(|e| {
            RepositoryError::transaction_failed(op, format!("Failed to begin transaction: {}", e))
        })?;

        if let Err(err) = insert_rows(&mut tx, &records, op).await {
            if let Err(e) = tx.rollback().await {
                tracing::error!(error = %e, "Failed to roll back donation import");
            }
            tracing::warn!(error = %err, rows = records.len(), "Donation import rolled back");
            return Err(err);
        }

        tx.commit().await.map_err(|e| {
            RepositoryError::transaction_failed(op, format!("Failed to commit transaction: {}", e))
        })?;

        tracing::info!(rows = records.len(), actor = %actor, "Imported donations");
        Ok(records.iter().map(NewDonation::to_donation).collect())
    }
}

impl AutocompleteRepository for Donations<'_> {
    type Id = Uuid;

    async fn suggest(
        &mut self,
        query: &str,
        limit: Option<u64>,
    ) -> RepositoryResult<Vec<Suggestion<Uuid>>> {
        let op = RepositoryOperation::Suggest;
        let limit = limit.unwrap_or(self.settings.suggest_limit);
        let query = query.trim();

        let predicate = if query.is_empty() {
            Predicate::All
        } else {
            let mut branches: Vec<Predicate<DonationField>> = Vec::with_capacity(2);
            if let Some(id) = try_normalize_id(query) {
                branches.push(FilterCondition::eq(DonationField::Id, id.to_string()).into());
            }
            branches.push(FilterCondition::contains(DonationField::Item, query).into());
            Predicate::or(branches)
        };

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, item FROM donations WHERE ");
        predicate.push_sql(&mut builder);
        builder.push(" ORDER BY item ASC, id ASC");
        push_pagination(&mut builder, Pagination::new(0, limit));

        let rows: Vec<(String, Option<String>)> = builder
            .build_query_as()
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| RepositoryError::from_sqlx(op, e))?;

        tracing::debug!(query, limit, returned = rows.len(), "Donation suggestions");
        rows.into_iter()
            .map(|(id, label)| {
                let id = Uuid::parse_str(&id).map_err(|e| {
                    RepositoryError::serialization_error(op, format!("Stored id {:?} is not a UUID: {}", id, e))
                })?;
                Ok(Suggestion { id, label })
            })
            .collect()
    }
}

/// Caller-supplied id, or a fresh one when absent or blank
fn resolve_id(raw: Option<&str>, op: RepositoryOperation) -> RepositoryResult<Uuid> {
    match raw.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => normalize_id(raw, op),
        None => Ok(generate_id()),
    }
}

/// Donor reference; absent or blank clears the association
fn resolve_user(raw: Option<&str>, op: RepositoryOperation) -> RepositoryResult<Option<Uuid>> {
    raw.filter(|raw| !raw.trim().is_empty())
        .map(|raw| normalize_id(raw, op))
        .transpose()
}

fn id_in(ids: &[Uuid]) -> Predicate<DonationField> {
    FilterCondition::in_strings(DonationField::Id, ids.iter().map(Uuid::to_string).collect()).into()
}

/// Look up every id, then mark and remove them all; runs inside the caller's transaction
async fn delete_in_transaction(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
    actor: &Actor,
) -> RepositoryResult<Vec<Donation>> {
    let op = RepositoryOperation::SoftDelete;

    let mut found: HashMap<Uuid, Donation> = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK) {
        let rows = select_rows(
            &mut *conn,
            &id_in(chunk),
            Sort::asc(DonationField::Id),
            Pagination::unbounded(),
            op,
        )
        .await?;
        found.extend(rows.into_iter().map(|donation| (donation.id, donation)));
    }

    if let Some(missing) = ids.iter().find(|id| !found.contains_key(id)) {
        return Err(RepositoryError::not_found(ENTITY, missing.to_string()).with_operation(op));
    }

    let mut donations: Vec<Donation> = ids.iter().filter_map(|id| found.remove(id)).collect();
    UserLoader::new(&mut *conn).attach(&mut donations).await?;

    mark_deleted(&mut *conn, ids, actor).await?;
    remove_rows(&mut *conn, ids).await?;

    for donation in &mut donations {
        donation.deleted_by = actor.id;
    }
    Ok(donations)
}

async fn mark_deleted(conn: &mut SqliteConnection, ids: &[Uuid], actor: &Actor) -> RepositoryResult<()> {
    for chunk in ids.chunks(ID_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE donations SET deleted_by = ");
        builder.push_bind(actor.column_value()).push(" WHERE ");
        id_in(chunk).push_sql(&mut builder);
        execute_expecting(conn, builder, chunk.len(), "mark").await?;
    }
    Ok(())
}

async fn remove_rows(conn: &mut SqliteConnection, ids: &[Uuid]) -> RepositoryResult<()> {
    for chunk in ids.chunks(ID_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM donations WHERE ");
        id_in(chunk).push_sql(&mut builder);
        execute_expecting(conn, builder, chunk.len(), "remove").await?;
    }
    Ok(())
}

/// Run a delete-phase statement that must touch exactly `expected` rows
async fn execute_expecting(
    conn: &mut SqliteConnection,
    mut builder: QueryBuilder<'_, Sqlite>,
    expected: usize,
    phase: &str,
) -> RepositoryResult<()> {
    let op = RepositoryOperation::SoftDelete;
    let result = builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_sqlx(op, e))?;

    if result.rows_affected() != expected as u64 {
        return Err(RepositoryError::new(
            op,
            RepositoryErrorKind::NotFound,
            format!(
                "Expected to {} {} donation(s), affected {}",
                phase,
                expected,
                result.rows_affected()
            ),
        ));
    }
    Ok(())
}

async fn select_rows(
    conn: &mut SqliteConnection,
    predicate: &Predicate<DonationField>,
    sort: Sort<DonationField>,
    pagination: Pagination,
    op: RepositoryOperation,
) -> RepositoryResult<Vec<Donation>> {
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM donations WHERE ", SELECT_COLUMNS));
    predicate.push_sql(&mut builder);

    builder
        .push(" ORDER BY ")
        .push(sort.field.column_name())
        .push(" ")
        .push(sort.direction.as_sql());
    if sort.field != DonationField::Id {
        builder.push(", id ASC");
    }
    push_pagination(&mut builder, pagination);

    let rows: Vec<DonationRow> = builder
        .build_query_as()
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_sqlx(op, e))?;

    rows.into_iter().map(|row| row.into_donation(op)).collect()
}

async fn count_rows(
    conn: &mut SqliteConnection,
    predicate: &Predicate<DonationField>,
    op: RepositoryOperation,
) -> RepositoryResult<u64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM donations WHERE ");
    predicate.push_sql(&mut builder);

    let count: i64 = builder
        .build_query_scalar()
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_sqlx(op, e))?;
    Ok(u64::try_from(count).unwrap_or_default())
}

async fn insert_rows(
    conn: &mut SqliteConnection,
    rows: &[NewDonation],
    op: RepositoryOperation,
) -> RepositoryResult<()> {
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO donations (id, item, item_search, quantity, location, location_search, \
             import_hash, active, created_by_id, updated_by_id, created_at, updated_at) ",
        );
        builder.push_values(chunk, |mut row_builder, row| {
            let actor = row.created_by_id.map(|id| id.to_string());
            row_builder
                .push_bind(row.id.to_string())
                .push_bind(row.item.clone())
                .push_bind(search_text(row.item.as_deref()))
                .push_bind(row.quantity)
                .push_bind(row.location.clone())
                .push_bind(search_text(row.location.as_deref()))
                .push_bind(row.import_hash.clone())
                .push_bind(row.active)
                .push_bind(actor.clone())
                .push_bind(actor)
                .push_bind(row.created_at.timestamp_millis())
                .push_bind(row.updated_at.timestamp_millis());
        });

        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| RepositoryError::from_sqlx(op, e))?;
    }
    Ok(())
}

fn push_pagination(builder: &mut QueryBuilder<'_, Sqlite>, pagination: Pagination) {
    if pagination.is_unbounded() {
        if pagination.offset > 0 {
            builder.push(" LIMIT -1 OFFSET ").push_bind(clamp_i64(pagination.offset));
        }
        return;
    }
    builder
        .push(" LIMIT ")
        .push_bind(clamp_i64(pagination.limit))
        .push(" OFFSET ")
        .push_bind(clamp_i64(pagination.offset));
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
