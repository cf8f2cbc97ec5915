//! Fixtures shared by the database-backed tests

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::database;

/// Fresh migrated in-memory database (single connection)
pub(crate) async fn memory_pool() -> SqlitePool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_retries: 0,
        ..DatabaseConfig::default()
    };
    database::connect(&config).await.unwrap()
}

pub(crate) async fn insert_user(conn: &mut SqliteConnection, first_name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, first_name, last_name, email) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(first_name)
        .bind("Tester")
        .bind(format!("{}@example.org", first_name.to_lowercase()))
        .execute(&mut *conn)
        .await
        .unwrap();
    id
}

/// Bare donation row, bypassing the repository
pub(crate) async fn insert_donation(conn: &mut SqliteConnection, item: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO donations (id, item, item_search, active, created_at, updated_at) \
         VALUES (?, ?, ?, 0, 0, 0)",
    )
    .bind(id.to_string())
    .bind(item)
    .bind(crate::repository::fold_case(item))
    .execute(&mut *conn)
    .await
    .unwrap();
    id
}
