//! User persistence for the authentication surface

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let created_at_str: String = row.get("created_at");
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        created_at: super::parse_timestamp(&created_at_str)?,
    })
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, name, username, password_hash, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, name, username, password_hash, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn create(
    pool: &SqlitePool,
    name: &str,
    username: &str,
    password_hash: &str,
) -> Result<User> {
    let created_at = Utc::now();
    let id = sqlx::query(
        "INSERT INTO users (name, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(username)
    .bind(password_hash)
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(User {
        id,
        name: name.to_string(),
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        created_at,
    })
}

/// Seed the configured admin account when the users table is empty.
pub async fn seed_admin(pool: &SqlitePool, username: &str, password: &str) -> Result<()> {
    if count(pool).await? > 0 {
        return Ok(());
    }

    let hash = smogwatch_common::auth::hash_password(password)?;
    create(pool, "Administrator", username, &hash).await?;
    tracing::warn!(
        username = %username,
        "Seeded default admin account; change its password before exposing the service"
    );
    Ok(())
}
