//! Capture location persistence

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

/// Insert a capture location and return its id.
pub async fn create(
    pool: &SqlitePool,
    name: Option<&str>,
    latitude: f64,
    longitude: f64,
) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO locations (name, latitude, longitude, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(latitude)
    .bind(longitude)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}
