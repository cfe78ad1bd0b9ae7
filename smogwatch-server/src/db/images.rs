//! Image record persistence
//!
//! One row per physical capture file. The worker creates rows on first
//! discovery; only the plate field is mutated afterwards.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// Durable record of a discovered capture
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: i64,
    pub original_filename: String,
    /// Storage locator: local path or public URL, unique per file
    pub locator: String,
    /// Plate text when enrichment (or an operator) supplied one
    pub plate: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub user_id: Option<i64>,
    pub location_id: Option<i64>,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ImageRecord> {
    let uploaded_at_str: String = row.get("uploaded_at");
    Ok(ImageRecord {
        id: row.get("id"),
        original_filename: row.get("original_filename"),
        locator: row.get("locator"),
        plate: row.get("plate"),
        uploaded_at: super::parse_timestamp(&uploaded_at_str)?,
        user_id: row.get("user_id"),
        location_id: row.get("location_id"),
    })
}

const SELECT_COLUMNS: &str =
    "SELECT id, original_filename, locator, plate, uploaded_at, user_id, location_id FROM images";

/// Resolve the image record for a file, creating it when absent.
///
/// Lookup precedence: locator first, then original filename. The filename is
/// the canonical identity of a capture; locators have migrated between path
/// schemes (local paths vs. public URLs), so the filename fallback keeps old
/// rows attached to their files across such migrations.
pub async fn resolve_or_create(
    pool: &SqlitePool,
    locator: &str,
    filename: &str,
    uploaded_at: DateTime<Utc>,
    location_id: Option<i64>,
) -> Result<ImageRecord> {
    if let Some(existing) = find_by_locator(pool, locator).await? {
        return Ok(existing);
    }
    if let Some(existing) = find_by_filename(pool, filename).await? {
        return Ok(existing);
    }

    let id = sqlx::query(
        r#"
        INSERT INTO images (original_filename, locator, plate, uploaded_at, user_id, location_id)
        VALUES (?, ?, NULL, ?, NULL, ?)
        "#,
    )
    .bind(filename)
    .bind(locator)
    .bind(uploaded_at.to_rfc3339())
    .bind(location_id)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(ImageRecord {
        id,
        original_filename: filename.to_string(),
        locator: locator.to_string(),
        plate: None,
        uploaded_at,
        user_id: None,
        location_id,
    })
}

pub async fn find_by_locator(pool: &SqlitePool, locator: &str) -> Result<Option<ImageRecord>> {
    let row = sqlx::query(&format!("{} WHERE locator = ?", SELECT_COLUMNS))
        .bind(locator)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn find_by_filename(pool: &SqlitePool, filename: &str) -> Result<Option<ImageRecord>> {
    let row = sqlx::query(&format!(
        "{} WHERE original_filename = ? LIMIT 1",
        SELECT_COLUMNS
    ))
    .bind(filename)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ImageRecord>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Set the plate text detected for an image.
pub async fn set_plate(pool: &SqlitePool, image_id: i64, plate: &str) -> Result<()> {
    sqlx::query("UPDATE images SET plate = ? WHERE id = ?")
        .bind(plate)
        .bind(image_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Images uploaded at or after the cutoff that already carry a prediction.
/// This is the enrichment backlog for the day.
pub async fn predicted_since(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<ImageRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT i.id, i.original_filename, i.locator, i.plate, i.uploaded_at, i.user_id, i.location_id
        FROM images i
        JOIN predictions p ON p.image_id = i.id
        WHERE i.uploaded_at >= ?
        ORDER BY i.uploaded_at ASC
        "#,
    )
    .bind(cutoff.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}
