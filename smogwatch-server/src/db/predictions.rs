//! Prediction record persistence
//!
//! At most one prediction per image (UNIQUE image_id). Existence of a row is
//! the queue's "already processed" signal. Enrichment overwrites the row in
//! place; it never inserts a second one.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::models::{Classification, EmissionLabel, VisionAnalysis};

/// Classification output persisted for one image
#[derive(Debug, Clone)]
pub struct PredictionRecord {
    pub id: i64,
    pub image_id: i64,
    pub label: EmissionLabel,
    /// Model certainty in its label, [0,1]
    pub confidence: f64,
    /// Smoke intensity score, [0,1]
    pub severity: f64,
    pub predicted_at: DateTime<Utc>,
    pub observation: Option<String>,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PredictionRecord> {
    let label: String = row.get("label");
    let predicted_at_str: String = row.get("predicted_at");
    Ok(PredictionRecord {
        id: row.get("id"),
        image_id: row.get("image_id"),
        label: EmissionLabel::from_db(&label),
        confidence: row.get("confidence"),
        severity: row.get("severity"),
        predicted_at: super::parse_timestamp(&predicted_at_str)?,
        observation: row.get("observation"),
    })
}

const SELECT_COLUMNS: &str =
    "SELECT id, image_id, label, confidence, severity, predicted_at, observation FROM predictions";

/// Insert the initial classification for an image.
///
/// Fails if the image already has a prediction (unique constraint); callers
/// are expected to have checked first via `exists_for_image`.
pub async fn insert(
    pool: &SqlitePool,
    image_id: i64,
    classification: &Classification,
    observation: &str,
    predicted_at: DateTime<Utc>,
) -> Result<PredictionRecord> {
    let id = sqlx::query(
        r#"
        INSERT INTO predictions (image_id, label, confidence, severity, predicted_at, observation)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(image_id)
    .bind(classification.label.as_str())
    .bind(classification.confidence)
    .bind(classification.probability)
    .bind(predicted_at.to_rfc3339())
    .bind(observation)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(PredictionRecord {
        id,
        image_id,
        label: classification.label,
        confidence: classification.confidence,
        severity: classification.probability,
        predicted_at,
        observation: Some(observation.to_string()),
    })
}

/// Whether an image already has a prediction (the queue dedup signal).
pub async fn exists_for_image(pool: &SqlitePool, image_id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM predictions WHERE image_id = ?")
        .bind(image_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn find_by_image(pool: &SqlitePool, image_id: i64) -> Result<Option<PredictionRecord>> {
    let row = sqlx::query(&format!("{} WHERE image_id = ?", SELECT_COLUMNS))
        .bind(image_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Overwrite an existing prediction in place with enrichment results.
///
/// Same row id, same image_id; only label/confidence/severity/observation
/// and the prediction timestamp change.
pub async fn overwrite_with_analysis(
    pool: &SqlitePool,
    prediction_id: i64,
    analysis: &VisionAnalysis,
    predicted_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE predictions
        SET label = ?, confidence = ?, severity = ?, observation = ?, predicted_at = ?
        WHERE id = ?
        "#,
    )
    .bind(analysis.label().as_str())
    .bind(f64::from(analysis.confidence_pct) / 100.0)
    .bind(f64::from(analysis.severity_pct) / 100.0)
    .bind(&analysis.short_description)
    .bind(predicted_at.to_rfc3339())
    .bind(prediction_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// One row of the emissions listing (image joined with its prediction)
#[derive(Debug, Clone, serde::Serialize)]
pub struct EmissionRow {
    pub image_id: i64,
    pub original_filename: String,
    pub locator: String,
    pub plate: Option<String>,
    pub label: EmissionLabel,
    pub confidence: f64,
    pub severity: f64,
    pub observation: Option<String>,
    pub predicted_at: DateTime<Utc>,
}

/// All images that have a prediction, newest prediction first.
pub async fn list_emissions(pool: &SqlitePool) -> Result<Vec<EmissionRow>> {
    let rows = sqlx::query(
        r#"
        SELECT i.id AS image_id, i.original_filename, i.locator, i.plate,
               p.label, p.confidence, p.severity, p.observation, p.predicted_at
        FROM images i
        JOIN predictions p ON p.image_id = i.id
        ORDER BY p.predicted_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let label: String = row.get("label");
            let predicted_at_str: String = row.get("predicted_at");
            Ok(EmissionRow {
                image_id: row.get("image_id"),
                original_filename: row.get("original_filename"),
                locator: row.get("locator"),
                plate: row.get("plate"),
                label: EmissionLabel::from_db(&label),
                confidence: row.get("confidence"),
                severity: row.get("severity"),
                observation: row.get("observation"),
                predicted_at: super::parse_timestamp(&predicted_at_str)?,
            })
        })
        .collect()
}
