//! Secondary enrichment pass
//!
//! Re-analyzes already-classified images through the external vision service
//! and overwrites their prediction rows in place. Best-effort throughout:
//! one image's failure never stops the rest of the backlog.

use anyhow::{anyhow, Result};
use chrono::{NaiveTime, Utc};
use sqlx::SqlitePool;

use crate::db::{images, images::ImageRecord, predictions};
use crate::models::VisionAnalysis;
use crate::services::vision::VisionAnalyzer;

/// Result of a bulk enrichment pass
#[derive(Debug, Default, serde::Serialize)]
pub struct EnrichmentOutcome {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Enrich every image uploaded today (UTC) that already carries a
/// prediction, including ones classified in earlier runs.
pub async fn enrich_today(
    pool: &SqlitePool,
    vision: &dyn VisionAnalyzer,
) -> Result<EnrichmentOutcome> {
    let start_of_day = Utc::now()
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    let backlog = images::predicted_since(pool, start_of_day).await?;

    let mut outcome = EnrichmentOutcome::default();

    for image in backlog {
        outcome.processed += 1;
        match enrich_image(pool, vision, &image).await {
            Ok(_) => outcome.succeeded += 1,
            Err(e) => {
                outcome.failed += 1;
                tracing::error!(
                    image_id = image.id,
                    filename = %image.original_filename,
                    error = %e,
                    "enrichment failed for image, continuing"
                );
                outcome.errors.push(format!("image {}: {}", image.id, e));
            }
        }
    }

    tracing::info!(
        processed = outcome.processed,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "enrichment pass finished"
    );

    Ok(outcome)
}

/// Enrich a single image: call the vision service, overwrite its prediction
/// row in place, and record the plate when one was read.
pub async fn enrich_image(
    pool: &SqlitePool,
    vision: &dyn VisionAnalyzer,
    image: &ImageRecord,
) -> Result<VisionAnalysis> {
    let prediction = predictions::find_by_image(pool, image.id)
        .await?
        .ok_or_else(|| anyhow!("image {} has no prediction to enrich", image.id))?;

    let analysis = vision.analyze(&image.locator).await?;

    // The classifier's verdict is replaced, not versioned; leave a trace of
    // what it said so history can be reconstructed from logs.
    tracing::info!(
        image_id = image.id,
        prediction_id = prediction.id,
        prior_label = prediction.label.as_str(),
        prior_confidence = prediction.confidence,
        new_label = analysis.label().as_str(),
        new_confidence_pct = analysis.confidence_pct,
        "overwriting prediction with enrichment result"
    );

    predictions::overwrite_with_analysis(pool, prediction.id, &analysis, Utc::now()).await?;

    if let Some(plate) = analysis.detected_plate() {
        images::set_plate(pool, image.id, plate).await?;
    }

    Ok(analysis)
}
