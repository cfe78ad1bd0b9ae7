//! Capture gallery endpoints
//!
//! Listings come straight from the capture directory (the camera writes
//! there out-of-band), newest first.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    api::auth::AuthUser,
    error::{ApiError, ApiResult},
    queue::{CaptureScanner, DiscoveredImage},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    /// Inclusive lower bound (YYYY-MM-DD)
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound (YYYY-MM-DD)
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct GalleryImage {
    pub filename: String,
    pub filepath: String,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
}

/// GET /api/gallery/images
pub async fn gallery_images(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<Json<Vec<GalleryImage>>> {
    let images = scan_newest_first(&state)?;

    let filtered = images
        .into_iter()
        .filter(|image| {
            let date = image.modified.date_naive();
            query.from.map_or(true, |from| date >= from)
                && query.to.map_or(true, |to| date <= to)
        })
        .map(|image| GalleryImage {
            filename: image.filename,
            filepath: image.path.to_string_lossy().into_owned(),
            timestamp: image.modified,
            size: image.size_bytes,
        })
        .collect();

    Ok(Json(filtered))
}

#[derive(Debug, Serialize)]
pub struct CapturedImage {
    pub filename: String,
    /// Public URL served by the static /captures route
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/captures
pub async fn list_captures(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<CapturedImage>>> {
    let base = state.config.public_base_url.trim_end_matches('/');

    let captures = scan_newest_first(&state)?
        .into_iter()
        .map(|image| CapturedImage {
            url: format!("{}/captures/{}", base, image.filename),
            timestamp: image.modified,
            filename: image.filename,
        })
        .collect();

    Ok(Json(captures))
}

fn scan_newest_first(state: &AppState) -> Result<Vec<DiscoveredImage>, ApiError> {
    let scanner = CaptureScanner::new(state.config.captures_dir());
    let mut images = match scanner.scan_fifo() {
        Ok(images) => images,
        // An empty gallery is not an error from the caller's perspective
        Err(crate::queue::ScanError::PathNotFound(_)) => Vec::new(),
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };
    images.reverse();
    Ok(images)
}

pub fn gallery_routes() -> Router<AppState> {
    Router::new()
        .route("/api/gallery/images", get(gallery_images))
        .route("/api/captures", get(list_captures))
}
