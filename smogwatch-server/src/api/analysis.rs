//! Analysis endpoints: queue trigger/status, emissions listing, enrichment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::auth::AuthUser,
    db::{images, predictions, predictions::EmissionRow},
    error::{ApiError, ApiResult},
    services::{enrichment, geocode},
    AppState,
};

/// Optional trigger body: capture coordinates to associate with the run
#[derive(Debug, Deserialize)]
pub struct TriggerQueueRequest {
    pub lat: f64,
    pub lng: f64,
    /// Display name; reverse-geocoded when absent
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerQueueResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<i64>,
}

/// POST /api/analysis/queue
///
/// Fire-and-forget: spawns the queue run and acknowledges immediately. A
/// concurrent trigger while a run is active is absorbed inside the worker;
/// this caller still sees "accepted". Processing failures are observable
/// only through persisted state and logs.
pub async fn trigger_queue(
    State(state): State<AppState>,
    _user: AuthUser,
    body: Option<Json<TriggerQueueRequest>>,
) -> ApiResult<(StatusCode, Json<TriggerQueueResponse>)> {
    let location_id = match body {
        Some(Json(request)) => {
            let name = match request.name.filter(|n| !n.trim().is_empty()) {
                Some(name) => Some(name),
                None => geocode::reverse_geocode(request.lat, request.lng).await,
            };
            let id = crate::db::locations::create(
                &state.db,
                name.as_deref(),
                request.lat,
                request.lng,
            )
            .await?;
            Some(id)
        }
        None => None,
    };

    state.queue.spawn(location_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerQueueResponse {
            message: "queue processing started".to_string(),
            location_id,
        }),
    ))
}

/// GET /api/analysis/queue/status
///
/// Lock-protected snapshot of worker progress; never blocks on the worker.
pub async fn queue_status(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Json<crate::queue::QueueStatus> {
    Json(state.queue.status())
}

/// GET /api/analysis/emissions
pub async fn list_emissions(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<EmissionRow>>> {
    let rows = predictions::list_emissions(&state.db).await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
pub struct EnrichImageResponse {
    pub message: String,
    pub analysis: crate::models::VisionAnalysis,
}

/// POST /api/analysis/images/:id/enrich
///
/// Synchronous single-image enrichment; unlike the queue's best-effort
/// chain, failures here are surfaced to the caller.
pub async fn enrich_image(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(image_id): Path<i64>,
) -> ApiResult<Json<EnrichImageResponse>> {
    let vision = state
        .vision
        .as_ref()
        .ok_or_else(|| ApiError::Conflict("vision service not configured".to_string()))?;

    let image = images::find_by_id(&state.db, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("image {} not found", image_id)))?;

    if predictions::find_by_image(&state.db, image_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "image {} has no prediction yet",
            image_id
        )));
    }

    let analysis = enrichment::enrich_image(&state.db, vision.as_ref(), &image)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(EnrichImageResponse {
        message: "analysis completed and prediction updated".to_string(),
        analysis,
    }))
}

/// POST /api/analysis/enrich-today
///
/// Bulk enrichment over today's predicted images, same pass the queue chains
/// after classification.
pub async fn enrich_today(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<enrichment::EnrichmentOutcome>> {
    let vision = state
        .vision
        .as_ref()
        .ok_or_else(|| ApiError::Conflict("vision service not configured".to_string()))?;

    let outcome = enrichment::enrich_today(&state.db, vision.as_ref())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(outcome))
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analysis/queue", post(trigger_queue))
        .route("/api/analysis/queue/status", get(queue_status))
        .route("/api/analysis/emissions", get(list_emissions))
        .route("/api/analysis/images/:id/enrich", post(enrich_image))
        .route("/api/analysis/enrich-today", post(enrich_today))
}
