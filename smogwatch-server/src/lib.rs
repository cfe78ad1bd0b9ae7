//! smogwatch-server library interface
//!
//! Exposes the application state and router for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::queue::QueueWorker;
use crate::services::vision::VisionAnalyzer;
use smogwatch_common::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved runtime configuration
    pub config: Arc<Config>,
    /// The capture-processing worker; one per process
    pub queue: Arc<QueueWorker>,
    /// Vision service used by the standalone enrichment endpoints
    pub vision: Option<Arc<dyn VisionAnalyzer>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Arc<Config>,
        queue: Arc<QueueWorker>,
        vision: Option<Arc<dyn VisionAnalyzer>>,
    ) -> Self {
        Self {
            db,
            config,
            queue,
            vision,
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let captures_dir = state.config.captures_dir();

    Router::new()
        .merge(api::auth_routes())
        .merge(api::analysis_routes())
        .merge(api::gallery_routes())
        .merge(api::health_routes())
        .nest_service("/captures", ServeDir::new(captures_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
