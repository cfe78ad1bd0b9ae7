//! smogwatch-server - vehicle emissions monitoring backend
//!
//! A camera drops captures into a directory; the queue worker classifies
//! each image through a local model sidecar, persists one prediction per
//! image, and chains an external vision enrichment pass over the day's
//! backlog. This binary wires configuration, database, worker, and the
//! HTTP API together.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use smogwatch_common::Config;
use smogwatch_server::services::{
    vision::VisionAnalyzer, OpenAiVision, SidecarClassifier,
};
use smogwatch_server::{build_router, queue::QueueWorker, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting smogwatch-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve configuration and make sure the data directories exist
    let config = Arc::new(Config::load()?);
    config.ensure_directories()?;
    info!("Root folder: {}", config.root_folder.display());
    info!("Capture directory: {}", config.captures_dir().display());

    // Open or create the database
    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = smogwatch_server::db::init_database_pool(&db_path).await?;

    // Seed the admin account on first start
    smogwatch_server::db::users::seed_admin(
        &db_pool,
        &config.admin_username,
        &config.admin_password,
    )
    .await?;

    // Classifier sidecar is mandatory; the vision service is optional and
    // only disables the enrichment chain when absent.
    let classifier = Arc::new(SidecarClassifier::new(&config.inference_url)?);
    info!("Classifier sidecar: {}", config.inference_url);

    let vision: Option<Arc<dyn VisionAnalyzer>> = match &config.openai_api_key {
        Some(key) => {
            info!("Vision enrichment enabled (model: {})", config.openai_model);
            Some(Arc::new(OpenAiVision::new(
                &config.openai_api_url,
                key,
                &config.openai_model,
            )?))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, enrichment disabled");
            None
        }
    };

    let queue = Arc::new(QueueWorker::new(
        db_pool.clone(),
        config.captures_dir(),
        classifier,
        vision.clone(),
    ));

    let state = AppState::new(db_pool, config.clone(), queue, vision);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
