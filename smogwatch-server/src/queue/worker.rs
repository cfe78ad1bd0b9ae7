//! Queue worker — the processing core
//!
//! State machine per run:
//! Idle → Scanning → Classifying(i) → Persisting(i) → ... → PostProcessing → Idle
//!
//! At most one run is active at a time (check-and-set entry guard); items are
//! classified strictly in modification-time order; a single item's failure
//! never aborts the run; every exit path returns the state to idle.

use chrono::Utc;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::{images, images::ImageRecord, predictions};
use crate::queue::scanner::{CaptureScanner, DiscoveredImage};
use crate::queue::state::{QueueState, QueueStatus};
use crate::services::classifier::Classifier;
use crate::services::enrichment;
use crate::services::vision::VisionAnalyzer;

/// Observation tag identifying the classifier source on fresh predictions
pub const OBSERVATION_TAG: &str = "cnn-sidecar";

/// Delay between items; throttles back-to-back classification
const DEFAULT_THROTTLE: Duration = Duration::from_millis(200);

/// A discovered file paired with its resolved image record
struct PendingItem {
    file: DiscoveredImage,
    record: ImageRecord,
}

/// The capture-processing worker. One instance lives in the application
/// state; each trigger spawns at most one run against it.
pub struct QueueWorker {
    db: SqlitePool,
    captures_dir: PathBuf,
    classifier: Arc<dyn Classifier>,
    vision: Option<Arc<dyn VisionAnalyzer>>,
    state: QueueState,
    throttle: Duration,
}

impl QueueWorker {
    pub fn new(
        db: SqlitePool,
        captures_dir: impl Into<PathBuf>,
        classifier: Arc<dyn Classifier>,
        vision: Option<Arc<dyn VisionAnalyzer>>,
    ) -> Self {
        Self {
            db,
            captures_dir: captures_dir.into(),
            classifier,
            vision,
            state: QueueState::new(),
            throttle: DEFAULT_THROTTLE,
        }
    }

    /// Remove the inter-item delay; test runs shouldn't wait out throttling.
    #[doc(hidden)]
    pub fn without_throttle(mut self) -> Self {
        self.throttle = Duration::ZERO;
        self
    }

    /// Progress snapshot for the status endpoint.
    pub fn status(&self) -> QueueStatus {
        self.state.snapshot()
    }

    /// Fire-and-forget trigger: spawn a run as an independent task and
    /// return immediately. The at-most-one-run guard lives inside the run.
    pub fn spawn(self: &Arc<Self>, location_id: Option<i64>) {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            worker.run(location_id).await;
        });
    }

    /// Execute one queue run. A concurrent invocation while another run is
    /// active is silently absorbed.
    pub async fn run(&self, location_id: Option<i64>) {
        if !self.state.try_begin() {
            tracing::debug!("queue run already active, trigger absorbed");
            return;
        }

        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, "queue run started");

        // Idle reset is unconditional: a crashed run must never leave the
        // status stuck at running = true.
        if let Err(e) = self.run_inner(run_id, location_id).await {
            tracing::error!(run_id = %run_id, error = %e, "queue run aborted");
        }
        self.state.reset();

        tracing::info!(run_id = %run_id, "queue run finished");
    }

    async fn run_inner(&self, run_id: Uuid, location_id: Option<i64>) -> anyhow::Result<()> {
        // Discovery: unreadable capture directory is fatal to the run.
        let scanner = CaptureScanner::new(&self.captures_dir);
        let discovered = scanner.scan_fifo()?;
        tracing::debug!(run_id = %run_id, discovered = discovered.len(), "capture scan complete");

        // Dedup: resolve each file's image record and keep only the files
        // without a prediction. Resolution failures are isolated per file.
        let mut pending = Vec::new();
        for file in discovered {
            match self.resolve_pending(file, location_id).await {
                Ok(Some(item)) => pending.push(item),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(run_id = %run_id, error = %e, "skipping file, record resolution failed");
                }
            }
        }

        self.state.set_pending(pending.len());
        tracing::info!(run_id = %run_id, pending = pending.len(), "pending set published");

        // Strictly sequential FIFO pass; downstream consumers treat "oldest
        // pending" as a progress signal, so no reordering or parallelism.
        for item in &pending {
            self.state.begin_item(&item.file.filename);

            match self.process_item(item).await {
                Ok(()) => self.state.item_succeeded(),
                Err(e) => {
                    tracing::error!(
                        run_id = %run_id,
                        file = %item.file.filename,
                        error = %e,
                        "item failed, continuing with next file"
                    );
                }
            }

            if !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }
        }

        // Post-processing chain: best-effort, never fails the run.
        if let Some(vision) = &self.vision {
            if let Err(e) = enrichment::enrich_today(&self.db, vision.as_ref()).await {
                tracing::error!(run_id = %run_id, error = %e, "enrichment pass failed");
            }
        } else {
            tracing::debug!(run_id = %run_id, "vision service not configured, skipping enrichment");
        }

        Ok(())
    }

    /// Resolve (or create) the image record for a discovered file and decide
    /// whether it still needs classification.
    async fn resolve_pending(
        &self,
        file: DiscoveredImage,
        location_id: Option<i64>,
    ) -> anyhow::Result<Option<PendingItem>> {
        let locator = file.path.to_string_lossy().into_owned();
        let record = images::resolve_or_create(
            &self.db,
            &locator,
            &file.filename,
            file.modified,
            location_id,
        )
        .await?;

        if predictions::exists_for_image(&self.db, record.id).await? {
            return Ok(None);
        }

        Ok(Some(PendingItem { file, record }))
    }

    /// Classify one file and persist its prediction. The insert is the only
    /// write, so a failure anywhere leaves no partial state for this item.
    async fn process_item(&self, item: &PendingItem) -> anyhow::Result<()> {
        tracing::info!(file = %item.file.filename, "classifying");

        let classification = self.classifier.classify(&item.file.path).await?;

        predictions::insert(
            &self.db,
            item.record.id,
            &classification,
            OBSERVATION_TAG,
            Utc::now(),
        )
        .await?;

        tracing::info!(
            file = %item.file.filename,
            label = classification.label.as_str(),
            confidence = classification.confidence,
            "prediction persisted"
        );

        Ok(())
    }
}
