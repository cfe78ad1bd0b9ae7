//! Local classifier interface
//!
//! The numerical model runs out of process in an inference sidecar; this
//! module owns the calling contract: path in, label/probability/confidence
//! out, deterministic for identical input bytes.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::models::{Classification, EmissionLabel};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Classifier errors; each maps to a single per-item failure in the queue.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("cannot read image {0}: {1}")]
    Read(PathBuf, String),

    #[error("inference request failed: {0}")]
    Network(String),

    #[error("inference service returned {0}: {1}")]
    Api(u16, String),

    #[error("malformed inference response: {0}")]
    Parse(String),
}

/// Image classifier contract
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, path: &Path) -> Result<Classification, ClassifierError>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    image_b64: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    label: String,
    probability: f64,
    confidence: f64,
}

/// HTTP client for the local inference sidecar
pub struct SidecarClassifier {
    http_client: reqwest::Client,
    base_url: String,
}

impl SidecarClassifier {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Classifier for SidecarClassifier {
    async fn classify(&self, path: &Path) -> Result<Classification, ClassifierError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClassifierError::Read(path.to_path_buf(), e.to_string()))?;
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let url = format!("{}/predict", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&PredictRequest {
                image_b64: &image_b64,
            })
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api(status.as_u16(), body));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;

        let label = match parsed.label.as_str() {
            "smog" => EmissionLabel::Smog,
            "clear" => EmissionLabel::Clear,
            other => {
                return Err(ClassifierError::Parse(format!(
                    "unknown label '{}'",
                    other
                )))
            }
        };

        Ok(Classification {
            label,
            probability: parsed.probability.clamp(0.0, 1.0),
            confidence: parsed.confidence.clamp(0.0, 1.0),
        })
    }
}
