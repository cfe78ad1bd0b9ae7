//! External vision service client
//!
//! Sends an image to the OpenAI vision endpoint with a strict-JSON prompt
//! and parses the structured assessment. Responses that are not valid JSON
//! are salvaged with a conservative fallback instead of failing the item.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::models::VisionAnalysis;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 500;

const PROMPT: &str = r#"Analyze this image of a vehicle and answer exclusively in JSON with this exact shape:
{
  "smoke_visible": true/false,
  "severity_pct": 0-100,
  "confidence_pct": 0-100,
  "short_description": "brief description of the vehicle's condition",
  "plate": "license plate if legible, otherwise 'undefined'"
}

Assess whether black exhaust smoke is present. severity_pct is the smoke
intensity estimate (0 = none, 100 = very dense). confidence_pct is how sure
you are of the assessment. If the plate is readable include it, otherwise use
"undefined"."#;

/// Vision service errors
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("cannot load image {0}: {1}")]
    Load(String, String),

    #[error("vision request failed: {0}")]
    Network(String),

    #[error("vision service returned {0}: {1}")]
    Api(u16, String),

    #[error("malformed vision response: {0}")]
    Parse(String),

    #[error("vision service not configured")]
    NotConfigured,
}

/// Asynchronous vision analysis contract.
///
/// Implementations must tolerate being given either a direct file path or a
/// resolvable public URL as the locator.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, locator: &str) -> Result<VisionAnalysis, VisionError>;
}

/// OpenAI chat-completions vision client
pub struct OpenAiVision {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiVision {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, VisionError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VisionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Load the image bytes from a direct path or a public URL.
    async fn load_image(&self, locator: &str) -> Result<Vec<u8>, VisionError> {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            let response = self
                .http_client
                .get(locator)
                .send()
                .await
                .map_err(|e| VisionError::Load(locator.to_string(), e.to_string()))?;
            if !response.status().is_success() {
                return Err(VisionError::Load(
                    locator.to_string(),
                    format!("status {}", response.status()),
                ));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| VisionError::Load(locator.to_string(), e.to_string()))?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(locator)
                .await
                .map_err(|e| VisionError::Load(locator.to_string(), e.to_string()))
        }
    }
}

#[async_trait]
impl VisionAnalyzer for OpenAiVision {
    async fn analyze(&self, locator: &str) -> Result<VisionAnalysis, VisionError> {
        let bytes = self.load_image(locator).await?;
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let payload = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": PROMPT },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/jpeg;base64,{}", image_b64) }
                    }
                ]
            }],
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| VisionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Api(status.as_u16(), body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| VisionError::Parse("response contained no choices".to_string()))?;

        Ok(parse_analysis(content))
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    smoke_visible: bool,
    #[serde(default)]
    severity_pct: f64,
    #[serde(default)]
    confidence_pct: f64,
    #[serde(default)]
    short_description: String,
    #[serde(default = "undefined_plate")]
    plate: String,
}

fn undefined_plate() -> String {
    "undefined".to_string()
}

/// Parse the model's answer, salvaging non-JSON replies with a conservative
/// fallback so a chatty response never corrupts the prediction record.
fn parse_analysis(content: &str) -> VisionAnalysis {
    let trimmed = strip_code_fences(content);

    match serde_json::from_str::<RawAnalysis>(trimmed) {
        Ok(raw) => VisionAnalysis {
            smoke_visible: raw.smoke_visible,
            severity_pct: raw.severity_pct.clamp(0.0, 100.0).round() as u8,
            confidence_pct: raw.confidence_pct.clamp(0.0, 100.0).round() as u8,
            short_description: raw.short_description,
            plate: raw.plate,
        },
        Err(e) => {
            tracing::warn!(error = %e, "vision response was not valid JSON, using fallback parse");
            let lower = content.to_lowercase();
            VisionAnalysis {
                smoke_visible: lower.contains("smog") || lower.contains("smoke"),
                severity_pct: 50,
                confidence_pct: 70,
                short_description: content.chars().take(200).collect(),
                plate: "undefined".to_string(),
            }
        }
    }
}

/// Models often wrap JSON answers in markdown fences despite instructions.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_json() {
        let content = r#"{"smoke_visible": true, "severity_pct": 82, "confidence_pct": 91,
            "short_description": "dense black exhaust", "plate": "XYZ-987"}"#;
        let analysis = parse_analysis(content);
        assert!(analysis.smoke_visible);
        assert_eq!(analysis.severity_pct, 82);
        assert_eq!(analysis.confidence_pct, 91);
        assert_eq!(analysis.plate, "XYZ-987");
    }

    #[test]
    fn parses_fenced_json() {
        let content = "```json\n{\"smoke_visible\": false, \"severity_pct\": 3, \"confidence_pct\": 88, \"short_description\": \"clean\", \"plate\": \"undefined\"}\n```";
        let analysis = parse_analysis(content);
        assert!(!analysis.smoke_visible);
        assert_eq!(analysis.severity_pct, 3);
        assert_eq!(analysis.detected_plate(), None);
    }

    #[test]
    fn clamps_out_of_range_percentages() {
        let content = r#"{"smoke_visible": true, "severity_pct": 250, "confidence_pct": -4,
            "short_description": "x", "plate": "undefined"}"#;
        let analysis = parse_analysis(content);
        assert_eq!(analysis.severity_pct, 100);
        assert_eq!(analysis.confidence_pct, 0);
    }

    #[test]
    fn fallback_for_prose_answer() {
        let content = "I can see heavy smoke coming from the exhaust of this truck.";
        let analysis = parse_analysis(content);
        assert!(analysis.smoke_visible);
        assert_eq!(analysis.severity_pct, 50);
        assert_eq!(analysis.confidence_pct, 70);
        assert_eq!(analysis.plate, "undefined");
        assert!(analysis.short_description.starts_with("I can see"));
    }

    #[test]
    fn fallback_without_smoke_mention() {
        let analysis = parse_analysis("The vehicle appears to be in good condition.");
        assert!(!analysis.smoke_visible);
    }
}
