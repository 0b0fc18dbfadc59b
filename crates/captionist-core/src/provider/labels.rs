//! Optional label detection ahead of captioning.
//!
//! Labels only enrich the prompt, so the orchestrator treats every detector
//! failure as "no labels".

use super::provider::resolve_secret;
use crate::config::LabelsConfig;
use crate::error::LabelError;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait LabelDetector: Send + Sync {
    /// Names of objects and scenes found in the image, most confident first.
    async fn detect_labels(&self, image_bytes: &[u8]) -> Result<Vec<String>, LabelError>;
}

/// Detector speaking the Rekognition `DetectLabels` JSON protocol.
pub struct HttpLabelDetector {
    endpoint: String,
    api_key: Option<String>,
    max_labels: usize,
    min_confidence: f32,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpLabelDetector {
    /// Build a detector, or `None` when detection is disabled or has no endpoint.
    pub fn from_config(config: &LabelsConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let endpoint = resolve_secret(&config.endpoint)?;
        Some(Self {
            endpoint,
            api_key: resolve_secret(&config.api_key),
            max_labels: config.max_labels,
            min_confidence: config.min_confidence,
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DetectLabelsRequest {
    image: ImageBlob,
    max_labels: usize,
    min_confidence: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ImageBlob {
    bytes: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectLabelsResponse {
    #[serde(default)]
    labels: Vec<DetectedLabel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectedLabel {
    name: String,
    #[serde(default)]
    confidence: f32,
}

/// Keep confident labels in reply order, up to `max_labels`.
fn select_labels(response: DetectLabelsResponse, max_labels: usize, min_confidence: f32) -> Vec<String> {
    response
        .labels
        .into_iter()
        .filter(|label| label.confidence >= min_confidence)
        .take(max_labels)
        .map(|label| label.name)
        .collect()
}

#[async_trait]
impl LabelDetector for HttpLabelDetector {
    async fn detect_labels(&self, image_bytes: &[u8]) -> Result<Vec<String>, LabelError> {
        let body = DetectLabelsRequest {
            image: ImageBlob {
                bytes: base64::engine::general_purpose::STANDARD.encode(image_bytes),
            },
            max_labels: self.max_labels,
            min_confidence: self.min_confidence,
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/x-amz-json-1.1")
            .header("x-amz-target", "RekognitionService.DetectLabels")
            .timeout(self.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| LabelError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LabelError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: DetectLabelsResponse = resp
            .json()
            .await
            .map_err(|e| LabelError::InvalidReply(e.to_string()))?;
        Ok(select_labels(parsed, self.max_labels, self.min_confidence))
    }
}
