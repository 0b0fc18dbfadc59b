//! Caption provider trait and request types.
//!
//! Defines the interface every caption backend implements, plus the factory
//! that builds the closed set of backends from config.

use crate::config::{resolve_env_var, ProviderConfig};
use crate::error::{CaptionError, CaptionResult};
use crate::pipeline::NormalizedImage;
use crate::types::{CaptionPair, CaptionProviderKind};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

/// Base64-encoded image ready to embed in a JSON request body.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type of the encoded bytes
    pub media_type: String,
}

impl ImageInput {
    /// Encode canonical JPEG bytes.
    pub fn jpeg(bytes: &[u8]) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: "image/jpeg".to_string(),
        }
    }
}

/// An immutable captioning request.
///
/// Built once per upload and shared read-only with every provider attempt.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    image: Arc<NormalizedImage>,
    raw_bytes: Option<Arc<Vec<u8>>>,
    labels: Vec<String>,
}

impl CaptionRequest {
    pub fn new(image: NormalizedImage) -> Self {
        Self {
            image: Arc::new(image),
            raw_bytes: None,
            labels: Vec::new(),
        }
    }

    /// Attach the original upload bytes, used for label detection.
    pub fn with_raw_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.raw_bytes = Some(Arc::new(bytes));
        self
    }

    /// Attach pre-fetched labels, in detector order.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn image(&self) -> &NormalizedImage {
        &self.image
    }

    /// Canonical JPEG bytes every provider receives.
    pub fn jpeg(&self) -> &[u8] {
        &self.image.jpeg
    }

    pub fn raw_bytes(&self) -> Option<&[u8]> {
        self.raw_bytes.as_deref().map(Vec::as_slice)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Prompt text for free-text backends.
    pub fn prompt(&self) -> String {
        super::prompt::build_prompt(&self.labels)
    }
}

/// Trait that all caption providers implement.
///
/// Uses `async_trait` because the orchestrator holds providers as
/// `Arc<dyn CaptionProvider>`.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> CaptionProviderKind;

    /// Whether the provider has the configuration it needs. No network calls.
    fn is_available(&self) -> bool;

    /// Produce a concise and creative caption for the request.
    ///
    /// Returns `ProviderUnavailable` when called without configuration,
    /// `ProviderCallFailed` for every other failure.
    async fn generate_caption(&self, request: &CaptionRequest) -> CaptionResult<CaptionPair>;

    /// Per-request network timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// POST a prepared request and decode the JSON reply.
///
/// Non-2xx statuses become `ProviderCallFailed` carrying the status code.
pub(crate) async fn send_json(
    kind: CaptionProviderKind,
    request: reqwest::RequestBuilder,
) -> CaptionResult<serde_json::Value> {
    let resp = request.send().await.map_err(|e| CaptionError::ProviderCallFailed {
        provider: kind,
        message: format!("request failed: {e}"),
        status_code: e.status().map(|s| s.as_u16()),
    })?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(status_error(kind, status, &text));
    }

    resp.json()
        .await
        .map_err(|e| CaptionError::call_failed(kind, format!("invalid JSON reply: {e}")))
}

/// Failure for a non-2xx reply, keeping the status code for logs.
pub(crate) fn status_error(
    kind: CaptionProviderKind,
    status: reqwest::StatusCode,
    body: &str,
) -> CaptionError {
    CaptionError::ProviderCallFailed {
        provider: kind,
        message: format!("HTTP {status}: {body}"),
        status_code: Some(status.as_u16()),
    }
}

/// Text of a JSON value as the reply parser should see it.
///
/// Strings are used as-is; anything else is serialized.
pub(crate) fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read the first present string field out of a JSON object.
pub(crate) fn first_string_field(value: &serde_json::Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| value.get(*f).and_then(|v| v.as_str()))
        .map(String::from)
}

/// Resolve an optional secret, treating blanks as unset.
pub(crate) fn resolve_secret(value: &str) -> Option<String> {
    resolve_env_var(value).filter(|v| !v.trim().is_empty())
}

/// Factory that creates the full provider set from config.
pub struct CaptionProviderFactory;

impl CaptionProviderFactory {
    /// One provider per kind, in the default fallback order.
    pub fn create_all(config: &ProviderConfig) -> Vec<Arc<dyn CaptionProvider>> {
        CaptionProviderKind::DEFAULT_ORDER
            .iter()
            .map(|kind| Self::create(*kind, config))
            .collect()
    }

    /// Create the provider for a single kind.
    pub fn create(kind: CaptionProviderKind, config: &ProviderConfig) -> Arc<dyn CaptionProvider> {
        match kind {
            CaptionProviderKind::RemoteHostedModel => {
                Arc::new(super::bedrock::BedrockProvider::new(&config.bedrock))
            }
            CaptionProviderKind::ManagedInference => {
                Arc::new(super::sagemaker::SageMakerProvider::new(&config.sagemaker))
            }
            CaptionProviderKind::PublicInferenceApi => {
                Arc::new(super::huggingface::HuggingFaceProvider::new(&config.huggingface))
            }
        }
    }
}
