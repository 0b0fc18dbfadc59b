//! Public inference API provider (BLIP image captioning).
//!
//! BLIP returns one plain caption, so the concise and creative variants are
//! derived locally from it and the detected labels.

use super::prompt::{make_concise, make_creative};
use super::provider::{
    first_string_field, resolve_secret, send_json, value_text, CaptionProvider, CaptionRequest,
};
use crate::config::HuggingFaceConfig;
use crate::error::{CaptionError, CaptionResult};
use crate::types::{CaptionPair, CaptionProviderKind};
use async_trait::async_trait;
use std::time::Duration;

pub struct HuggingFaceProvider {
    model_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HuggingFaceProvider {
    pub fn new(config: &HuggingFaceConfig) -> Self {
        Self {
            model_url: config.model_url.clone(),
            api_key: resolve_secret(&config.api_key),
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        }
    }
}

/// Base caption from `[{generated_text}]`, `{generated_text|caption}`, or the raw JSON.
fn base_caption(reply: &serde_json::Value) -> String {
    match reply {
        serde_json::Value::Array(items) if !items.is_empty() => {
            first_string_field(&items[0], &["generated_text"]).unwrap_or_default()
        }
        serde_json::Value::Object(_) => {
            first_string_field(reply, &["generated_text", "caption"]).unwrap_or_default()
        }
        other => value_text(other),
    }
}

fn stylize(base: &str, labels: &[String]) -> CaptionPair {
    CaptionPair {
        concise: make_concise(base),
        creative: make_creative(base, labels),
    }
}

#[async_trait]
impl CaptionProvider for HuggingFaceProvider {
    fn kind(&self) -> CaptionProviderKind {
        CaptionProviderKind::PublicInferenceApi
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_caption(&self, request: &CaptionRequest) -> CaptionResult<CaptionPair> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CaptionError::ProviderUnavailable {
                provider: self.kind(),
            });
        };

        let reply = send_json(
            self.kind(),
            self.client
                .post(&self.model_url)
                .bearer_auth(api_key)
                .header("content-type", "image/jpeg")
                .timeout(self.timeout)
                .body(request.jpeg().to_vec()),
        )
        .await?;

        let base = base_caption(&reply);
        tracing::debug!(caption = %base, "BLIP base caption");
        Ok(stylize(&base, request.labels()))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_caption_from_list() {
        let reply = json!([{"generated_text": "a dog on a beach"}]);
        assert_eq!(base_caption(&reply), "a dog on a beach");
    }

    #[test]
    fn test_base_caption_from_object() {
        assert_eq!(base_caption(&json!({"caption": "a boat"})), "a boat");
        assert_eq!(base_caption(&json!({"generated_text": "a car"})), "a car");
    }

    #[test]
    fn test_base_caption_from_other_json() {
        assert_eq!(base_caption(&json!("plain text")), "plain text");
        assert_eq!(base_caption(&json!([])), "[]");
    }

    #[test]
    fn test_stylize_with_labels() {
        let labels = vec!["Dog".to_string(), "Beach".to_string()];
        let pair = stylize("a dog running on the sand near the water at sunset today", &labels);
        assert_eq!(pair.concise, "a dog running on the sand near the water at");
        assert_eq!(
            pair.creative,
            "a dog running on the sand near the water at sunset today. The scene includes Dog, Beach."
        );
    }

    #[test]
    fn test_empty_base_is_incomplete() {
        assert!(!stylize("", &[]).is_complete());
    }

    #[test]
    fn test_default_timeout_is_thirty_seconds() {
        let provider = HuggingFaceProvider::new(&HuggingFaceConfig::default());
        assert_eq!(provider.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_availability_follows_api_key() {
        let provider = HuggingFaceProvider::new(&HuggingFaceConfig {
            api_key: "hf_token".to_string(),
            ..Default::default()
        });
        assert!(provider.is_available());

        let provider = HuggingFaceProvider::new(&HuggingFaceConfig {
            api_key: String::new(),
            ..Default::default()
        });
        assert!(!provider.is_available());
    }
}
