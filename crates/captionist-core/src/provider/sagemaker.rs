//! Managed inference provider for a hosted captioning endpoint.
//!
//! The endpoint receives the canonical JPEG as a hex string and may answer
//! with a list of captions, an object, or free text.

use super::prompt::{parse_response, truncate_chars};
use super::provider::{
    first_string_field, resolve_secret, send_json, value_text, CaptionProvider, CaptionRequest,
};
use crate::config::SageMakerConfig;
use crate::error::{CaptionError, CaptionResult};
use crate::types::{CaptionPair, CaptionProviderKind, CONCISE_MAX_CHARS, CREATIVE_MAX_CHARS};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;

const MAX_LENGTH: u32 = 150;
const NUM_RETURN_SEQUENCES: u32 = 2;

/// Provider for a managed inference endpoint reachable over HTTPS.
pub struct SageMakerProvider {
    endpoint_url: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl SageMakerProvider {
    pub fn new(config: &SageMakerConfig) -> Self {
        Self {
            endpoint_url: resolve_secret(&config.endpoint_url),
            api_key: resolve_secret(&config.api_key),
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct InvocationPayload {
    image: String,
    prompt: String,
    max_length: u32,
    num_return_sequences: u32,
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn build_payload(request: &CaptionRequest) -> InvocationPayload {
    InvocationPayload {
        image: to_hex(request.jpeg()),
        prompt: request.prompt(),
        max_length: MAX_LENGTH,
        num_return_sequences: NUM_RETURN_SEQUENCES,
    }
}

/// Turn an endpoint reply into a caption pair.
///
/// A list of two or more sequences maps directly onto concise and creative;
/// objects and anything else go through the text parser.
fn interpret_reply(reply: &serde_json::Value) -> CaptionPair {
    match reply {
        serde_json::Value::Array(items) if items.len() >= 2 => CaptionPair {
            concise: truncate_chars(&sequence_text(&items[0]), CONCISE_MAX_CHARS),
            creative: truncate_chars(&sequence_text(&items[1]), CREATIVE_MAX_CHARS),
        },
        serde_json::Value::Object(_) => {
            let text = first_string_field(reply, &["generated_text", "caption"]).unwrap_or_default();
            parse_response(&text)
        }
        other => parse_response(&value_text(other)),
    }
}

/// Sequences are plain strings or `{generated_text}` objects.
fn sequence_text(item: &serde_json::Value) -> String {
    first_string_field(item, &["generated_text"]).unwrap_or_else(|| value_text(item))
}

#[async_trait]
impl CaptionProvider for SageMakerProvider {
    fn kind(&self) -> CaptionProviderKind {
        CaptionProviderKind::ManagedInference
    }

    fn is_available(&self) -> bool {
        self.endpoint_url.is_some()
    }

    async fn generate_caption(&self, request: &CaptionRequest) -> CaptionResult<CaptionPair> {
        let Some(endpoint) = self.endpoint_url.as_deref() else {
            return Err(CaptionError::ProviderUnavailable {
                provider: self.kind(),
            });
        };

        let mut builder = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .json(&build_payload(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(endpoint, "Invoking managed inference endpoint");
        let reply = send_json(self.kind(), builder).await?;
        Ok(interpret_reply(&reply))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
