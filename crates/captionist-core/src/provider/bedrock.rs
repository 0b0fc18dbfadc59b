//! Remote hosted-model provider using the Bedrock runtime invoke API.
//!
//! Claude models get a Messages body with a base64 image block; any other
//! model gets a plain completion body. Either reply goes through the shared
//! `CONCISE:` / `CREATIVE:` parser.

use super::prompt::parse_response;
use super::provider::{resolve_secret, send_json, CaptionProvider, CaptionRequest, ImageInput};
use crate::config::BedrockConfig;
use crate::error::{CaptionError, CaptionResult};
use crate::types::{CaptionPair, CaptionProviderKind};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const MAX_TOKENS: u32 = 300;
const GENERIC_TEMPERATURE: f32 = 0.7;

/// Bedrock runtime provider authenticated with a bearer API key.
pub struct BedrockProvider {
    base_url: String,
    model_id: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl BedrockProvider {
    pub fn new(config: &BedrockConfig) -> Self {
        Self {
            base_url: config.base_url(),
            model_id: config.model_id.clone(),
            api_key: resolve_secret(&config.api_key),
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    fn invoke_url(&self) -> String {
        format!("{}/model/{}/invoke", self.base_url, self.model_id)
    }
}

fn is_claude(model_id: &str) -> bool {
    model_id.to_lowercase().contains("claude")
}

// --- Request types ---

#[derive(Serialize)]
#[serde(untagged)]
enum InvokeBody {
    Messages(MessagesBody),
    Completion(CompletionBody),
}

#[derive(Serialize)]
struct MessagesBody {
    anthropic_version: &'static str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Serialize)]
struct CompletionBody {
    prompt: String,
    max_tokens: u32,
    temperature: f32,
}

fn build_body(model_id: &str, request: &CaptionRequest) -> InvokeBody {
    let prompt = request.prompt();
    if is_claude(model_id) {
        let image = ImageInput::jpeg(request.jpeg());
        InvokeBody::Messages(MessagesBody {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: image.media_type,
                            data: image.data,
                        },
                    },
                    ContentBlock::Text { text: prompt },
                ],
            }],
        })
    } else {
        InvokeBody::Completion(CompletionBody {
            prompt,
            max_tokens: MAX_TOKENS,
            temperature: GENERIC_TEMPERATURE,
        })
    }
}

// --- Reply extraction ---

/// Pull the model's text out of an invoke reply.
///
/// Claude replies must carry `content[0].text`. Other models use
/// `completion`, then `generated_text`, else an empty string.
fn extract_reply_text(model_id: &str, reply: &serde_json::Value) -> CaptionResult<String> {
    if is_claude(model_id) {
        reply
            .pointer("/content/0/text")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| {
                CaptionError::call_failed(
                    CaptionProviderKind::RemoteHostedModel,
                    "reply has no content[0].text",
                )
            })
    } else {
        Ok(
            super::provider::first_string_field(reply, &["completion", "generated_text"])
                .unwrap_or_default(),
        )
    }
}

#[async_trait]
impl CaptionProvider for BedrockProvider {
    fn kind(&self) -> CaptionProviderKind {
        CaptionProviderKind::RemoteHostedModel
    }

    fn is_available(&self) -> bool {
        !self.model_id.is_empty() && self.api_key.is_some()
    }

    async fn generate_caption(&self, request: &CaptionRequest) -> CaptionResult<CaptionPair> {
        let Some(api_key) = self.api_key.as_deref().filter(|_| !self.model_id.is_empty()) else {
            return Err(CaptionError::ProviderUnavailable {
                provider: self.kind(),
            });
        };

        let body = build_body(&self.model_id, request);
        tracing::debug!(model = %self.model_id, "Invoking Bedrock model");

        let reply = send_json(
            self.kind(),
            self.client
                .post(self.invoke_url())
                .bearer_auth(api_key)
                .header("accept", "application/json")
                .timeout(self.timeout)
                .json(&body),
        )
        .await?;

        let text = extract_reply_text(&self.model_id, &reply)?;
        Ok(parse_response(&text))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::normalize;
    use image::DynamicImage;
    use serde_json::json;

    fn request(labels: &[&str]) -> CaptionRequest {
        let normalized = normalize(DynamicImage::new_rgb8(4, 4), 2048).unwrap();
        CaptionRequest::new(normalized).with_labels(labels.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_claude_body_shape() {
        let body = serde_json::to_value(build_body(
            "anthropic.claude-3-sonnet-20240229-v1:0",
            &request(&["Dog"]),
        ))
        .unwrap();

        assert_eq!(body["anthropic_version"], "bedrock-2023-05-31");
        assert_eq!(body["max_tokens"], 300);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert!(content[0]["source"]["data"].as_str().unwrap().starts_with("/9j/"));
        assert_eq!(content[1]["type"], "text");
        assert!(content[1]["text"]
            .as_str()
            .unwrap()
            .contains("Detected objects/scenes: Dog"));
    }

    #[test]
    fn test_generic_body_shape() {
        let body = serde_json::to_value(build_body("amazon.titan-text", &request(&[]))).unwrap();
        assert!(body["prompt"].as_str().unwrap().starts_with("Generate two image captions"));
        assert_eq!(body["max_tokens"], 300);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!(body.get("messages").is_none());
    }

    #[test]
    fn test_claude_detection_is_case_insensitive() {
        assert!(is_claude("anthropic.CLAUDE-v2"));
        assert!(!is_claude("meta.llama3"));
    }

    #[test]
    fn test_extract_claude_reply() {
        let reply = json!({"content": [{"type": "text", "text": "CONCISE: a\nCREATIVE: b"}]});
        let text = extract_reply_text("claude", &reply).unwrap();
        assert_eq!(parse_response(&text), CaptionPair::new("a", "b"));
    }

    #[test]
    fn test_extract_claude_reply_missing_content() {
        let err = extract_reply_text("claude", &json!({"content": []})).unwrap_err();
        assert!(matches!(err, CaptionError::ProviderCallFailed { .. }));
    }

    #[test]
    fn test_extract_generic_reply_fallbacks() {
        assert_eq!(
            extract_reply_text("titan", &json!({"completion": "c", "generated_text": "g"})).unwrap(),
            "c"
        );
        assert_eq!(
            extract_reply_text("titan", &json!({"generated_text": "g"})).unwrap(),
            "g"
        );
        assert_eq!(extract_reply_text("titan", &json!({})).unwrap(), "");
    }

    #[test]
    fn test_availability_requires_key_and_model() {
        let mut config = BedrockConfig {
            api_key: "secret".to_string(),
            ..Default::default()
        };
        assert!(BedrockProvider::new(&config).is_available());

        config.model_id.clear();
        assert!(!BedrockProvider::new(&config).is_available());

        let config = BedrockConfig {
            api_key: String::new(),
            ..Default::default()
        };
        assert!(!BedrockProvider::new(&config).is_available());
    }

    #[test]
    fn test_invoke_url_uses_endpoint_override() {
        let config = BedrockConfig {
            endpoint: "http://localhost:4566/".to_string(),
            model_id: "m1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            BedrockProvider::new(&config).invoke_url(),
            "http://localhost:4566/model/m1/invoke"
        );
    }

    #[tokio::test]
    async fn test_generate_without_key_is_unavailable() {
        let config = BedrockConfig {
            api_key: String::new(),
            ..Default::default()
        };
        let err = BedrockProvider::new(&config)
            .generate_caption(&request(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptionError::ProviderUnavailable { .. }));
    }
}
