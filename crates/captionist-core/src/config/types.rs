//! Sub-configuration structs with their defaults.

use crate::types::CaptionProviderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding stored images, caption records, and auth data
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.captionist/data"),
        }
    }
}

/// Caption provider selection and per-provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider tried first; the rest follow in the default order
    pub primary: CaptionProviderKind,

    /// Bedrock (remote hosted model) settings
    pub bedrock: BedrockConfig,

    /// Managed inference endpoint settings
    pub sagemaker: SageMakerConfig,

    /// Hugging Face inference API settings
    pub huggingface: HuggingFaceConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            primary: CaptionProviderKind::RemoteHostedModel,
            bedrock: BedrockConfig::default(),
            sagemaker: SageMakerConfig::default(),
            huggingface: HuggingFaceConfig::default(),
        }
    }
}

/// Bedrock runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BedrockConfig {
    /// AWS region used to build the runtime endpoint
    pub region: String,

    /// Model identifier, e.g. "anthropic.claude-3-sonnet-20240229-v1:0"
    pub model_id: String,

    /// Bedrock API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Endpoint override; empty means `https://bedrock-runtime.{region}.amazonaws.com`
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            model_id: "anthropic.claude-3-sonnet-20240229-v1:0".to_string(),
            api_key: "${AWS_BEARER_TOKEN_BEDROCK}".to_string(),
            endpoint: String::new(),
            timeout_secs: 60,
        }
    }
}

impl BedrockConfig {
    /// Runtime base URL, honoring the endpoint override.
    pub fn base_url(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://bedrock-runtime.{}.amazonaws.com", self.region)
        } else {
            self.endpoint.trim_end_matches('/').to_string()
        }
    }
}

/// Managed inference endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SageMakerConfig {
    /// Full invocation URL (supports ${ENV_VAR} syntax)
    pub endpoint_url: String,

    /// Optional bearer key for gateways in front of the endpoint
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SageMakerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "${SAGEMAKER_ENDPOINT}".to_string(),
            api_key: "${SAGEMAKER_API_KEY}".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Hugging Face inference API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    /// API token (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model inference URL
    pub model_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            api_key: "${HF_API_KEY}".to_string(),
            model_url:
                "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-large"
                    .to_string(),
            timeout_secs: 30,
        }
    }
}

/// Label detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    /// Whether to run label detection before captioning
    pub enabled: bool,

    /// Rekognition-compatible detect-labels endpoint (supports ${ENV_VAR} syntax)
    pub endpoint: String,

    /// Optional bearer key for the detector
    pub api_key: String,

    /// Maximum labels kept per image
    pub max_labels: usize,

    /// Minimum detector confidence (0-100)
    pub min_confidence: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "${LABEL_DETECTOR_ENDPOINT}".to_string(),
            api_key: "${LABEL_DETECTOR_API_KEY}".to_string(),
            max_labels: 10,
            min_confidence: 70.0,
            timeout_secs: 10,
        }
    }
}

/// Token bucket settings for per-user caption requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum tokens per user, also the initial fill
    pub bucket_size: u32,

    /// Tokens added per second
    pub refill_rate: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            bucket_size: 60,
            refill_rate: 1.0,
        }
    }
}

/// Resource limits applied to uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum upload size in megabytes
    pub max_image_size_mb: u64,

    /// Longest edge after normalization, in pixels
    pub max_image_dimension: u32,

    /// Decode + re-encode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_size_mb: 10,
            max_image_dimension: 2048,
            decode_timeout_ms: 5000,
        }
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Thumbnail size in pixels (longest edge)
    pub size: u32,

    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: 300,
            quality: 85,
        }
    }
}

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket name used in storage URLs
    pub bucket: String,

    /// Lifetime of generated access URLs, in seconds
    pub url_expiry_secs: u64,

    /// Caption records older than this are purged
    pub retention_days: u32,

    /// Key used to sign access URLs (supports ${ENV_VAR} syntax)
    pub signing_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "captionist".to_string(),
            url_expiry_secs: 3600,
            retention_days: 90,
            signing_key: "${CAPTIONIST_SIGNING_KEY}".to_string(),
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in days
    pub session_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { session_days: 7 }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
