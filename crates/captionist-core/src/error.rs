//! Error types for the Captionist service.
//!
//! Provider failures are modelled as values so the fallback loop can branch
//! on the kind of failure (skip vs. record-and-continue) instead of catching
//! everything. Each collaborator (images, storage, auth, config) has its own
//! enum, and [`CaptionistError`] wraps them for the service facade.

use crate::types::CaptionProviderKind;
use thiserror::Error;

/// Top-level error type for Captionist operations.
#[derive(Error, Debug)]
pub enum CaptionistError {
    /// The user has no tokens left in their rate-limit bucket
    #[error("Rate limit exceeded for user {user_id}, try again shortly")]
    RateLimited { user_id: String },

    /// A user tried to touch a resource that belongs to someone else
    #[error("Access denied: {user_id} does not own {resource}")]
    AccessDenied { user_id: String, resource: String },

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caption generation failed
    #[error("Caption error: {0}")]
    Caption(#[from] CaptionError),

    /// The uploaded image was rejected or could not be processed
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Object or metadata store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Authentication failure
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Caption provider and orchestration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptionError {
    /// Provider is missing credentials or configuration. Skipped, never recorded.
    #[error("{provider} is not configured")]
    ProviderUnavailable { provider: CaptionProviderKind },

    /// A single provider attempt failed
    #[error("{provider} call failed: {message}")]
    ProviderCallFailed {
        provider: CaptionProviderKind,
        message: String,
        status_code: Option<u16>,
    },

    /// Every configured provider was skipped or failed
    #[error("All caption providers failed. Last error: {}", describe_last(.last_error))]
    AllProvidersExhausted {
        last_error: Option<Box<CaptionError>>,
    },
}

impl CaptionError {
    /// Shorthand for a failed call without an HTTP status.
    pub fn call_failed(provider: CaptionProviderKind, message: impl Into<String>) -> Self {
        Self::ProviderCallFailed {
            provider,
            message: message.into(),
            status_code: None,
        }
    }
}

fn describe_last(last_error: &Option<Box<CaptionError>>) -> String {
    match last_error {
        Some(err) => err.to_string(),
        None => "no provider was available".to_string(),
    }
}

/// Image validation and normalization errors.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image payload is empty")]
    Empty,

    /// Payload exceeds the configured size limit
    #[error("Image too large: {size_bytes} bytes > {max_mb}MB")]
    TooLarge { size_bytes: u64, max_mb: u64 },

    /// Only JPEG and PNG are accepted
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Image decoding timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Object and metadata store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Stored data could not be parsed
    #[error("Corrupt store file {path}: {message}")]
    Corrupt { path: String, message: String },

    /// Storage URL does not belong to this store or is malformed
    #[error("Invalid storage URL: {0}")]
    InvalidUrl(String),

    /// User id cannot be used as a storage key
    #[error("Invalid user id for storage: {0}")]
    InvalidUserId(String),

    #[error("Invalid page token")]
    InvalidPageToken,

    #[error("Access URL has expired")]
    AccessUrlExpired,

    #[error("Access URL signature does not match")]
    AccessUrlSignature,
}

/// Authentication errors.
#[derive(Error, Debug, PartialEq)]
pub enum AuthError {
    #[error("Invalid email format")]
    InvalidEmail,

    /// Password fails the strength policy
    #[error("{0}")]
    WeakPassword(String),

    #[error("Email already registered")]
    EmailTaken,

    /// Unknown email or wrong password (deliberately indistinguishable)
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    Inactive,

    /// Session id unknown, logged out, or expired
    #[error("Session is invalid or has expired")]
    InvalidSession,

    /// Sign-in time plus `auth.session_days` falls outside the calendar
    #[error("Session lifetime of {days} days is out of range")]
    SessionLifetime { days: i64 },

    #[error("Auth store failure: {0}")]
    Store(String),
}

/// Label detector failures. Never fatal to captioning.
#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Label detector request failed: {0}")]
    Request(String),

    #[error("Label detector HTTP {status}")]
    Status { status: u16 },

    #[error("Unexpected label detector reply: {0}")]
    InvalidReply(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Convenience type alias for Captionist results.
pub type Result<T> = std::result::Result<T, CaptionistError>;

/// Convenience type alias for caption-provider results.
pub type CaptionResult<T> = std::result::Result<T, CaptionError>;
