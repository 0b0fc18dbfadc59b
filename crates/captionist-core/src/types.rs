//! Core data types shared across the captioning flow.
//!
//! These are the values that cross module boundaries: provider tags, caption
//! results, stored-image handles, persisted caption records, and sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Soft cap for the concise caption, in characters.
pub const CONCISE_MAX_CHARS: usize = 80;

/// Soft cap for the creative caption, in characters.
pub const CREATIVE_MAX_CHARS: usize = 200;

/// Which captioning backend produced (or should produce) a caption.
///
/// Ordering among kinds is a configuration concern; [`CaptionProviderKind::DEFAULT_ORDER`]
/// is only the tail of the fallback chain after the configured primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaptionProviderKind {
    /// Hosted foundation model endpoint (Amazon Bedrock)
    #[serde(rename = "bedrock")]
    RemoteHostedModel,
    /// Managed inference endpoint (SageMaker-style invocation URL)
    #[serde(rename = "sagemaker")]
    ManagedInference,
    /// Public inference API (Hugging Face BLIP)
    #[serde(rename = "hf", alias = "huggingface")]
    PublicInferenceApi,
}

impl CaptionProviderKind {
    /// Fixed fallback order appended after the configured primary provider.
    pub const DEFAULT_ORDER: [CaptionProviderKind; 3] = [
        CaptionProviderKind::RemoteHostedModel,
        CaptionProviderKind::ManagedInference,
        CaptionProviderKind::PublicInferenceApi,
    ];

    /// Configuration name of this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteHostedModel => "bedrock",
            Self::ManagedInference => "sagemaker",
            Self::PublicInferenceApi => "hf",
        }
    }
}

impl fmt::Display for CaptionProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bedrock" => Ok(Self::RemoteHostedModel),
            "sagemaker" => Ok(Self::ManagedInference),
            "hf" | "huggingface" => Ok(Self::PublicInferenceApi),
            other => Err(format!(
                "Unknown caption provider '{other}' (expected bedrock, sagemaker, or hf)"
            )),
        }
    }
}

/// A concise caption and a creative, social-media style caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionPair {
    pub concise: String,
    pub creative: String,
}

impl CaptionPair {
    pub fn new(concise: impl Into<String>, creative: impl Into<String>) -> Self {
        Self {
            concise: concise.into(),
            creative: creative.into(),
        }
    }

    /// Both captions contain non-whitespace text.
    pub fn is_complete(&self) -> bool {
        !self.concise.trim().is_empty() && !self.creative.trim().is_empty()
    }
}

/// Successful result of the caption orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionOutcome {
    pub pair: CaptionPair,
    /// Labels used to build the prompt (possibly empty)
    pub labels: Vec<String>,
    pub provider_used: CaptionProviderKind,
}

/// Handle to an image persisted in the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImage {
    pub image_id: String,
    pub storage_url: String,
    pub thumbnail_url: String,
    pub original_filename: String,
    pub file_size: u64,
    pub content_type: String,
}

/// A caption persisted in the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRecord {
    pub image_id: String,
    pub user_id: String,
    pub concise_caption: String,
    pub creative_caption: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub provider: CaptionProviderKind,
    pub timestamp: DateTime<Utc>,
    pub storage_url: String,
    pub thumbnail_url: String,
    pub original_filename: String,
    pub file_size: u64,
    pub content_type: String,
    /// BLAKE3 hash of the uploaded bytes
    pub content_hash: String,
}

impl CaptionRecord {
    /// Combine an upload handle and orchestrator outcome into a record.
    pub fn new(
        user_id: &str,
        stored: StoredImage,
        outcome: CaptionOutcome,
        content_hash: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            image_id: stored.image_id,
            user_id: user_id.to_string(),
            concise_caption: outcome.pair.concise,
            creative_caption: outcome.pair.creative,
            labels: outcome.labels,
            provider: outcome.provider_used,
            timestamp,
            storage_url: stored.storage_url,
            thumbnail_url: stored.thumbnail_url,
            original_filename: stored.original_filename,
            file_size: stored.file_size,
            content_type: stored.content_type,
            content_hash,
        }
    }
}

/// One page of a user's caption history, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<CaptionRecord>,
    /// Opaque token for the next page, `None` on the last page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Aggregate counts across the metadata store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_captions: usize,
    pub total_users: usize,
}

/// Counts returned by a per-user data deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSummary {
    pub objects_deleted: usize,
    pub records_deleted: usize,
}

/// An authenticated sign-in session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Public view of a registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub role: String,
}

/// Position and availability of one provider in the fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub kind: CaptionProviderKind,
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(
            "bedrock".parse::<CaptionProviderKind>().unwrap(),
            CaptionProviderKind::RemoteHostedModel
        );
        assert_eq!(
            "SageMaker".parse::<CaptionProviderKind>().unwrap(),
            CaptionProviderKind::ManagedInference
        );
        assert_eq!(
            "huggingface".parse::<CaptionProviderKind>().unwrap(),
            CaptionProviderKind::PublicInferenceApi
        );
        assert!("openai".parse::<CaptionProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serde_names() {
        let json = serde_json::to_string(&CaptionProviderKind::PublicInferenceApi).unwrap();
        assert_eq!(json, "\"hf\"");
        let kind: CaptionProviderKind = serde_json::from_str("\"huggingface\"").unwrap();
        assert_eq!(kind, CaptionProviderKind::PublicInferenceApi);
    }

    #[test]
    fn test_caption_pair_completeness() {
        assert!(CaptionPair::new("A dog", "A dog runs.").is_complete());
        assert!(!CaptionPair::new("", "A dog runs.").is_complete());
        assert!(!CaptionPair::new("A dog", "   ").is_complete());
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = UserSession {
            session_id: "s".into(),
            user_id: "u".into(),
            email: "a@b.co".into(),
            full_name: "A".into(),
            created_at: now,
            expires_at: now + chrono::Duration::days(7),
        };
        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + chrono::Duration::days(8)));
    }
}
