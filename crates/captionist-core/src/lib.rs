//! Captionist Core - image captioning with provider fallback and per-user quotas.
//!
//! An upload is validated, charged against the user's token bucket,
//! normalized to JPEG, stored with a thumbnail, and captioned by the first
//! caption provider in priority order that succeeds. Each result carries a
//! concise caption, a creative caption, and the provider that produced them.
//!
//! # Architecture
//!
//! ```text
//! bytes → Validate → Rate limit → Normalize + Thumbnail → Object store
//!       → Label detector (optional) → Provider fallback → Metadata store
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use captionist_core::{Captionist, Config};
//!
//! #[tokio::main]
//! async fn main() -> captionist_core::Result<()> {
//!     let service = Captionist::open(Config::load()?).await?;
//!     let session = service.auth().signin("ada@example.com", "Secret123").await?;
//!
//!     let bytes = std::fs::read("./cat.jpg")?;
//!     let record = service.caption_image(&session.user_id, bytes, "cat.jpg").await?;
//!     println!("{} ({})", record.concise_caption, record.provider);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod provider;
pub mod ratelimit;
pub mod service;
pub mod storage;
pub mod types;

pub use auth::UserAuth;
pub use config::Config;
pub use error::{
    AuthError, CaptionError, CaptionResult, CaptionistError, ConfigError, ImageError, Result,
    StorageError,
};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{discover, DiscoveredFile};
pub use provider::{CaptionOrchestrator, CaptionProvider, CaptionRequest};
pub use ratelimit::RateLimiter;
pub use service::Captionist;
pub use types::{
    CaptionOutcome, CaptionPair, CaptionProviderKind, CaptionRecord, DeletionSummary,
    HistoryPage, ProviderStatus, UsageStats, UserProfile, UserSession,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_open_with_defaults_under_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.data_dir = dir.path().to_path_buf();
        config.storage.signing_key = "fixed-test-key".to_string();

        let service = Captionist::open(config).await.unwrap();
        assert_eq!(service.quota_capacity(), 60);
        assert_eq!(service.provider_status().len(), 3);
        assert_eq!(service.usage_stats().await.unwrap().total_captions, 0);
    }
}
