//! The `Captionist` service: wires validation, rate limiting, normalization,
//! storage, and caption generation into per-user operations.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::auth::UserAuth;
use crate::config::{resolve_env_var, Config};
use crate::error::{CaptionistError, ConfigError, Result};
use crate::pipeline::validate::content_type;
use crate::pipeline::{content_hash, ImageNormalizer, Validator};
use crate::provider::{CaptionOrchestrator, CaptionRequest};
use crate::ratelimit::RateLimiter;
use crate::storage::object::key_owner;
use crate::storage::{
    FileMetadataStore, ImageUpload, LocalObjectStore, MetadataStore, ObjectStore,
};
use crate::types::{
    CaptionRecord, DeletionSummary, HistoryPage, ProviderStatus, StoredImage, UsageStats,
    UserSession,
};

const CAPTIONS_FILE: &str = "captions.json";
const AUTH_FILE: &str = "auth.json";
const OBJECTS_DIR: &str = "objects";

/// Main entry point for captioning and per-user data management.
pub struct Captionist {
    config: Config,
    validator: Validator,
    normalizer: ImageNormalizer,
    rate_limiter: RateLimiter,
    orchestrator: CaptionOrchestrator,
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    auth: UserAuth,
}

impl Captionist {
    /// Open the local stores under the configured data directory and build
    /// the provider chain from config.
    pub async fn open(config: Config) -> Result<Self> {
        let data_dir = config.data_dir();
        tracing::debug!("Opening Captionist v{} at {:?}", crate::VERSION, data_dir);

        let signing_key = resolve_env_var(&config.storage.signing_key);
        let objects = LocalObjectStore::open(
            data_dir.join(OBJECTS_DIR),
            &config.storage.bucket,
            signing_key.as_deref(),
        )
        .await?;
        let metadata = FileMetadataStore::open(data_dir.join(CAPTIONS_FILE)).await?;
        let auth = UserAuth::open(data_dir.join(AUTH_FILE), &config.auth).await?;
        let orchestrator = CaptionOrchestrator::from_config(&config);

        Ok(Self::with_parts(
            config,
            orchestrator,
            Arc::new(objects),
            Arc::new(metadata),
            auth,
        ))
    }

    /// Assemble a service from explicit collaborators.
    pub fn with_parts(
        config: Config,
        orchestrator: CaptionOrchestrator,
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        auth: UserAuth,
    ) -> Self {
        Self {
            validator: Validator::new(config.limits.clone()),
            normalizer: ImageNormalizer::new(config.limits.clone(), config.thumbnail.clone()),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            orchestrator,
            objects,
            metadata,
            auth,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &UserAuth {
        &self.auth
    }

    /// Resolve a session id to a live session.
    pub async fn authenticate(&self, session_id: &str) -> Result<UserSession> {
        Ok(self.auth.require_session(session_id).await?)
    }

    /// Caption one upload and persist the image and the result.
    ///
    /// Invalid uploads are rejected before a rate-limit token is spent.
    /// If every provider fails, the stored objects are removed again.
    pub async fn caption_image(
        &self,
        user_id: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<CaptionRecord> {
        let format = self.validator.validate(&bytes)?;
        self.rate_limiter.check(user_id)?;

        let start = std::time::Instant::now();
        let hash = content_hash(&bytes);
        let prepared = self.normalizer.prepare(bytes.clone(), format).await?;
        tracing::trace!("  Prepare: {:?}", start.elapsed());

        let stored = self
            .objects
            .upload(ImageUpload {
                user_id,
                original: &prepared.sanitized_original,
                thumbnail: &prepared.thumbnail,
                filename,
                content_type: content_type(format),
                file_size: bytes.len() as u64,
            })
            .await?;

        let request = CaptionRequest::new(prepared.normalized).with_raw_bytes(bytes);
        let outcome = match self.orchestrator.generate(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.discard(&stored).await;
                return Err(e.into());
            }
        };

        let record = CaptionRecord::new(user_id, stored.clone(), outcome, hash, Utc::now());
        if let Err(e) = self.metadata.save(record.clone()).await {
            self.discard(&stored).await;
            return Err(e.into());
        }

        tracing::info!(
            user_id,
            image_id = %record.image_id,
            provider = %record.provider,
            "Captioned {} in {:?}",
            filename,
            start.elapsed()
        );
        Ok(record)
    }

    /// Read a file from disk and caption it.
    pub async fn caption_file(&self, user_id: &str, path: &Path) -> Result<CaptionRecord> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.jpg");
        self.caption_image(user_id, bytes, filename).await
    }

    async fn discard(&self, stored: &StoredImage) {
        for url in [&stored.storage_url, &stored.thumbnail_url] {
            if let Err(e) = self.objects.delete(url).await {
                tracing::warn!("Failed to remove {url} after failed caption: {e}");
            }
        }
    }

    pub async fn history(
        &self,
        user_id: &str,
        limit: usize,
        page_token: Option<&str>,
    ) -> Result<HistoryPage> {
        Ok(self
            .metadata
            .query_history(user_id, limit, page_token)
            .await?)
    }

    /// Fetch one record, refusing records owned by another user.
    pub async fn get_caption(&self, user_id: &str, image_id: &str) -> Result<CaptionRecord> {
        let record = self
            .metadata
            .get(image_id)
            .await?
            .ok_or_else(|| CaptionistError::NotFound(format!("caption {image_id}")))?;
        if record.user_id != user_id {
            return Err(CaptionistError::AccessDenied {
                user_id: user_id.to_string(),
                resource: image_id.to_string(),
            });
        }
        Ok(record)
    }

    /// Time-limited URL for one of the user's own objects.
    pub fn access_url(&self, user_id: &str, storage_url: &str) -> Result<String> {
        if key_owner(storage_url) != Some(user_id) {
            return Err(CaptionistError::AccessDenied {
                user_id: user_id.to_string(),
                resource: storage_url.to_string(),
            });
        }
        Ok(self
            .objects
            .access_url(storage_url, self.config.storage.url_expiry_secs)?)
    }

    /// Remove every object and record belonging to the user and reset their quota.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<DeletionSummary> {
        let objects_deleted = self.objects.delete_all(user_id).await?;
        let records_deleted = self.metadata.delete_all(user_id).await?;
        self.rate_limiter.reset(user_id);

        tracing::info!(user_id, objects_deleted, records_deleted, "Deleted user data");
        Ok(DeletionSummary {
            objects_deleted,
            records_deleted,
        })
    }

    /// Delete records older than the retention window, with their objects.
    pub async fn purge_expired(&self) -> Result<DeletionSummary> {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<DeletionSummary> {
        let retention_days = self.config.storage.retention_days;
        let cutoff = now
            .checked_sub_signed(Duration::days(i64::from(retention_days)))
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "storage.retention_days of {retention_days} reaches before the earliest date"
                ))
            })?;
        let expired = self.metadata.purge_before(cutoff).await?;

        let mut objects_deleted = 0;
        for record in &expired {
            for url in [&record.storage_url, &record.thumbnail_url] {
                match self.objects.delete(url).await {
                    Ok(true) => objects_deleted += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Failed to purge {url}: {e}"),
                }
            }
        }

        tracing::info!(
            records = expired.len(),
            objects_deleted,
            "Purged records older than {}",
            cutoff
        );
        Ok(DeletionSummary {
            objects_deleted,
            records_deleted: expired.len(),
        })
    }

    pub async fn usage_stats(&self) -> Result<UsageStats> {
        Ok(self.metadata.stats().await?)
    }

    /// Providers in fallback order with their availability.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.orchestrator.status()
    }

    /// Whole caption requests the user may make right now.
    pub fn remaining_quota(&self, user_id: &str) -> u32 {
        self.rate_limiter.remaining(user_id)
    }

    pub fn quota_capacity(&self) -> u32 {
        self.rate_limiter.bucket_size()
    }
}
