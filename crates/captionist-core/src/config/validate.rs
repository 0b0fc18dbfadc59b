//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Upper bound for day counts (about a century).
const MAX_DAYS: u32 = 36_500;

/// Largest upload limit, in MB, whose byte count still fits in a `u64`.
const MAX_IMAGE_SIZE_MB: u64 = u64::MAX / (1024 * 1024);

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.bucket_size == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.bucket_size must be > 0".into(),
            ));
        }
        if !self.rate_limit.refill_rate.is_finite() || self.rate_limit.refill_rate < 0.0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.refill_rate must be a finite number >= 0".into(),
            ));
        }
        if self.limits.max_image_size_mb == 0 || self.limits.max_image_size_mb > MAX_IMAGE_SIZE_MB {
            return Err(ConfigError::ValidationError(format!(
                "limits.max_image_size_mb must be between 1 and {MAX_IMAGE_SIZE_MB}"
            )));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.thumbnail.size == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.size must be > 0".into(),
            ));
        }
        if self.thumbnail.quality == 0 || self.thumbnail.quality > 100 {
            return Err(ConfigError::ValidationError(
                "thumbnail.quality must be between 1 and 100".into(),
            ));
        }
        if self.storage.url_expiry_secs == 0 {
            return Err(ConfigError::ValidationError(
                "storage.url_expiry_secs must be > 0".into(),
            ));
        }
        if self.storage.bucket.is_empty() || self.storage.bucket.contains('/') {
            return Err(ConfigError::ValidationError(
                "storage.bucket must be a non-empty name without '/'".into(),
            ));
        }
        if self.storage.retention_days > MAX_DAYS {
            return Err(ConfigError::ValidationError(format!(
                "storage.retention_days must be <= {MAX_DAYS}"
            )));
        }
        if self.auth.session_days == 0 || self.auth.session_days > MAX_DAYS {
            return Err(ConfigError::ValidationError(format!(
                "auth.session_days must be between 1 and {MAX_DAYS}"
            )));
        }
        if !(0.0..=100.0).contains(&self.labels.min_confidence) {
            return Err(ConfigError::ValidationError(
                "labels.min_confidence must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }
}
