//! Environment-variable overrides layered on top of the TOML file.

use crate::error::ConfigError;
use crate::types::CaptionProviderKind;
use std::path::PathBuf;
use std::str::FromStr;

use super::Config;

impl Config {
    /// Apply environment-style overrides using the given lookup.
    ///
    /// The lookup is injected so tests don't have to mutate the process
    /// environment. Unset variables leave the current value untouched.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CAPTION_PROVIDER") {
            self.provider.primary =
                CaptionProviderKind::from_str(&v).map_err(ConfigError::ValidationError)?;
        }
        if let Some(v) = get("AWS_REGION") {
            self.provider.bedrock.region = v;
        }
        if let Some(v) = get("BEDROCK_MODEL_ID") {
            self.provider.bedrock.model_id = v;
        }
        if let Some(v) = get("SAGEMAKER_ENDPOINT") {
            self.provider.sagemaker.endpoint_url = v;
        }
        if let Some(v) = get("HF_API_KEY") {
            self.provider.huggingface.api_key = v;
        }
        if let Some(v) = get("USE_LABEL_DETECTION") {
            self.labels.enabled = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = get("MAX_IMAGE_SIZE_MB") {
            self.limits.max_image_size_mb = parse_var("MAX_IMAGE_SIZE_MB", &v)?;
        }
        if let Some(v) = get("THUMBNAIL_SIZE") {
            self.thumbnail.size = parse_var("THUMBNAIL_SIZE", &v)?;
        }
        if let Some(v) = get("PRESIGNED_URL_EXPIRY") {
            self.storage.url_expiry_secs = parse_var("PRESIGNED_URL_EXPIRY", &v)?;
        }
        if let Some(v) = get("RETENTION_DAYS") {
            self.storage.retention_days = parse_var("RETENTION_DAYS", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_BUCKET_SIZE") {
            self.rate_limit.bucket_size = parse_var("RATE_LIMIT_BUCKET_SIZE", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_REFILL_RATE") {
            self.rate_limit.refill_rate = parse_var("RATE_LIMIT_REFILL_RATE", &v)?;
        }
        if let Some(v) = get("CAPTIONIST_DATA_DIR") {
            self.general.data_dir = PathBuf::from(v);
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} has invalid value '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_applied() {
        let mut config = Config::default();
        config
            .apply_env_overrides(lookup_from(&[
                ("CAPTION_PROVIDER", "hf"),
                ("USE_LABEL_DETECTION", "false"),
                ("MAX_IMAGE_SIZE_MB", "4"),
                ("RATE_LIMIT_BUCKET_SIZE", "5"),
                ("RATE_LIMIT_REFILL_RATE", "0.5"),
                ("RETENTION_DAYS", "30"),
                ("HF_API_KEY", "hf_test"),
            ]))
            .unwrap();

        assert_eq!(
            config.provider.primary,
            CaptionProviderKind::PublicInferenceApi
        );
        assert!(!config.labels.enabled);
        assert_eq!(config.limits.max_image_size_mb, 4);
        assert_eq!(config.rate_limit.bucket_size, 5);
        assert_eq!(config.rate_limit.refill_rate, 0.5);
        assert_eq!(config.storage.retention_days, 30);
        assert_eq!(config.provider.huggingface.api_key, "hf_test");
    }

    #[test]
    fn test_env_overrides_ignore_unset_and_blank() {
        let mut config = Config::default();
        config
            .apply_env_overrides(lookup_from(&[("THUMBNAIL_SIZE", "  ")]))
            .unwrap();
        assert_eq!(config.thumbnail.size, 300);
    }

    #[test]
    fn test_env_override_rejects_bad_number() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(lookup_from(&[("THUMBNAIL_SIZE", "big")]))
            .unwrap_err();
        assert!(err.to_string().contains("THUMBNAIL_SIZE"));
    }

    #[test]
    fn test_oversized_env_values_fail_validation() {
        for (key, value) in [
            ("RETENTION_DAYS", "1000000000"),
            ("MAX_IMAGE_SIZE_MB", "18446744073709551615"),
        ] {
            let mut config = Config::default();
            config.apply_env_overrides(lookup_from(&[(key, value)])).unwrap();
            assert!(config.validate().is_err(), "{key}={value}");
        }
    }

    #[test]
    fn test_env_override_rejects_unknown_provider() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(lookup_from(&[("CAPTION_PROVIDER", "openai")]))
            .unwrap_err();
        assert!(err.to_string().contains("openai"));
    }
}
