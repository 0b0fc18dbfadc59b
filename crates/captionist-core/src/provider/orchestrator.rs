//! Ordered fallback across caption providers.
//!
//! Providers are tried one at a time in priority order: the configured
//! primary, then the default order with duplicates removed. The first
//! complete caption pair wins. Individual failures are logged and swallowed;
//! only exhaustion reaches the caller, carrying the last real failure.

use super::labels::{HttpLabelDetector, LabelDetector};
use super::provider::{CaptionProvider, CaptionProviderFactory, CaptionRequest};
use crate::config::Config;
use crate::error::{CaptionError, CaptionResult};
use crate::types::{CaptionOutcome, CaptionProviderKind, ProviderStatus};
use std::collections::HashMap;
use std::sync::Arc;

/// `[primary, default order...]` with later duplicates dropped.
pub fn priority_order(primary: CaptionProviderKind) -> Vec<CaptionProviderKind> {
    let mut order = Vec::with_capacity(CaptionProviderKind::DEFAULT_ORDER.len());
    for kind in std::iter::once(primary).chain(CaptionProviderKind::DEFAULT_ORDER) {
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    order
}

pub struct CaptionOrchestrator {
    primary: CaptionProviderKind,
    providers: HashMap<CaptionProviderKind, Arc<dyn CaptionProvider>>,
    label_detector: Option<Arc<dyn LabelDetector>>,
}

impl CaptionOrchestrator {
    /// Register providers by kind. A later provider of the same kind replaces an earlier one.
    pub fn new(primary: CaptionProviderKind, providers: Vec<Arc<dyn CaptionProvider>>) -> Self {
        let providers = providers.into_iter().map(|p| (p.kind(), p)).collect();
        Self {
            primary,
            providers,
            label_detector: None,
        }
    }

    /// Build the real provider set and label detector from config.
    pub fn from_config(config: &Config) -> Self {
        let providers = CaptionProviderFactory::create_all(&config.provider);
        let orchestrator = Self::new(config.provider.primary, providers);
        match HttpLabelDetector::from_config(&config.labels) {
            Some(detector) => orchestrator.with_label_detector(Arc::new(detector)),
            None => orchestrator,
        }
    }

    pub fn with_label_detector(mut self, detector: Arc<dyn LabelDetector>) -> Self {
        self.label_detector = Some(detector);
        self
    }

    pub fn primary(&self) -> CaptionProviderKind {
        self.primary
    }

    pub fn priority_order(&self) -> Vec<CaptionProviderKind> {
        priority_order(self.primary)
    }

    /// Each kind in priority order with its current availability.
    pub fn status(&self) -> Vec<ProviderStatus> {
        self.priority_order()
            .into_iter()
            .map(|kind| ProviderStatus {
                kind,
                available: self.providers.get(&kind).is_some_and(|p| p.is_available()),
            })
            .collect()
    }

    /// Caption the image, falling back through providers until one succeeds.
    pub async fn generate(&self, request: CaptionRequest) -> CaptionResult<CaptionOutcome> {
        let request = self.attach_labels(request).await;
        let mut last_error: Option<CaptionError> = None;

        for kind in self.priority_order() {
            let Some(provider) = self.providers.get(&kind) else {
                continue;
            };
            if !provider.is_available() {
                tracing::debug!(provider = %kind, "Provider not configured, skipping");
                continue;
            }

            match provider.generate_caption(&request).await {
                Ok(pair) if pair.is_complete() => {
                    tracing::info!(provider = %kind, "Caption generated");
                    return Ok(CaptionOutcome {
                        pair,
                        labels: request.labels().to_vec(),
                        provider_used: kind,
                    });
                }
                Ok(_) => {
                    let err = CaptionError::call_failed(kind, "provider returned an empty caption");
                    tracing::warn!(provider = %kind, "Provider failed: {err}");
                    last_error = Some(err);
                }
                Err(CaptionError::ProviderUnavailable { .. }) => {
                    tracing::debug!(provider = %kind, "Provider reported unavailable, skipping");
                }
                Err(err) => {
                    tracing::warn!(provider = %kind, "Provider failed: {err}");
                    last_error = Some(err);
                }
            }
        }

        Err(CaptionError::AllProvidersExhausted {
            last_error: last_error.map(Box::new),
        })
    }

    /// Run label detection when enabled, no labels were supplied, and raw bytes exist.
    async fn attach_labels(&self, request: CaptionRequest) -> CaptionRequest {
        let Some(detector) = &self.label_detector else {
            return request;
        };
        if !request.labels().is_empty() {
            return request;
        }
        let Some(raw) = request.raw_bytes() else {
            return request;
        };

        let labels = match detector.detect_labels(raw).await {
            Ok(labels) => labels,
            Err(e) => {
                tracing::warn!("Label detection failed, continuing without labels: {e}");
                Vec::new()
            }
        };
        request.with_labels(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::normalize;
    use crate::provider::mock::{MockLabelDetector, MockProvider};
    use crate::types::CaptionPair;
    use image::DynamicImage;
    use CaptionProviderKind::*;

    fn request() -> CaptionRequest {
        CaptionRequest::new(normalize(DynamicImage::new_rgb8(4, 4), 2048).unwrap())
    }

    fn orchestrator(primary: CaptionProviderKind, providers: &[Arc<MockProvider>]) -> CaptionOrchestrator {
        let providers = providers
            .iter()
            .map(|p| p.clone() as Arc<dyn CaptionProvider>)
            .collect();
        CaptionOrchestrator::new(primary, providers)
    }

    #[test]
    fn test_priority_order_dedupes_primary() {
        assert_eq!(
            priority_order(RemoteHostedModel),
            vec![RemoteHostedModel, ManagedInference, PublicInferenceApi]
        );
        assert_eq!(
            priority_order(ManagedInference),
            vec![ManagedInference, RemoteHostedModel, PublicInferenceApi]
        );
        assert_eq!(
            priority_order(PublicInferenceApi),
            vec![PublicInferenceApi, RemoteHostedModel, ManagedInference]
        );
    }

    #[tokio::test]
    async fn test_primary_success_short_circuits() {
        let bedrock = Arc::new(MockProvider::succeeding(RemoteHostedModel, "a", "b"));
        let hf = Arc::new(MockProvider::succeeding(PublicInferenceApi, "c", "d"));
        let orch = orchestrator(RemoteHostedModel, &[bedrock.clone(), hf.clone()]);

        let outcome = orch.generate(request()).await.unwrap();
        assert_eq!(outcome.provider_used, RemoteHostedModel);
        assert_eq!(outcome.pair, CaptionPair::new("a", "b"));
        assert_eq!(hf.calls(), 0);
    }

    #[tokio::test]
    async fn test_only_available_provider_is_used() {
        let bedrock = Arc::new(MockProvider::unavailable(RemoteHostedModel));
        let sagemaker = Arc::new(MockProvider::unavailable(ManagedInference));
        let hf = Arc::new(MockProvider::succeeding(PublicInferenceApi, "x", "y"));
        let orch = orchestrator(RemoteHostedModel, &[bedrock.clone(), sagemaker.clone(), hf]);

        let outcome = orch.generate(request()).await.unwrap();
        assert_eq!(outcome.provider_used, PublicInferenceApi);
        assert_eq!(bedrock.calls(), 0);
        assert_eq!(sagemaker.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_falls_through_to_next() {
        let sagemaker = Arc::new(MockProvider::failing(ManagedInference, "HTTP 500"));
        let bedrock = Arc::new(MockProvider::succeeding(RemoteHostedModel, "a", "b"));
        let orch = orchestrator(ManagedInference, &[sagemaker.clone(), bedrock.clone()]);

        let outcome = orch.generate(request()).await.unwrap();
        assert_eq!(outcome.provider_used, RemoteHostedModel);
        assert_eq!(sagemaker.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_last_error() {
        let bedrock = Arc::new(MockProvider::failing(RemoteHostedModel, "first"));
        let sagemaker = Arc::new(MockProvider::failing(ManagedInference, "second"));
        let hf = Arc::new(MockProvider::failing(PublicInferenceApi, "third"));
        let orch = orchestrator(RemoteHostedModel, &[bedrock, sagemaker, hf]);

        let err = orch.generate(request()).await.unwrap_err();
        match err {
            CaptionError::AllProvidersExhausted {
                last_error: Some(last),
            } => {
                assert_eq!(*last, CaptionError::call_failed(PublicInferenceApi, "third"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_without_attempts_has_no_last_error() {
        let orch = orchestrator(
            RemoteHostedModel,
            &[Arc::new(MockProvider::unavailable(RemoteHostedModel))],
        );
        let err = orch.generate(request()).await.unwrap_err();
        assert_eq!(err, CaptionError::AllProvidersExhausted { last_error: None });
    }

    #[tokio::test]
    async fn test_unavailable_error_is_not_recorded() {
        let bedrock = Arc::new(MockProvider::failing(RemoteHostedModel, "boom"));
        // Claims availability but then reports unavailable when called.
        let sagemaker = Arc::new(MockProvider::new(
            ManagedInference,
            true,
            Err(CaptionError::ProviderUnavailable {
                provider: ManagedInference,
            }),
        ));
        let orch = orchestrator(RemoteHostedModel, &[bedrock, sagemaker.clone()]);

        let err = orch.generate(request()).await.unwrap_err();
        assert_eq!(sagemaker.calls(), 1);
        assert_eq!(
            err,
            CaptionError::AllProvidersExhausted {
                last_error: Some(Box::new(CaptionError::call_failed(RemoteHostedModel, "boom")))
            }
        );
    }

    #[tokio::test]
    async fn test_empty_pair_counts_as_failure() {
        let bedrock = Arc::new(MockProvider::succeeding(RemoteHostedModel, "", ""));
        let hf = Arc::new(MockProvider::succeeding(PublicInferenceApi, "ok", "fine"));
        let orch = orchestrator(RemoteHostedModel, &[bedrock.clone(), hf]);

        let outcome = orch.generate(request()).await.unwrap();
        assert_eq!(bedrock.calls(), 1);
        assert_eq!(outcome.provider_used, PublicInferenceApi);
    }

    #[tokio::test]
    async fn test_unregistered_kinds_are_skipped() {
        let orch = orchestrator(ManagedInference, &[]);
        let err = orch.generate(request()).await.unwrap_err();
        assert_eq!(err, CaptionError::AllProvidersExhausted { last_error: None });
    }

    #[tokio::test]
    async fn test_detected_labels_reach_provider() {
        let bedrock = Arc::new(MockProvider::succeeding(RemoteHostedModel, "a", "b"));
        let detector = Arc::new(MockLabelDetector::returning(&["Dog", "Beach"]));
        let orch = orchestrator(RemoteHostedModel, &[bedrock.clone()])
            .with_label_detector(detector.clone());

        let outcome = orch
            .generate(request().with_raw_bytes(vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(detector.calls(), 1);
        assert_eq!(outcome.labels, vec!["Dog", "Beach"]);
        assert_eq!(bedrock.seen_labels(), vec![vec!["Dog".to_string(), "Beach".to_string()]]);
    }

    #[tokio::test]
    async fn test_label_failure_is_fail_open() {
        let bedrock = Arc::new(MockProvider::succeeding(RemoteHostedModel, "a", "b"));
        let orch = orchestrator(RemoteHostedModel, &[bedrock])
            .with_label_detector(Arc::new(MockLabelDetector::failing()));

        let outcome = orch
            .generate(request().with_raw_bytes(vec![1, 2, 3]))
            .await
            .unwrap();
        assert!(outcome.labels.is_empty());
        assert_eq!(outcome.provider_used, RemoteHostedModel);
    }

    #[tokio::test]
    async fn test_detector_skipped_with_prefetched_labels_or_no_bytes() {
        let bedrock = Arc::new(MockProvider::succeeding(RemoteHostedModel, "a", "b"));
        let detector = Arc::new(MockLabelDetector::returning(&["Detected"]));
        let orch = orchestrator(RemoteHostedModel, &[bedrock])
            .with_label_detector(detector.clone());

        let outcome = orch
            .generate(
                request()
                    .with_raw_bytes(vec![1])
                    .with_labels(vec!["Given".to_string()]),
            )
            .await
            .unwrap();
        assert_eq!(outcome.labels, vec!["Given"]);

        orch.generate(request()).await.unwrap();
        assert_eq!(detector.calls(), 0);
    }

    #[test]
    fn test_status_follows_priority_order() {
        let orch = orchestrator(
            PublicInferenceApi,
            &[
                Arc::new(MockProvider::unavailable(RemoteHostedModel)),
                Arc::new(MockProvider::succeeding(PublicInferenceApi, "a", "b")),
            ],
        );
        let status = orch.status();
        assert_eq!(
            status,
            vec![
                ProviderStatus { kind: PublicInferenceApi, available: true },
                ProviderStatus { kind: RemoteHostedModel, available: false },
                ProviderStatus { kind: ManagedInference, available: false },
            ]
        );
    }
}
