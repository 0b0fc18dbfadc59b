//! Scriptable provider and label detector doubles.

use super::labels::LabelDetector;
use super::provider::{CaptionProvider, CaptionRequest};
use crate::error::{CaptionError, CaptionResult, LabelError};
use crate::types::{CaptionPair, CaptionProviderKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Provider returning a fixed result and recording each call.
pub struct MockProvider {
    kind: CaptionProviderKind,
    available: bool,
    result: CaptionResult<CaptionPair>,
    calls: AtomicUsize,
    seen_labels: Mutex<Vec<Vec<String>>>,
}

impl MockProvider {
    pub fn succeeding(kind: CaptionProviderKind, concise: &str, creative: &str) -> Self {
        Self::new(kind, true, Ok(CaptionPair::new(concise, creative)))
    }

    pub fn failing(kind: CaptionProviderKind, message: &str) -> Self {
        Self::new(kind, true, Err(CaptionError::call_failed(kind, message)))
    }

    pub fn unavailable(kind: CaptionProviderKind) -> Self {
        Self::new(
            kind,
            false,
            Err(CaptionError::ProviderUnavailable { provider: kind }),
        )
    }

    pub fn new(
        kind: CaptionProviderKind,
        available: bool,
        result: CaptionResult<CaptionPair>,
    ) -> Self {
        Self {
            kind,
            available,
            result,
            calls: AtomicUsize::new(0),
            seen_labels: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Labels passed in each call, in call order.
    pub fn seen_labels(&self) -> Vec<Vec<String>> {
        self.seen_labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CaptionProvider for MockProvider {
    fn kind(&self) -> CaptionProviderKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate_caption(&self, request: &CaptionRequest) -> CaptionResult<CaptionPair> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.labels().to_vec());
        self.result.clone()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Label detector returning fixed labels, or failing.
pub struct MockLabelDetector {
    labels: Option<Vec<String>>,
    calls: AtomicUsize,
}

impl MockLabelDetector {
    pub fn returning(labels: &[&str]) -> Self {
        Self {
            labels: Some(labels.iter().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            labels: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LabelDetector for MockLabelDetector {
    async fn detect_labels(&self, _image_bytes: &[u8]) -> Result<Vec<String>, LabelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.labels
            .clone()
            .ok_or_else(|| LabelError::Request("connection refused".to_string()))
    }
}
