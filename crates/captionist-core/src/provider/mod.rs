//! Caption generation across interchangeable backends.
//!
//! Provides a provider abstraction over three backends (Bedrock, a managed
//! inference endpoint, and the Hugging Face BLIP API), optional label
//! detection, and an orchestrator that falls back through them in order.

pub(crate) mod bedrock;
pub(crate) mod huggingface;
pub(crate) mod labels;
pub(crate) mod orchestrator;
pub(crate) mod prompt;
pub(crate) mod provider;
pub(crate) mod sagemaker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use labels::{HttpLabelDetector, LabelDetector};
pub use orchestrator::{priority_order, CaptionOrchestrator};
pub use prompt::{build_prompt, parse_response};
pub use provider::{CaptionProvider, CaptionProviderFactory, CaptionRequest, ImageInput};
