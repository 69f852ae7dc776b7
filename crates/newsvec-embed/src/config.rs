use std::time::Duration;

use crate::hash::DEFAULT_FALLBACK_DIMS;

pub const DEFAULT_ENDPOINT: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction";
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Embedder settings.
///
/// The remote provider is used only when both `endpoint` and `api_key` are
/// non-blank.
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// Base URL; the model name is appended as the last path segment.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Upper bound on one provider round trip.
    pub timeout: Duration,
    pub fallback_dims: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            fallback_dims: DEFAULT_FALLBACK_DIMS,
        }
    }
}
