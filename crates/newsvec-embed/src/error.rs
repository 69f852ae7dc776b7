use thiserror::Error;

/// Remote provider failures. The [`crate::Embedder`] absorbs all of them by
/// switching the batch to the hash fallback.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Remote provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Invalid provider endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}
