//! newsvec embed – text to unit vectors
//!
//! # Architecture
//!
//! ```text
//! texts ──▶ Embedder ──┬──▶ RemoteProvider (feature extraction over HTTP)
//!                      │        │ shape reduction + L2 normalize
//!                      │        ▼
//!                      │    Ok(vectors) ─────────────────────┐
//!                      │        │ Err(any ProviderError)      │
//!                      │        ▼                             ▼
//!                      └──▶ hash_embed (deterministic) ──▶ Embeddings { vectors, method }
//! ```
//!
//! Provider failures never reach the caller. The method that produced a batch
//! is reported alongside the vectors.

pub mod config;
pub mod error;
pub mod hash;
pub mod remote;
mod shape;

use serde::{Deserialize, Serialize};

pub use config::EmbedderConfig;
pub use error::ProviderError;
pub use hash::{hash_embed, DEFAULT_FALLBACK_DIMS};
pub use remote::RemoteProvider;

/// Name reported for hash-fallback embeddings.
pub const HASH_FALLBACK_MODEL: &str = "hash-fallback";

/// Divide by the Euclidean norm; a zero norm is treated as 1.
///
/// Components are scaled by the largest magnitude first so the sum of squares
/// cannot overflow or underflow.
pub(crate) fn normalize(v: &mut [f64]) {
    let scale = v.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    if scale == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x /= scale;
    }
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Which path produced a batch of vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum EmbeddingMethod {
    Remote { model: String },
    HashFallback { dims: usize },
}

impl EmbeddingMethod {
    pub fn used_model(&self) -> &str {
        match self {
            EmbeddingMethod::Remote { model } => model,
            EmbeddingMethod::HashFallback { .. } => HASH_FALLBACK_MODEL,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EmbeddingMethod::HashFallback { .. })
    }
}

/// Vectors in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    pub vectors: Vec<Vec<f64>>,
    pub method: EmbeddingMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f64>,
    pub method: EmbeddingMethod,
}

/// Text embedder with a remote provider and a deterministic local fallback.
#[derive(Debug)]
pub struct Embedder {
    remote: Option<RemoteProvider>,
    fallback_dims: usize,
}

impl Embedder {
    /// Build from config. A provider that cannot be set up is logged and
    /// replaced by the hash fallback.
    pub fn new(config: &EmbedderConfig) -> Self {
        let remote = match RemoteProvider::from_config(config) {
            Ok(provider) => {
                tracing::info!(
                    "Remote embeddings enabled: model {} at {}",
                    provider.model(),
                    provider.url()
                );
                Some(provider)
            }
            Err(ProviderError::NotConfigured(why)) => {
                tracing::info!(
                    "Remote embeddings disabled ({}), using {}-dim hash fallback",
                    why,
                    config.fallback_dims
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Remote embeddings unavailable ({}), using {}-dim hash fallback",
                    e,
                    config.fallback_dims
                );
                None
            }
        };

        Self {
            remote,
            fallback_dims: config.fallback_dims,
        }
    }

    /// Hash fallback only.
    pub fn offline(fallback_dims: usize) -> Self {
        Self {
            remote: None,
            fallback_dims,
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Method used when the provider behaves.
    pub fn preferred_method(&self) -> EmbeddingMethod {
        match &self.remote {
            Some(provider) => EmbeddingMethod::Remote {
                model: provider.model().to_string(),
            },
            None => self.fallback_method(),
        }
    }

    fn fallback_method(&self) -> EmbeddingMethod {
        EmbeddingMethod::HashFallback {
            dims: self.fallback_dims,
        }
    }

    fn hash_batch(&self, texts: &[&str]) -> Embeddings {
        Embeddings {
            vectors: texts
                .iter()
                .map(|t| hash_embed(t, self.fallback_dims))
                .collect(),
            method: self.fallback_method(),
        }
    }

    /// Embed a batch, preserving order.
    ///
    /// Any provider failure switches the whole batch to the hash fallback.
    pub async fn embed<S: AsRef<str>>(&self, texts: &[S]) -> Embeddings {
        let texts: Vec<&str> = texts.iter().map(AsRef::as_ref).collect();

        if texts.is_empty() {
            return Embeddings {
                vectors: Vec::new(),
                method: self.preferred_method(),
            };
        }

        let Some(provider) = &self.remote else {
            return self.hash_batch(&texts);
        };

        match provider.embed_batch(&texts).await {
            Ok(vectors) => {
                tracing::debug!(
                    "Embedded {} texts with {} ({} dims)",
                    vectors.len(),
                    provider.model(),
                    vectors.first().map(Vec::len).unwrap_or(0)
                );
                Embeddings {
                    vectors,
                    method: EmbeddingMethod::Remote {
                        model: provider.model().to_string(),
                    },
                }
            }
            Err(ProviderError::Shape(why)) => {
                tracing::warn!(
                    "Embedding provider returned an unexpected shape ({}), using hash fallback",
                    why
                );
                self.hash_batch(&texts)
            }
            Err(e) => {
                tracing::warn!("Embedding provider failed ({}), using hash fallback", e);
                self.hash_batch(&texts)
            }
        }
    }

    /// `embed([text])[0]`.
    pub async fn embed_one(&self, text: &str) -> Embedding {
        let Embeddings {
            mut vectors,
            method,
        } = self.embed(&[text]).await;

        Embedding {
            vector: vectors.pop().unwrap_or_default(),
            method,
        }
    }
}
