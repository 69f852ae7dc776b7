//! Service configuration
//!
//! Every setting is a `serve` flag with an environment fallback, so the
//! service can be configured entirely from the environment in a container.

use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use newsvec_core::{default_provider, BackendProvider, FlatIpProvider, MemoryOnly};
use newsvec_embed::config::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use newsvec_embed::{EmbedderConfig, DEFAULT_FALLBACK_DIMS};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// Accelerated index when this build has one, memory scan otherwise
    Auto,
    /// Always use the in-memory linear scan
    Memory,
}

#[derive(Debug, Clone, Args)]
pub struct ServiceConfig {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Credential for the remote embedding provider (hash fallback when unset)
    #[arg(long, env = "HF_API_KEY", hide_env_values = true)]
    pub hf_api_key: Option<String>,

    /// Remote embedding model
    #[arg(long, env = "HF_EMBEDDING_MODEL", default_value = DEFAULT_MODEL)]
    pub hf_model: String,

    /// Feature-extraction endpoint; the model name is appended to it
    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub hf_endpoint: String,

    /// Timeout for one remote embedding request, in seconds
    #[arg(long, env = "EMBED_TIMEOUT_SECS", default_value_t = 45)]
    pub embed_timeout_secs: u64,

    /// Dimension of hash-fallback vectors
    #[arg(long, env = "FALLBACK_DIMS", default_value_t = DEFAULT_FALLBACK_DIMS)]
    pub fallback_dims: usize,

    /// Search backend
    #[arg(long, env = "NEWSVEC_BACKEND", value_enum, default_value_t = BackendChoice::Auto)]
    pub backend: BackendChoice,

    /// Row limit for the accelerated index (unlimited when unset)
    #[arg(long, env = "ACCEL_MAX_ROWS")]
    pub accel_max_rows: Option<usize>,

    /// `k` used by /query when the request omits it
    #[arg(long, env = "DEFAULT_K", default_value_t = DEFAULT_K)]
    pub default_k: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            hf_api_key: None,
            hf_model: DEFAULT_MODEL.to_string(),
            hf_endpoint: DEFAULT_ENDPOINT.to_string(),
            embed_timeout_secs: 45,
            fallback_dims: DEFAULT_FALLBACK_DIMS,
            backend: BackendChoice::Auto,
            accel_max_rows: None,
            default_k: DEFAULT_K,
        }
    }
}

impl ServiceConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn embedder_config(&self) -> EmbedderConfig {
        EmbedderConfig {
            endpoint: self.hf_endpoint.clone(),
            api_key: self.hf_api_key.clone(),
            model: self.hf_model.clone(),
            timeout: Duration::from_secs(self.embed_timeout_secs),
            fallback_dims: self.fallback_dims,
        }
    }

    pub fn backend_provider(&self) -> Arc<dyn BackendProvider> {
        match (self.backend, self.accel_max_rows) {
            (BackendChoice::Memory, _) => Arc::new(MemoryOnly),
            (BackendChoice::Auto, Some(limit)) => Arc::new(FlatIpProvider::with_max_rows(limit)),
            (BackendChoice::Auto, None) => default_provider(),
        }
    }
}
