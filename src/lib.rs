//! newsvec: text embedding and cosine similarity search as a service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP API (axum)                        │
//! │     /ingest /upsert /query /embed /reset /stats /health     │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌──────────────────────────────┐  ┌───────────────────────────┐
//! │   Embedder (newsvec-embed)   │  │ VectorIndex (newsvec-core)│
//! │   remote provider or hash    │─▶│  memory scan or flat      │
//! │   fallback                   │  │  inner-product backend    │
//! └──────────────────────────────┘  └───────────────────────────┘
//! ```

pub mod config;
pub mod server;

pub use config::{BackendChoice, ServiceConfig};
pub use newsvec_core::{SearchHit, UpsertItem, UpsertReport, VectorIndex};
pub use newsvec_embed::{Embedder, EmbedderConfig};
pub use server::{create_router, serve, AppState};
