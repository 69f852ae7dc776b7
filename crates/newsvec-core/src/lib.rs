//! newsvec core – memory-resident cosine similarity index
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        VectorIndex                          │
//! │      upsert · query · count · reset   (RwLock<IndexState>)  │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   Accelerated (per epoch)    │   Memory (always present)    │
//! │  FlatIpIndex, f32 rows, SIMD │  f64 records, stable scan    │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Every stored vector is L2-normalized, so the inner product the backends
//! compute is the cosine similarity.

pub mod backend;
pub mod error;
pub mod index;
pub mod record;
pub mod simd;

pub use backend::{
    default_provider, AcceleratedIndex, BackendProvider, FlatIpIndex, FlatIpProvider, MemoryOnly,
};
pub use error::{BackendError, IndexError};
pub use index::VectorIndex;
pub use record::{
    BackendKind, IndexStats, RejectReason, RejectedItem, SearchHit, UpsertItem, UpsertReport,
    VectorRecord,
};
pub use simd::{dot_product, l2_normalized};
