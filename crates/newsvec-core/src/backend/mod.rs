//! Search backends
//!
//! ```text
//!                 first upsert of an epoch (dim known)
//! Uninitialized ─────────────────────────────────────┬──▶ Accelerated
//!                                                    │     (provider.create ok)
//!                                                    └──▶ Memory
//!                                                          (unavailable / init failed)
//! reset() ──▶ Uninitialized
//! ```
//!
//! The memory path is always present: records keep their `f64` vectors and a
//! linear scan can answer any query. An accelerated index is an optional copy
//! of the same rows in a faster layout with the same metric and ranking.

mod flat;
mod memory;

use std::sync::Arc;

use crate::error::BackendError;

pub use flat::{FlatIpIndex, FlatIpProvider};
pub(crate) use memory::linear_scan;

/// A flat inner-product index over `dim`-wide rows.
///
/// Row `i` corresponds to the `i`-th record of the owning index.
pub trait AcceleratedIndex: Send + Sync {
    fn dim(&self) -> usize;

    /// Number of rows stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a contiguous block of rows (`rows.len()` must be a multiple of `dim`).
    fn add(&mut self, rows: &[f32]) -> Result<(), BackendError>;

    /// Drop rows past `len`.
    fn truncate(&mut self, len: usize);

    /// Top-k `(row, score)` pairs by descending score, ties by ascending row.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, BackendError>;
}

/// Capability check for an accelerated backend.
///
/// Chosen once when a [`crate::VectorIndex`] is built; `create` is attempted at
/// most once per epoch.
pub trait BackendProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn create(&self, dim: usize) -> Result<Box<dyn AcceleratedIndex>, BackendError>;
}

/// Provider that never offers acceleration.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryOnly;

impl BackendProvider for MemoryOnly {
    fn name(&self) -> &'static str {
        "memory-only"
    }

    fn create(&self, _dim: usize) -> Result<Box<dyn AcceleratedIndex>, BackendError> {
        Err(BackendError::Unavailable(
            "acceleration disabled for this index".into(),
        ))
    }
}

/// The best provider compiled into this build.
pub fn default_provider() -> Arc<dyn BackendProvider> {
    if cfg!(feature = "accelerated") {
        Arc::new(FlatIpProvider::default())
    } else {
        Arc::new(MemoryOnly)
    }
}
