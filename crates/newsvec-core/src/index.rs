//! The vector index
//!
//! # Concurrency Model
//!
//! All state sits behind one `parking_lot::RwLock`:
//!
//! - **upsert / reset**: write lock. Backend selection for a new epoch happens
//!   inside the same critical section, so it cannot race another writer.
//! - **query / count / stats**: read lock. Readers run concurrently and always
//!   see a whole batch or none of it.
//!
//! Callers embed text *before* calling `upsert`; nothing here does I/O.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{default_provider, linear_scan, AcceleratedIndex, BackendProvider};
use crate::error::IndexError;
use crate::record::{
    BackendKind, IndexStats, RejectReason, RejectedItem, SearchHit, UpsertItem, UpsertReport,
    VectorRecord,
};
use crate::simd::{all_finite, l2_normalized, to_f32};

enum Backend {
    Uninitialized,
    Memory,
    Accelerated(Box<dyn AcceleratedIndex>),
}

impl Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Uninitialized => BackendKind::Uninitialized,
            Backend::Memory => BackendKind::Memory,
            Backend::Accelerated(_) => BackendKind::Accelerated,
        }
    }
}

struct IndexState {
    dim: Option<usize>,
    backend: Backend,
    records: Vec<VectorRecord>,
    epoch: u64,
}

impl IndexState {
    fn empty(epoch: u64) -> Self {
        Self {
            dim: None,
            backend: Backend::Uninitialized,
            records: Vec::new(),
            epoch,
        }
    }
}

/// Memory-resident cosine similarity index.
///
/// Owned by the hosting service and shared by reference (`Arc<VectorIndex>`);
/// independent instances do not share anything.
pub struct VectorIndex {
    provider: Arc<dyn BackendProvider>,
    state: RwLock<IndexState>,
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex {
    /// Index using the best backend compiled into this build.
    pub fn new() -> Self {
        Self::with_provider(default_provider())
    }

    pub fn with_provider(provider: Arc<dyn BackendProvider>) -> Self {
        Self {
            provider,
            state: RwLock::new(IndexState::empty(0)),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Store a batch of items.
    ///
    /// Items with an empty or non-finite vector are skipped; items whose length
    /// disagrees with the established dimension are rejected. Both show up in
    /// `UpsertReport::rejected`. Accepted vectors are normalized before storage.
    pub fn upsert(&self, items: Vec<UpsertItem>) -> UpsertReport {
        let mut state = self.state.write();

        let mut accepted = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();

        for item in items {
            if item.vector.is_empty() || !all_finite(&item.vector) {
                rejected.push(RejectedItem {
                    id: item.id,
                    reason: RejectReason::MalformedVector,
                });
                continue;
            }

            let dim = *state.dim.get_or_insert(item.vector.len());
            if item.vector.len() != dim {
                tracing::warn!(
                    "Rejecting {:?}: vector has {} dimensions, index has {}",
                    item.id,
                    item.vector.len(),
                    dim
                );
                rejected.push(RejectedItem {
                    id: item.id,
                    reason: RejectReason::DimensionMismatch {
                        expected: dim,
                        actual: item.vector.len(),
                    },
                });
                continue;
            }

            accepted.push(VectorRecord {
                vector: l2_normalized(&item.vector),
                id: item.id,
                text: item.text,
                source: item.source,
            });
        }

        if !rejected.is_empty() {
            tracing::debug!(
                "Upsert skipped {} of {} items",
                rejected.len(),
                rejected.len() + accepted.len()
            );
        }

        let dim = match state.dim {
            Some(dim) if !accepted.is_empty() => dim,
            _ => {
                return UpsertReport {
                    count: 0,
                    dim: state.dim,
                    backend: state.backend.kind(),
                    rejected,
                }
            }
        };

        if matches!(state.backend, Backend::Uninitialized) {
            state.backend = self.select_backend(dim, state.epoch);
        }

        let count = accepted.len();
        state.records.extend(accepted);

        let state = &mut *state;
        let backend = match &mut state.backend {
            Backend::Accelerated(index) => {
                if sync_rows(index.as_mut(), &state.records) {
                    BackendKind::Accelerated
                } else {
                    BackendKind::Memory
                }
            }
            other => other.kind(),
        };

        UpsertReport {
            count,
            dim: state.dim,
            backend,
            rejected,
        }
    }

    /// Up to `k` records ranked by cosine similarity to `vector`.
    ///
    /// An empty index answers `[]` for any input.
    pub fn query(&self, vector: &[f64], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        let state = self.state.read();

        if state.records.is_empty() {
            return Ok(Vec::new());
        }
        if vector.is_empty() {
            return Err(IndexError::InvalidInput("query vector is empty".into()));
        }
        if !all_finite(vector) {
            return Err(IndexError::InvalidInput(
                "query vector contains non-finite values".into(),
            ));
        }
        if let Some(dim) = state.dim {
            if vector.len() != dim {
                return Err(IndexError::DimensionMismatch {
                    expected: dim,
                    actual: vector.len(),
                });
            }
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = l2_normalized(vector);

        if let Backend::Accelerated(index) = &state.backend {
            // Rows missing after a failed append: the accelerated copy is stale
            if index.len() == state.records.len() {
                match index.search(&to_f32(&query), k) {
                    Ok(rows) => {
                        return Ok(rows
                            .into_iter()
                            .filter_map(|(row, score)| {
                                state
                                    .records
                                    .get(row)
                                    .map(|r| SearchHit::from_record(r, f64::from(score)))
                            })
                            .collect());
                    }
                    Err(e) => {
                        tracing::warn!("Accelerated search failed, scanning memory instead: {}", e);
                    }
                }
            } else {
                tracing::debug!(
                    "Accelerated index covers {} of {} records, scanning memory",
                    index.len(),
                    state.records.len()
                );
            }
        }

        Ok(linear_scan(&state.records, &query, k))
    }

    pub fn count(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn dim(&self) -> Option<usize> {
        self.state.read().dim
    }

    pub fn backend(&self) -> BackendKind {
        self.state.read().backend.kind()
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            count: state.records.len(),
            dim: state.dim,
            backend: state.backend.kind(),
            epoch: state.epoch,
        }
    }

    /// Drop every record and the dimension; the next upsert re-selects a backend.
    pub fn reset(&self) {
        let mut state = self.state.write();
        let epoch = state.epoch + 1;
        *state = IndexState::empty(epoch);
        tracing::info!("Index reset (epoch {})", epoch);
    }

    fn select_backend(&self, dim: usize, epoch: u64) -> Backend {
        match self.provider.create(dim) {
            Ok(index) => {
                tracing::info!(
                    "Epoch {}: using accelerated backend {} ({} dimensions)",
                    epoch,
                    self.provider.name(),
                    dim
                );
                Backend::Accelerated(index)
            }
            Err(e) => {
                tracing::warn!(
                    "Epoch {}: accelerated backend unavailable ({}), using memory scan",
                    epoch,
                    e
                );
                Backend::Memory
            }
        }
    }
}

/// Append every record the accelerated index has not seen yet.
///
/// On failure the partial append is rolled back and `false` is returned; the
/// missing rows are retried on the next upsert.
fn sync_rows(index: &mut dyn AcceleratedIndex, records: &[VectorRecord]) -> bool {
    let have = index.len();
    if have >= records.len() {
        return true;
    }

    let block: Vec<f32> = records[have..]
        .iter()
        .flat_map(|r| r.vector.iter().map(|&x| x as f32))
        .collect();

    match index.add(&block) {
        Ok(()) => true,
        Err(e) => {
            index.truncate(have);
            tracing::warn!(
                "Accelerated append of {} rows failed, batch served from memory: {}",
                records.len() - have,
                e
            );
            false
        }
    }
}
