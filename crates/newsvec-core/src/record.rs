//! Records stored in the index and the types that cross its boundary.

use serde::{Deserialize, Serialize};

/// A stored, normalized vector with its source document.
///
/// Immutable once inside the index. Upserting the same `id` again appends a
/// second record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub source: String,
    pub vector: Vec<f64>,
}

/// Incoming item for [`crate::VectorIndex::upsert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertItem {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source: String,
    pub vector: Vec<f64>,
}

impl UpsertItem {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source: impl Into<String>,
        vector: Vec<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
            vector,
        }
    }
}

/// One ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub source: String,
    /// Cosine similarity in `[-1, 1]`, higher is closer.
    pub score: f64,
}

impl SearchHit {
    /// `score` is clamped to `[-1, 1]`; rounding can push a unit dot product
    /// just past the bound.
    pub(crate) fn from_record(record: &VectorRecord, score: f64) -> Self {
        Self {
            id: record.id.clone(),
            text: record.text.clone(),
            source: record.source.clone(),
            score: score.clamp(-1.0, 1.0),
        }
    }
}

/// Which storage/search path the index is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Uninitialized,
    Memory,
    Accelerated,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Uninitialized => "uninitialized",
            BackendKind::Memory => "memory",
            BackendKind::Accelerated => "accelerated",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an upsert item was not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Empty vector or a non-finite component.
    MalformedVector,
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedItem {
    pub id: String,
    pub reason: RejectReason,
}

/// Outcome of one upsert batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertReport {
    /// Records stored by this call.
    pub count: usize,
    pub dim: Option<usize>,
    /// Path that absorbed this batch.
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedItem>,
}

/// Snapshot of index bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub count: usize,
    pub dim: Option<usize>,
    pub backend: BackendKind,
    /// Incremented by every reset.
    pub epoch: u64,
}
