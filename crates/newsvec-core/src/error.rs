use thiserror::Error;

/// Caller-visible index errors. Backend failures never surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failures inside an accelerated backend. Absorbed by the index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Accelerated backend unavailable: {0}")]
    Unavailable(String),

    #[error("Row block of {len} values is not a multiple of dimension {dim}")]
    RowWidth { len: usize, dim: usize },

    #[error("Dimension mismatch: backend is {expected}-wide, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Capacity exceeded: {requested} rows requested, limit is {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    #[error("Allocation failed for {rows} rows")]
    Allocation { rows: usize },
}
