//! Flat inner-product index
//!
//! Rows live in one row-major `Vec<f32>`; search is an exhaustive scan with
//! the SIMD dot product, parallelized with rayon once the corpus is large
//! enough to amortize the fork/join.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use rayon::prelude::*;

use super::{AcceleratedIndex, BackendProvider};
use crate::error::BackendError;
use crate::simd::dot_product;

/// Row count above which scoring fans out across the rayon pool.
const PARALLEL_SCAN_ROWS: usize = 4096;

/// Scored row, ordered so that "greater" means "ranks earlier":
/// higher score first, then lower row index.
#[derive(Clone, Copy)]
struct Ranked {
    row: usize,
    score: f32,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.row.cmp(&self.row))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Exhaustive inner-product index over contiguous `f32` rows.
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
    max_rows: Option<usize>,
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
            max_rows: None,
        }
    }

    /// Cap the number of rows; `add` past the cap fails without side effects.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    fn rows(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    fn score_all(&self, query: &[f32]) -> Vec<f32> {
        if self.rows() >= PARALLEL_SCAN_ROWS {
            self.data
                .par_chunks_exact(self.dim)
                .map(|row| dot_product(query, row))
                .collect()
        } else {
            self.data
                .chunks_exact(self.dim)
                .map(|row| dot_product(query, row))
                .collect()
        }
    }
}

/// Keep the best `k` of `scores` using a bounded min-heap.
fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);

    for (row, &score) in scores.iter().enumerate() {
        // -0.0 ranks as 0.0
        let candidate = Ranked {
            row,
            score: score + 0.0,
        };
        if heap.len() < k {
            heap.push(Reverse(candidate));
            continue;
        }
        // Peek is the worst kept entry
        if let Some(Reverse(worst)) = heap.peek() {
            if candidate > *worst {
                heap.pop();
                heap.push(Reverse(candidate));
            }
        }
    }

    // Ascending by Reverse == descending by rank
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(r)| (r.row, r.score))
        .collect()
}

impl AcceleratedIndex for FlatIpIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.rows()
    }

    fn add(&mut self, rows: &[f32]) -> Result<(), BackendError> {
        if self.dim == 0 || rows.len() % self.dim != 0 {
            return Err(BackendError::RowWidth {
                len: rows.len(),
                dim: self.dim,
            });
        }

        let incoming = rows.len() / self.dim;
        if let Some(limit) = self.max_rows {
            let requested = self.rows() + incoming;
            if requested > limit {
                return Err(BackendError::CapacityExceeded { requested, limit });
            }
        }

        self.data
            .try_reserve(rows.len())
            .map_err(|_| BackendError::Allocation { rows: incoming })?;
        self.data.extend_from_slice(rows);
        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        self.data.truncate(len.saturating_mul(self.dim));
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, BackendError> {
        if query.len() != self.dim {
            return Err(BackendError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if k == 0 || self.data.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.score_all(query);
        Ok(top_k(&scores, k))
    }
}

/// Provider for [`FlatIpIndex`].
///
/// Only available when built with the `accelerated` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlatIpProvider {
    pub max_rows: Option<usize>,
}

impl FlatIpProvider {
    pub fn with_max_rows(max_rows: usize) -> Self {
        Self {
            max_rows: Some(max_rows),
        }
    }
}

impl BackendProvider for FlatIpProvider {
    fn name(&self) -> &'static str {
        "flat-ip"
    }

    fn create(&self, dim: usize) -> Result<Box<dyn AcceleratedIndex>, BackendError> {
        if !cfg!(feature = "accelerated") {
            return Err(BackendError::Unavailable(
                "built without the `accelerated` feature".into(),
            ));
        }
        if dim == 0 {
            return Err(BackendError::Unavailable(
                "cannot build a zero-width index".into(),
            ));
        }

        let index = FlatIpIndex::new(dim);
        Ok(Box::new(match self.max_rows {
            Some(limit) => index.with_max_rows(limit),
            None => index,
        }))
    }
}
