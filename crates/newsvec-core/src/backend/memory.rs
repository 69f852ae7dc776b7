//! Linear-scan backend over the record list.

use crate::record::{SearchHit, VectorRecord};
use crate::simd::dot;

/// Score every record against `query`, then stable-sort by descending score.
///
/// `query` must already be normalized and `k > 0`. Records with equal scores
/// keep insertion order.
pub(crate) fn linear_scan(records: &[VectorRecord], query: &[f64], k: usize) -> Vec<SearchHit> {
    let mut scored: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        // + 0.0 folds -0.0 into 0.0 so zero scores tie
        .map(|(idx, record)| (idx, dot(query, &record.vector) + 0.0))
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(idx, score)| SearchHit::from_record(&records[idx], score))
        .collect()
}
