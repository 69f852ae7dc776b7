use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use newsvec_core::{
    AcceleratedIndex, BackendError, BackendKind, BackendProvider, FlatIpIndex, FlatIpProvider,
    MemoryOnly, UpsertItem, VectorIndex,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn item(id: &str, vector: Vec<f64>) -> UpsertItem {
    UpsertItem::new(id, format!("body {id}"), "test-feed", vector)
}

fn random_vector(rng: &mut StdRng, dim: usize) -> Vec<f64> {
    (0..dim).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect()
}

fn random_corpus(seed: u64, n: usize, dim: usize) -> Vec<UpsertItem> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| item(&format!("doc-{i}"), random_vector(&mut rng, dim)))
        .collect()
}

fn both_backends() -> [(&'static str, VectorIndex); 2] {
    [
        ("memory", VectorIndex::with_provider(Arc::new(MemoryOnly))),
        (
            "accelerated",
            VectorIndex::with_provider(Arc::new(FlatIpProvider::default())),
        ),
    ]
}

// ============== Reference scenarios ==============

#[test]
fn test_scenario_a_ranked_top_two() {
    for (name, index) in both_backends() {
        index.upsert(vec![
            item("record1", vec![1.0, 0.0, 0.0, 0.0]),
            item("record2", vec![0.0, 1.0, 0.0, 0.0]),
            item("record3", vec![0.7, 0.7, 0.0, 0.0]),
        ]);

        let hits = index.query(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["record1", "record3"], "{name}");
        assert!((hits[0].score - 1.0).abs() < 1e-6, "{name}");
        assert!(
            (hits[1].score - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6,
            "{name}"
        );
        assert_eq!(hits[0].text, "body record1");
        assert_eq!(hits[0].source, "test-feed");
    }
}

#[test]
fn test_scenario_b_reset_then_empty() {
    for (name, index) in both_backends() {
        index.upsert(random_corpus(1, 10, 8));
        assert_eq!(index.count(), 10, "{name}");

        index.reset();
        assert_eq!(index.count(), 0, "{name}");
        assert!(index.query(&[1.0; 8], 5).unwrap().is_empty(), "{name}");
        // Empty index ignores the query's width
        assert!(index.query(&[1.0; 3], 5).unwrap().is_empty(), "{name}");
    }
}

#[test]
fn test_scenario_d_wrong_dimension_is_isolated() {
    for (name, index) in both_backends() {
        index.upsert(vec![
            item("a", vec![1.0, 0.0, 0.0, 0.0]),
            item("b", vec![0.0, 1.0, 0.0, 0.0]),
        ]);

        let report = index.upsert(vec![item("bad", vec![1.0, 0.0, 0.0])]);
        assert_eq!(report.count, 0, "{name}");
        assert_eq!(report.rejected.len(), 1, "{name}");
        assert_eq!(index.count(), 2, "{name}");

        let hits = index.query(&[0.0, 1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 2, "{name}");
        assert_eq!(hits[0].id, "b", "{name}");
        assert!(hits.iter().all(|h| h.id != "bad"), "{name}");
    }
}

// ============== Properties ==============

#[test]
fn test_top_k_contract() {
    for (name, index) in both_backends() {
        let n = 25;
        index.upsert(random_corpus(7, n, 16));
        let mut rng = StdRng::seed_from_u64(99);

        for k in [1usize, 5, 24, 25, 26, 100] {
            let hits = index.query(&random_vector(&mut rng, 16), k).unwrap();
            assert_eq!(hits.len(), k.min(n), "{name} k={k}");
            for pair in hits.windows(2) {
                assert!(pair[0].score >= pair[1].score, "{name} not sorted");
            }
        }
    }
}

#[test]
fn test_scores_are_cosine_bounded() {
    for (name, index) in both_backends() {
        index.upsert(random_corpus(3, 50, 12));
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            let hits = index.query(&random_vector(&mut rng, 12), 50).unwrap();
            for hit in hits {
                assert!(
                    (-1.0..=1.0).contains(&hit.score),
                    "{name} score {}",
                    hit.score
                );
            }
        }
    }
}

#[test]
fn test_self_similarity() {
    for (name, index) in both_backends() {
        let corpus = random_corpus(11, 40, 24);
        let originals: Vec<(String, Vec<f64>)> = corpus
            .iter()
            .map(|it| (it.id.clone(), it.vector.clone()))
            .collect();
        index.upsert(corpus);

        for (id, vector) in originals {
            // Scaling the query must not change the answer
            let scaled: Vec<f64> = vector.iter().map(|x| x * 3.5).collect();
            let hits = index.query(&scaled, 1).unwrap();
            assert_eq!(hits[0].id, id, "{name}");
            assert!((hits[0].score - 1.0).abs() < 1e-5, "{name}");
            assert!(hits[0].score <= 1.0, "{name} score {}", hits[0].score);
        }
    }
}

#[test]
fn test_self_scores_never_exceed_one() {
    for (name, index) in both_backends() {
        let corpus = random_corpus(21, 500, 384);
        let vectors: Vec<Vec<f64>> = corpus.iter().map(|it| it.vector.clone()).collect();
        index.upsert(corpus);

        for vector in vectors {
            let hits = index.query(&vector, 1).unwrap();
            assert!(hits[0].score <= 1.0, "{name} score {}", hits[0].score);
            assert!(hits[0].score > 1.0 - 1e-5, "{name} score {}", hits[0].score);
        }
    }
}

#[test]
fn test_extreme_magnitudes_are_stored_unit_length() {
    for (name, index) in both_backends() {
        let report = index.upsert(vec![
            item("huge", vec![1e200, 0.0]),
            item("tiny", vec![0.0, 1e-200]),
        ]);
        assert_eq!(report.count, 2, "{name}");

        let hits = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "huge", "{name}");
        assert!((hits[0].score - 1.0).abs() < 1e-6, "{name}");

        let hits = index.query(&[0.0, 1.0], 2).unwrap();
        assert_eq!(hits[0].id, "tiny", "{name}");
        assert!((hits[0].score - 1.0).abs() < 1e-6, "{name}");

        // Queries at the same extremes
        let hits = index.query(&[0.0, 1e-250], 1).unwrap();
        assert_eq!(hits[0].id, "tiny", "{name}");
        assert!((hits[0].score - 1.0).abs() < 1e-6, "{name}");
    }
}

#[test]
fn test_zero_scores_keep_insertion_order() {
    for (name, index) in both_backends() {
        index.upsert(vec![
            item("negative-zero", vec![-1.0, -0.0]),
            item("positive-zero", vec![1.0, 0.0]),
        ]);

        let hits = index.query(&[0.0, 1.0], 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["negative-zero", "positive-zero"], "{name}");
    }
}

#[test]
fn test_backend_equivalence_on_random_corpora() {
    for seed in 0..10u64 {
        let dim = 8 + (seed as usize % 5) * 8;
        let memory = VectorIndex::with_provider(Arc::new(MemoryOnly));
        let accelerated = VectorIndex::with_provider(Arc::new(FlatIpProvider::default()));

        let corpus = random_corpus(seed, 200, dim);
        memory.upsert(corpus.clone());
        accelerated.upsert(corpus);
        assert_eq!(memory.backend(), BackendKind::Memory);
        assert_eq!(accelerated.backend(), BackendKind::Accelerated);

        let mut rng = StdRng::seed_from_u64(seed + 1000);
        for _ in 0..10 {
            let q = random_vector(&mut rng, dim);
            let a = memory.query(&q, 10).unwrap();
            let b = accelerated.query(&q, 10).unwrap();

            assert_eq!(a.len(), b.len());
            for (i, (x, y)) in a.iter().zip(&b).enumerate() {
                assert!((x.score - y.score).abs() < 1e-5, "seed {seed}");
                // f32 rows may only swap near-ties
                let isolated = i + 1 < a.len()
                    && a
                    .iter()
                    .enumerate()
                    .all(|(j, other)| j == i || (other.score - x.score).abs() > 1e-4);
                if isolated {
                    assert_eq!(x.id, y.id, "seed {seed} rank {i}");
                }
            }
        }
    }
}

#[test]
fn test_equal_scores_keep_insertion_order() {
    for (name, index) in both_backends() {
        index.upsert(vec![
            item("first", vec![1.0, 0.0]),
            item("orthogonal", vec![0.0, 1.0]),
            item("second", vec![2.0, 0.0]),
        ]);
        index.upsert(vec![item("third", vec![0.5, 0.0])]);

        let hits = index.query(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"], "{name}");
    }
}

// ============== Backend degradation ==============

struct BrokenProvider;

impl BackendProvider for BrokenProvider {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn create(&self, _dim: usize) -> Result<Box<dyn AcceleratedIndex>, BackendError> {
        Err(BackendError::Unavailable("library failed to load".into()))
    }
}

#[test]
fn test_failed_init_settles_on_memory_until_reset() {
    let index = VectorIndex::with_provider(Arc::new(BrokenProvider));
    let report = index.upsert(random_corpus(5, 5, 4));
    assert_eq!(report.backend, BackendKind::Memory);
    assert_eq!(index.backend(), BackendKind::Memory);
    assert_eq!(index.query(&[1.0, 0.0, 0.0, 0.0], 3).unwrap().len(), 3);

    index.reset();
    assert_eq!(index.backend(), BackendKind::Uninitialized);
}

/// Flat index whose searches fail after the first `healthy` calls.
struct FlakySearch {
    inner: FlatIpIndex,
    healthy: usize,
    calls: Arc<AtomicUsize>,
}

impl AcceleratedIndex for FlakySearch {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn add(&mut self, rows: &[f32]) -> Result<(), BackendError> {
        self.inner.add(rows)
    }

    fn truncate(&mut self, len: usize) {
        self.inner.truncate(len)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, BackendError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.healthy {
            return Err(BackendError::Unavailable("device lost".into()));
        }
        self.inner.search(query, k)
    }
}

struct FlakyProvider {
    calls: Arc<AtomicUsize>,
}

impl BackendProvider for FlakyProvider {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn create(&self, dim: usize) -> Result<Box<dyn AcceleratedIndex>, BackendError> {
        Ok(Box::new(FlakySearch {
            inner: FlatIpIndex::new(dim),
            healthy: 1,
            calls: self.calls.clone(),
        }))
    }
}

#[test]
fn test_runtime_search_failure_degrades_single_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let index = VectorIndex::with_provider(Arc::new(FlakyProvider {
        calls: calls.clone(),
    }));
    index.upsert(vec![
        item("x", vec![1.0, 0.0]),
        item("y", vec![0.0, 1.0]),
    ]);

    let healthy = index.query(&[0.0, 1.0], 1).unwrap();
    let degraded = index.query(&[0.0, 1.0], 1).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(healthy[0].id, "y");
    assert_eq!(degraded[0].id, "y");
    // State machine untouched by the failure
    assert_eq!(index.backend(), BackendKind::Accelerated);
}

#[test]
fn test_failed_append_is_served_from_memory() {
    let index = VectorIndex::with_provider(Arc::new(FlatIpProvider::with_max_rows(2)));

    let first = index.upsert(vec![
        item("a", vec![1.0, 0.0, 0.0]),
        item("b", vec![0.0, 1.0, 0.0]),
    ]);
    assert_eq!(first.backend, BackendKind::Accelerated);

    let second = index.upsert(vec![item("c", vec![0.0, 0.0, 1.0])]);
    assert_eq!(second.count, 1);
    assert_eq!(second.backend, BackendKind::Memory);
    assert_eq!(index.backend(), BackendKind::Accelerated);
    assert_eq!(index.count(), 3);

    // The overflowed record is still found
    let hits = index.query(&[0.0, 0.0, 1.0], 1).unwrap();
    assert_eq!(hits[0].id, "c");
    assert!((hits[0].score - 1.0).abs() < 1e-9);
}

/// Accepts the first append, rejects the second, then accepts again.
struct HiccupIndex {
    inner: FlatIpIndex,
    adds: usize,
}

impl AcceleratedIndex for HiccupIndex {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn add(&mut self, rows: &[f32]) -> Result<(), BackendError> {
        self.adds += 1;
        if self.adds == 2 {
            return Err(BackendError::Allocation {
                rows: rows.len() / self.inner.dim(),
            });
        }
        self.inner.add(rows)
    }

    fn truncate(&mut self, len: usize) {
        self.inner.truncate(len)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, BackendError> {
        self.inner.search(query, k)
    }
}

struct HiccupProvider;

impl BackendProvider for HiccupProvider {
    fn name(&self) -> &'static str {
        "hiccup"
    }

    fn create(&self, dim: usize) -> Result<Box<dyn AcceleratedIndex>, BackendError> {
        Ok(Box::new(HiccupIndex {
            inner: FlatIpIndex::new(dim),
            adds: 0,
        }))
    }
}

#[test]
fn test_missed_rows_catch_up_on_next_upsert() {
    let index = VectorIndex::with_provider(Arc::new(HiccupProvider));

    assert_eq!(
        index.upsert(vec![item("a", vec![1.0, 0.0])]).backend,
        BackendKind::Accelerated
    );
    assert_eq!(
        index.upsert(vec![item("b", vec![0.0, 1.0])]).backend,
        BackendKind::Memory
    );
    // Third append carries "b" and "c" together
    assert_eq!(
        index.upsert(vec![item("c", vec![0.6, -0.8])]).backend,
        BackendKind::Accelerated
    );

    let hits = index.query(&[0.0, 1.0], 3).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
}

// ============== Concurrency ==============

#[test]
fn test_concurrent_upserts_and_queries() {
    let index = Arc::new(VectorIndex::new());
    let dim = 16;
    let writers = 4;
    let batches = 25;
    let batch_size = 8;

    std::thread::scope(|scope| {
        for w in 0..writers {
            let index = index.clone();
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(w as u64);
                for b in 0..batches {
                    let items = (0..batch_size)
                        .map(|i| item(&format!("w{w}-b{b}-{i}"), random_vector(&mut rng, dim)))
                        .collect();
                    let report = index.upsert(items);
                    assert_eq!(report.count, batch_size);
                }
            });
        }

        for r in 0..4u64 {
            let index = index.clone();
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(100 + r);
                let mut last_count = 0;
                for _ in 0..200 {
                    let count = index.count();
                    assert!(count >= last_count, "count went backwards");
                    assert_eq!(count % batch_size, 0, "observed a partial batch");
                    last_count = count;

                    let hits = index.query(&random_vector(&mut rng, dim), 5).unwrap();
                    assert!(hits.len() <= 5);
                    for pair in hits.windows(2) {
                        assert!(pair[0].score >= pair[1].score);
                    }
                }
            });
        }
    });

    assert_eq!(index.count(), writers * batches * batch_size);
}
