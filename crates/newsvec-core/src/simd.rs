//! Vector math kernels
//!
//! Two precisions live here:
//!
//! - `f64` helpers back the record store and the linear-scan backend. Stored
//!   vectors keep full precision so normalization stays idempotent to 1e-9.
//! - `f32` dot product backs the flat inner-product backend, with explicit
//!   NEON (aarch64) and AVX2+FMA (x86_64) paths and a scalar fallback.
//!
//! For unit vectors the inner product is the cosine similarity:
//! ```text
//! cos(θ) = A · B  when ||A|| = ||B|| = 1
//! ```

// ============================================================================
// f32 kernels (flat backend)
// ============================================================================

#[cfg(target_arch = "aarch64")]
#[inline(always)]
unsafe fn dot_product_neon(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::aarch64::*;

    let lanes = a.len() / 4;
    let mut acc = vdupq_n_f32(0.0);

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..lanes {
        let va = vld1q_f32(a_ptr.add(i * 4));
        let vb = vld1q_f32(b_ptr.add(i * 4));
        acc = vfmaq_f32(acc, va, vb);
    }

    let mut sum = vaddvq_f32(acc);
    for i in lanes * 4..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
#[inline]
unsafe fn dot_product_avx2(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::x86_64::*;

    let lanes = a.len() / 8;
    let mut acc = _mm256_setzero_ps();

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..lanes {
        let va = _mm256_loadu_ps(a_ptr.add(i * 8));
        let vb = _mm256_loadu_ps(b_ptr.add(i * 8));
        acc = _mm256_fmadd_ps(va, vb, acc);
    }

    // Horizontal sum of 8 lanes
    let hi = _mm256_extractf128_ps(acc, 1);
    let lo = _mm256_castps256_ps128(acc);
    let sum128 = _mm_add_ps(lo, hi);
    let shuf = _mm_movehdup_ps(sum128);
    let sums = _mm_add_ps(sum128, shuf);
    let shuf2 = _mm_movehl_ps(sums, sums);
    let mut sum = _mm_cvtss_f32(_mm_add_ss(sums, shuf2));

    for i in lanes * 8..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

#[inline(always)]
fn dot_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Dot product of two `f32` slices of equal length.
///
/// Uses NEON on aarch64, AVX2+FMA on x86_64 when detected at runtime, and an
/// auto-vectorized scalar loop otherwise.
#[inline(always)]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector length mismatch");

    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { dot_product_neon(a, b) };
    }

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return unsafe { dot_product_avx2(a, b) };
        }
    }

    #[allow(unreachable_code)]
    dot_product_scalar(a, b)
}

/// Narrow an `f64` vector into the flat backend's row format.
pub fn to_f32(v: &[f64]) -> Vec<f32> {
    v.iter().map(|&x| x as f32).collect()
}

// ============================================================================
// f64 helpers (record store, linear scan)
// ============================================================================

/// Inner product of two `f64` slices of equal length.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector length mismatch");

    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `(scale, sum)` with `scale = max|x|` and `sum = Σ (x / scale)²`, so
/// `||v|| = scale · √sum` without overflowing or underflowing on finite input.
fn scaled_sum_sq(v: &[f64]) -> (f64, f64) {
    let scale = v.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    if scale == 0.0 {
        return (0.0, 0.0);
    }
    let sum = v.iter().map(|x| (x / scale) * (x / scale)).sum();
    (scale, sum)
}

/// Return `v / ||v||`.
///
/// A zero norm is treated as 1, so the zero vector maps to itself. Components
/// are divided by the largest magnitude first, which keeps `[1e200, 0]` and
/// `[0, 1e-200]` unit length after normalization.
pub fn l2_normalized(v: &[f64]) -> Vec<f64> {
    let (scale, sum) = scaled_sum_sq(v);
    if scale == 0.0 {
        return v.to_vec();
    }
    let n = sum.sqrt();
    v.iter().map(|x| (x / scale) / n).collect()
}

/// True when every component is a finite number.
#[inline]
pub fn all_finite(v: &[f64]) -> bool {
    v.iter().all(|x| x.is_finite())
}
