//! Deterministic hash embedding
//!
//! Bag-of-tokens counts hashed into `dims` buckets, then L2-normalized. No
//! randomness and no external state, so the same `(text, dims)` gives the same
//! vector across calls and across processes.
//!
//! Tokenization lower-cases the text and splits on runs of characters outside
//! `[A-Za-z0-9_]`. Each token is hashed over its UTF-16 code units with a
//! 32-bit FNV-1a style round: `h ^= unit; h += (h<<1)+(h<<4)+(h<<7)+(h<<8)+(h<<24)`.
//! The running state wraps to 32 bits between units, but the bucket is taken
//! from the absolute value of the final, un-wrapped sum.

/// Dimensionality used when no remote model decides it.
pub const DEFAULT_FALLBACK_DIMS: usize = 384;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const MIX_SHIFTS: [u32; 5] = [1, 4, 7, 8, 24];

/// Lower-cased word tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Rolling hash of one token, before the final wrap.
fn token_hash(token: &str) -> i64 {
    let mut state = FNV_OFFSET_BASIS as i32;
    let mut last = i64::from(state);

    for unit in token.encode_utf16() {
        let x = state ^ i32::from(unit);
        let mixed: i64 = MIX_SHIFTS
            .iter()
            .map(|&s| i64::from(x.wrapping_shl(s)))
            .sum();
        last = i64::from(x) + mixed;
        // Low 32 bits, two's complement
        state = last as i32;
    }

    last
}

/// Bucket in `[0, dims)` for `token`. `dims` must be non-zero.
pub fn token_bucket(token: &str, dims: usize) -> usize {
    (token_hash(token).unsigned_abs() % dims as u64) as usize
}

/// Hash-embed `text` into a unit vector of length `dims`.
///
/// Text without any word token maps to the zero vector. `dims == 0` yields an
/// empty vector.
pub fn hash_embed(text: &str, dims: usize) -> Vec<f64> {
    let mut counts = vec![0.0f64; dims];
    if dims == 0 {
        return counts;
    }

    for token in tokenize(text) {
        counts[token_bucket(&token, dims)] += 1.0;
    }

    crate::normalize(&mut counts);
    counts
}
