//! Deterministic hash-based encoder.
//!
//! Stands in for a real text model in the CLI and in tests: every
//! whitespace-separated token becomes one row of `dim` values derived from
//! an FNV-1a hash, so equal text always yields equal conditioning.

use std::convert::Infallible;

use serde::Serialize;

use crate::encode::{AsyncTextEncoder, EncodeFuture, TextEncoder};

/// A sequence of token embeddings plus a pooled summary vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceEmbedding {
    /// One row per token, each of the same width.
    pub rows: Vec<Vec<f32>>,
    /// Pooled output of the first encoded part.
    pub pooled: Vec<f32>,
}

impl SequenceEmbedding {
    /// Append `tail`'s rows after ours. The pooled output of `self` is kept.
    pub fn concat_sequence(mut self, tail: SequenceEmbedding) -> Self {
        self.rows.extend(tail.rows);
        self
    }

    /// Sequence length.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row width (0 for an empty sequence).
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

/// Encoder producing [`SequenceEmbedding`]s from token hashes.
#[derive(Debug, Clone)]
pub struct HashEncoder {
    dim: usize,
}

impl HashEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> SequenceEmbedding {
        let mut rows: Vec<Vec<f32>> = text.split_whitespace().map(|t| self.row(t)).collect();
        if rows.is_empty() {
            rows.push(self.row(""));
        }
        let mut pooled = vec![0.0f32; self.dim];
        for row in &rows {
            for (p, v) in pooled.iter_mut().zip(row) {
                *p += v;
            }
        }
        let n = rows.len() as f32;
        pooled.iter_mut().for_each(|p| *p /= n);
        SequenceEmbedding { rows, pooled }
    }

    fn row(&self, token: &str) -> Vec<f32> {
        let seed = fnv1a(token.as_bytes(), FNV_OFFSET);
        (0..self.dim)
            .map(|i| {
                let h = fnv1a(&(i as u64).to_le_bytes(), seed);
                // Top 24 bits mapped onto [-1, 1).
                ((h >> 40) as f32 / (1u64 << 23) as f32) - 1.0
            })
            .collect()
    }
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self::new(8)
    }
}

impl TextEncoder for HashEncoder {
    type Conditioning = SequenceEmbedding;
    type Error = Infallible;

    fn encode(&self, text: &str) -> Result<SequenceEmbedding, Infallible> {
        Ok(self.embed(text))
    }

    fn concat(
        &self,
        head: SequenceEmbedding,
        tail: SequenceEmbedding,
    ) -> Result<SequenceEmbedding, Infallible> {
        Ok(head.concat_sequence(tail))
    }
}

impl AsyncTextEncoder for HashEncoder {
    type Conditioning = SequenceEmbedding;
    type Error = Infallible;

    fn encode<'a>(&'a self, text: &'a str) -> EncodeFuture<'a, SequenceEmbedding, Infallible> {
        Box::pin(async move { Ok(self.embed(text)) })
    }

    fn concat(
        &self,
        head: SequenceEmbedding,
        tail: SequenceEmbedding,
    ) -> Result<SequenceEmbedding, Infallible> {
        Ok(head.concat_sequence(tail))
    }
}

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8], seed: u64) -> u64 {
    let mut hash = seed;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_row_per_token() {
        let encoder = HashEncoder::new(4);
        let e = TextEncoder::encode(&encoder, "a red fox").unwrap();
        assert_eq!(e.len(), 3);
        assert_eq!(e.width(), 4);
        assert_eq!(e.pooled.len(), 4);
    }

    #[test]
    fn empty_text_still_has_a_row() {
        let encoder = HashEncoder::default();
        let e = TextEncoder::encode(&encoder, "   ").unwrap();
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn deterministic_and_text_sensitive() {
        let encoder = HashEncoder::new(6);
        let a = TextEncoder::encode(&encoder, "cat").unwrap();
        let b = TextEncoder::encode(&encoder, "cat").unwrap();
        let c = TextEncoder::encode(&encoder, "dog").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.rows[0].iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn concat_keeps_head_pooled() {
        let encoder = HashEncoder::new(3);
        let head = TextEncoder::encode(&encoder, "a b").unwrap();
        let tail = TextEncoder::encode(&encoder, "c").unwrap();
        let pooled = head.pooled.clone();
        let joined = TextEncoder::concat(&encoder, head, tail).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.pooled, pooled);
    }

    #[test]
    fn zero_dim_is_clamped() {
        assert_eq!(HashEncoder::new(0).dim(), 1);
    }

    #[test]
    fn fnv_deterministic() {
        assert_eq!(fnv1a(b"prompt", FNV_OFFSET), fnv1a(b"prompt", FNV_OFFSET));
        assert_ne!(fnv1a(b"prompt", FNV_OFFSET), fnv1a(b"prompts", FNV_OFFSET));
    }
}
