//! Local feature-hashing embedder.
//!
//! Each word is padded with spaces and split into character trigrams; every
//! trigram is hashed into one of `dimensions` buckets and the resulting count
//! vector is L2-normalized. Case and typo variants of a phrase share most of
//! their trigrams, which is enough for fuzzy course-title matching offline and
//! in tests. Texts with no trigram in common score zero unless buckets collide.

use super::Embedder;
use crate::error::{KursdeskError, Result};
use async_trait::async_trait;

/// Deterministic, dependency-free embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let normalized: String = text
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .to_lowercase();

        for word in normalized.split_whitespace() {
            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for trigram in padded.windows(3) {
                let bucket = (fnv1a(trigram) % self.dimensions as u64) as usize;
                vector[bucket] += 1.0;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(512)
    }
}

/// 64-bit FNV-1a over the UTF-8 bytes of the trigram.
fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut buf = [0u8; 4];
    for c in chars {
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.dimensions == 0 {
            return Err(KursdeskError::Embedding("zero-dimensional embedder".to_string()));
        }
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
