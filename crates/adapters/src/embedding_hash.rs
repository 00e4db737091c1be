//! Deterministic content-hash embedding.
//!
//! The default embedding capability: token hashes bucketed into a fixed-size
//! vector, L2-normalized. Deterministic across processes, which keeps
//! snapshots and tests stable. Real deployments plug a model-backed
//! implementation in through the same port.

use embranch_ports::{BoxFuture, EmbeddingPort, EmbeddingVector};
use embranch_shared::{RequestContext, Result};
use sha2::{Digest, Sha256};

/// Default embedding dimension.
pub const DEFAULT_HASH_DIMENSION: u32 = 256;

/// Hash-based embedding adapter.
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: u32,
}

impl HashEmbedding {
    /// Create an embedder with the given dimension (minimum 8).
    #[must_use]
    pub fn new(dimension: u32) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension as usize];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_be_bytes([
                digest.first().copied().unwrap_or(0),
                digest.get(1).copied().unwrap_or(0),
                digest.get(2).copied().unwrap_or(0),
                digest.get(3).copied().unwrap_or(0),
            ]) % self.dimension;
            let sign = if digest.get(4).copied().unwrap_or(0) & 1 == 0 {
                1.0
            } else {
                -1.0
            };
            if let Some(slot) = vector.get_mut(bucket as usize) {
                *slot += sign;
            }
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

impl EmbeddingPort for HashEmbedding {
    fn function_name(&self) -> &str {
        "hash-v1"
    }

    fn dimension(&self) -> u32 {
        self.dimension
    }

    fn embed_batch(
        &self,
        ctx: &RequestContext,
        texts: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("embedding.embed_batch")?;
            Ok(texts
                .iter()
                .map(|text| EmbeddingVector::from_vec(self.embed_one(text)))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let embedder = HashEmbedding::default();
        let ctx = RequestContext::new_request();
        let first = embedder
            .embed_batch(&ctx, vec!["The quick brown fox".to_owned()])
            .await
            .expect("embed");
        let second = embedder
            .embed_batch(&ctx, vec!["The quick brown fox".to_owned()])
            .await
            .expect("embed");
        assert_eq!(
            first.first().map(EmbeddingVector::as_slice),
            second.first().map(EmbeddingVector::as_slice)
        );
    }

    #[tokio::test]
    async fn similar_texts_score_closer_than_unrelated() {
        let embedder = HashEmbedding::default();
        let ctx = RequestContext::new_request();
        let vectors = embedder
            .embed_batch(
                &ctx,
                vec![
                    "rust borrow checker ownership".to_owned(),
                    "rust ownership and the borrow checker".to_owned(),
                    "banana smoothie recipe".to_owned(),
                ],
            )
            .await
            .expect("embed");

        let dot = |a: &EmbeddingVector, b: &EmbeddingVector| -> f32 {
            a.as_slice()
                .iter()
                .zip(b.as_slice())
                .map(|(x, y)| x * y)
                .sum()
        };

        let query = vectors.first().expect("query vector");
        let near = vectors.get(1).expect("near vector");
        let far = vectors.get(2).expect("far vector");
        assert!(dot(query, near) > dot(query, far));
    }

    #[test]
    fn vectors_are_normalized() {
        let embedder = HashEmbedding::default();
        let vector = embedder.embed_one("some text to embed");
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
