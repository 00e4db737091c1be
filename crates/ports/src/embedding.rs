//! Embedding boundary contract.
//!
//! The embedding function is an opaque pluggable capability; the store only
//! needs deterministic vectors of a fixed dimension.

use crate::BoxFuture;
use embranch_shared::{RequestContext, Result};
use std::sync::Arc;

/// An embedding vector payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    vector: Arc<[f32]>,
}

impl EmbeddingVector {
    /// Build an embedding vector from an owned vector.
    #[must_use]
    pub fn from_vec(vector: Vec<f32>) -> Self {
        Self {
            vector: Arc::from(vector),
        }
    }

    /// Borrow the vector as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    /// Return the embedding dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Boundary contract for producing embeddings.
pub trait EmbeddingPort: Send + Sync {
    /// Stable tag recorded in collection configuration.
    fn function_name(&self) -> &str;

    /// Dimensionality of produced vectors.
    fn dimension(&self) -> u32;

    /// Embed a batch of texts, one vector per input, preserving order.
    fn embed_batch(
        &self,
        ctx: &RequestContext,
        texts: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>>;
}
