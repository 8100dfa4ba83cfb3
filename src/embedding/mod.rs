//! Embedding & chunking
//!
//! This module turns course documents into embeddable chunks and vectors.
//! Architecture:
//! - EmbeddingProvider trait for abstraction over the embedding collaborator
//! - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
//! - HashEmbedProvider for deterministic offline vectors
//! - TextChunker for overlapping, size-bounded windows
mod chunker;
mod provider;

pub use chunker::TextChunker;
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, HashEmbedProvider};

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Cosine similarity between two vectors, in [-1, 1].
///
/// Returns 0.0 when either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

/// Build the provider selected by `embedding.mode`
pub fn provider_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.mode.as_str() {
        "offline" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        "hash" => Ok(Arc::new(HashEmbedProvider::new(config.dimension))),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding mode: {}",
            other
        ))),
    }
}
