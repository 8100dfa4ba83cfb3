//! Embedding provider trait and implementations
use ahash::AHashMap;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Whether the collaborator itself is gone, as opposed to one input failing.
    ///
    /// Indexing skips chunks on non-fatal errors and aborts on fatal ones.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EmbeddingError::InitializationError(_) | EmbeddingError::Unavailable(_)
        )
    }
}

/// Trait for embedding providers
///
/// Allows abstraction over different embedding backends (FastEmbed, remote
/// services, feature hashing).
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// FastEmbed provider for local embedding generation
///
/// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
/// Runs fully on-device with no API calls.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// **Important**: Models are downloaded on-demand to `~/.cache/huggingface/`
    /// on first use. The smallest model (all-MiniLM-L6-v2) is ~90MB.
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension, model_size_mb) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384, 90),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384, 130),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768, 440),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Initializing embedding model: {} ({}D, ~{}MB download if not cached)",
            model_name,
            dimension,
            model_size_mb
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?;

        let embedding = embeddings.into_iter().next().ok_or_else(|| {
            EmbeddingError::GenerationError("No embeddings generated".to_string())
        })?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Feature-hashing provider
///
/// Each lowercase alphanumeric term is hashed (BLAKE3) into a signed bucket
/// and weighted by its frequency; the result is L2-normalised. Texts sharing
/// vocabulary score positively, unrelated texts land near zero. No model
/// download, fully deterministic.
pub struct HashEmbedProvider {
    dimension: usize,
}

impl HashEmbedProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, term: &str) -> (usize, f32) {
        let hash = blake3::hash(term.as_bytes());
        let bytes = hash.as_bytes();
        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&bytes[..8]);
        let index = (u64::from_le_bytes(index_bytes) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl EmbeddingProvider for HashEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let lowered = text.to_lowercase();
        let mut frequencies: AHashMap<&str, f32> = AHashMap::new();
        for term in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *frequencies.entry(term).or_insert(0.0) += 1.0;
        }

        if frequencies.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Text contains no terms".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimension];
        for (term, count) in frequencies {
            let (index, sign) = self.bucket(term);
            vector[index] += sign * count;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_provider_creation() {
        let provider = FastEmbedProvider::with_default_model();
        assert!(provider.is_ok());

        let provider = provider.unwrap();
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_semantic_similarity() {
        let provider = FastEmbedProvider::with_default_model().unwrap();

        let emb1 = provider.embed("The derivative of x squared is two x.").unwrap();
        let emb2 = provider.embed("Differentiating x^2 gives 2x.").unwrap();
        let emb3 = provider.embed("The French Revolution began in 1789.").unwrap();

        assert!(cosine_similarity(&emb1, &emb2) > cosine_similarity(&emb1, &emb3));
    }

    #[test]
    fn test_unsupported_model() {
        let result = FastEmbedProvider::new("not-a-model");
        assert!(matches!(result, Err(EmbeddingError::InitializationError(_))));
    }

    #[test]
    fn test_hash_embedding_is_normalized_and_deterministic() {
        let provider = HashEmbedProvider::new(256);
        let a = provider.embed("Mitochondria produce ATP for the cell").unwrap();
        let b = provider.embed("Mitochondria produce ATP for the cell").unwrap();

        assert_eq!(a.len(), 256);
        assert_eq!(a, b);

        let magnitude: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedding_ignores_case_and_punctuation() {
        let provider = HashEmbedProvider::new(256);
        let a = provider.embed("Newton's second law").unwrap();
        let b = provider.embed("newton S SECOND law!").unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedding_shared_vocabulary_scores_higher() {
        let provider = HashEmbedProvider::new(1024);
        let doc = provider
            .embed("Photosynthesis converts light energy into chemical energy in the chloroplast")
            .unwrap();
        let related = provider.embed("chloroplast photosynthesis").unwrap();
        let unrelated = provider.embed("medieval castle").unwrap();

        assert!(cosine_similarity(&doc, &related) > 0.3);
        assert!(cosine_similarity(&doc, &related) > cosine_similarity(&doc, &unrelated));
    }

    #[test]
    fn test_hash_embedding_rejects_empty_text() {
        let provider = HashEmbedProvider::new(32);
        assert!(matches!(
            provider.embed("  ?! "),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EmbeddingError::Unavailable("offline".into()).is_fatal());
        assert!(!EmbeddingError::GenerationError("bad chunk".into()).is_fatal());
        assert!(!EmbeddingError::InvalidInput("empty".into()).is_fatal());
    }
}
