//! Document indexing and context lookup

use super::context::RetrievedContext;
use crate::config::RetrievalConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider, TextChunker};
use crate::error::Result;
use crate::storage::{content_hash, Chunk, DocumentRecord, DocumentType, StoreStats, VectorStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of indexing one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub chunks_indexed: usize,
    /// Chunks dropped because their embedding failed
    pub chunks_skipped: usize,
    pub duration_ms: u64,
}

/// Indexes course documents and answers "what material is relevant to this?"
pub struct RetrievalService {
    store: Arc<VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(
        store: Arc<VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            provider,
            chunker: TextChunker::from_config(&config),
            config,
        }
    }

    /// Chunk, embed and store a document, replacing any previous version.
    ///
    /// Text shorter than `min_document_length` is not indexed, and any earlier
    /// version of the document is removed. A chunk whose
    /// embedding fails is skipped; an unavailable embedding service aborts the
    /// whole call and leaves the stored document untouched.
    pub async fn index_document(
        &self,
        document_id: &str,
        document_type: DocumentType,
        course_id: &str,
        text: &str,
    ) -> Result<IndexReport> {
        let started = Instant::now();

        if text.chars().count() < self.config.min_document_length {
            tracing::debug!(
                "Document {} is below {} chars, not indexing",
                document_id,
                self.config.min_document_length
            );
            let removed = self.store.delete_document(document_id)?;
            if removed > 0 {
                tracing::info!(
                    "Removed {} stale chunks of document {}",
                    removed,
                    document_id
                );
            }
            return Ok(IndexReport::default());
        }

        let pieces = self.chunker.split(text);
        let mut chunks = Vec::with_capacity(pieces.len());
        let mut skipped = 0;

        for piece in pieces {
            match self.embed(piece.clone()).await {
                Ok(embedding) => {
                    let sequence_index = chunks.len() as u32;
                    chunks.push(Chunk::new(
                        document_id,
                        course_id,
                        document_type,
                        piece,
                        embedding,
                        sequence_index,
                    ));
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Embedding service failed while indexing {}: {}", document_id, e);
                    return Err(e.into());
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping chunk of document {}: {}", document_id, e);
                }
            }
        }

        let record = DocumentRecord {
            document_id: document_id.to_string(),
            course_id: course_id.to_string(),
            document_type,
            content_hash: content_hash(text),
            chunk_count: chunks.len(),
            indexed_at: Utc::now(),
        };
        self.store.replace_document(&record, &chunks)?;

        let report = IndexReport {
            chunks_indexed: chunks.len(),
            chunks_skipped: skipped,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Indexed document {} ({}) for course {}: {} chunks, {} skipped in {}ms",
            document_id,
            document_type,
            course_id,
            report.chunks_indexed,
            report.chunks_skipped,
            report.duration_ms
        );

        Ok(report)
    }

    /// Most relevant course material for `query`, within `max_tokens`.
    ///
    /// A failed query embedding is returned as an error.
    pub async fn get_context(
        &self,
        query: &str,
        course_id: &str,
        max_tokens: usize,
    ) -> Result<RetrievedContext> {
        if query.trim().is_empty() {
            return Ok(RetrievedContext::empty());
        }

        let query_embedding = self.embed(query.to_string()).await?;
        let hits = self
            .store
            .nearest(&query_embedding, course_id, self.config.top_k)?;
        let context = RetrievedContext::assemble(hits, max_tokens);

        tracing::debug!(
            "Context for course {}: {} chunks (budget {} tokens)",
            course_id,
            context.chunk_count,
            max_tokens
        );

        Ok(context)
    }

    /// [`get_context`](Self::get_context) with the configured token budget
    pub async fn get_context_default(&self, query: &str, course_id: &str) -> Result<RetrievedContext> {
        self.get_context(query, course_id, self.config.max_context_tokens)
            .await
    }

    pub fn delete_document(&self, document_id: &str) -> Result<()> {
        let removed = self.store.delete_document(document_id)?;
        tracing::info!("Deleted document {} ({} chunks)", document_id, removed);
        Ok(())
    }

    pub fn delete_course(&self, course_id: &str) -> Result<()> {
        let removed = self.store.delete_course(course_id)?;
        tracing::info!("Deleted course {} ({} chunks)", course_id, removed);
        Ok(())
    }

    pub fn is_document_indexed(&self, document_id: &str) -> Result<bool> {
        Ok(self.store.chunk_count(document_id)? > 0)
    }

    pub fn chunk_count(&self, document_id: &str) -> Result<usize> {
        self.store.chunk_count(document_id)
    }

    /// Whether `text`, course or type differ from what was last indexed for
    /// `document_id`
    pub fn needs_reindex(
        &self,
        document_id: &str,
        document_type: DocumentType,
        course_id: &str,
        text: &str,
    ) -> Result<bool> {
        Ok(match self.store.document(document_id)? {
            Some(record) => {
                record.content_hash != content_hash(text)
                    || record.course_id != course_id
                    || record.document_type != document_type
            }
            None => true,
        })
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    async fn embed(&self, text: String) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || provider.embed(&text))
            .await
            .map_err(|e| EmbeddingError::Unavailable(format!("Embedding task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedProvider;
    use tempfile::TempDir;

    fn service() -> (TempDir, RetrievalService) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(VectorStore::open(&temp.path().join("index.db")).unwrap());
        let provider = Arc::new(HashEmbedProvider::new(512));
        (temp, RetrievalService::new(store, provider, RetrievalConfig::default()))
    }

    const LIMITS: &str = "A limit describes the value a function approaches as the input \
        approaches some point. Limits are the foundation of derivatives and integrals in calculus. ";

    #[tokio::test]
    async fn test_short_document_is_not_indexed() {
        let (_temp, service) = service();
        let report = service
            .index_document("doc", DocumentType::Notes, "calc", "Too short.")
            .await
            .unwrap();

        assert_eq!(report.chunks_indexed, 0);
        assert!(!service.is_document_indexed("doc").unwrap());
    }

    #[tokio::test]
    async fn test_reindex_replaces_chunks() {
        let (_temp, service) = service();
        let text = LIMITS.repeat(8);

        let first = service
            .index_document("doc", DocumentType::Notes, "calc", &text)
            .await
            .unwrap();
        let second = service
            .index_document("doc", DocumentType::Notes, "calc", &text)
            .await
            .unwrap();

        assert!(first.chunks_indexed > 1);
        assert_eq!(first.chunks_indexed, second.chunks_indexed);
        assert_eq!(service.chunk_count("doc").unwrap(), second.chunks_indexed);
    }

    #[tokio::test]
    async fn test_needs_reindex_tracks_content() {
        let (_temp, service) = service();
        let text = LIMITS.repeat(3);

        assert!(service
            .needs_reindex("doc", DocumentType::Textbook, "calc", &text)
            .unwrap());
        service
            .index_document("doc", DocumentType::Textbook, "calc", &text)
            .await
            .unwrap();
        assert!(!service
            .needs_reindex("doc", DocumentType::Textbook, "calc", &text)
            .unwrap());
        assert!(service
            .needs_reindex("doc", DocumentType::Textbook, "calc", &LIMITS.repeat(4))
            .unwrap());
    }

    #[tokio::test]
    async fn test_needs_reindex_on_course_or_type_change() {
        let (_temp, service) = service();
        let text = LIMITS.repeat(3);
        service
            .index_document("doc", DocumentType::Textbook, "calc", &text)
            .await
            .unwrap();

        assert!(service
            .needs_reindex("doc", DocumentType::Textbook, "calc2", &text)
            .unwrap());
        assert!(service
            .needs_reindex("doc", DocumentType::Notes, "calc", &text)
            .unwrap());
    }

    #[tokio::test]
    async fn test_short_reindex_clears_previous_chunks() {
        let (_temp, service) = service();
        service
            .index_document("doc", DocumentType::Notes, "calc", &LIMITS.repeat(12))
            .await
            .unwrap();
        assert!(service.chunk_count("doc").unwrap() > 0);

        let report = service
            .index_document("doc", DocumentType::Notes, "calc", "tiny")
            .await
            .unwrap();

        assert_eq!(report.chunks_indexed, 0);
        assert_eq!(service.chunk_count("doc").unwrap(), 0);
        assert!(!service.is_document_indexed("doc").unwrap());
        assert_eq!(service.stats().unwrap().document_count, 0);
    }

    #[tokio::test]
    async fn test_empty_query_returns_empty_context() {
        let (_temp, service) = service();
        let context = service.get_context_default("   ", "calc").await.unwrap();
        assert!(!context.has_context);
    }
}
