//! Chunk persistence and nearest-neighbour lookup
//!
//! Embeddings live next to their text in the `chunks` table as little-endian
//! f32 blobs. Lookups are a brute-force cosine scan scoped to one course,
//! which stays cheap at the scale of a single student's materials.

use super::chunk::{Chunk, DocumentRecord, DocumentType, ScoredChunk};
use super::database::Database;
use crate::embedding::cosine_similarity;
use crate::error::{InkpauseError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;

/// Index statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub course_count: usize,
}

/// SQLite-backed store of embedded chunks
pub struct VectorStore {
    db: Database,
}

impl VectorStore {
    /// Open the store at `db_path`, creating and migrating it if needed
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(Database::new(db_path)?))
    }

    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Atomically swap a document's chunks for a new set
    pub fn replace_document(&self, record: &DocumentRecord, chunks: &[Chunk]) -> Result<()> {
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![record.document_id],
        )?;

        tx.execute(
            "INSERT INTO documents (document_id, course_id, document_type, content_hash, chunk_count, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(document_id) DO UPDATE SET
                course_id = excluded.course_id,
                document_type = excluded.document_type,
                content_hash = excluded.content_hash,
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at",
            params![
                record.document_id,
                record.course_id,
                record.document_type.as_str(),
                record.content_hash,
                record.chunk_count as i64,
                record.indexed_at.to_rfc3339(),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, document_id, course_id, document_type, text, embedding, sequence_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.id,
                    chunk.document_id,
                    chunk.course_id,
                    chunk.document_type.as_str(),
                    chunk.text,
                    encode_embedding(&chunk.embedding),
                    chunk.sequence_index,
                ])?;
            }
        }

        tx.commit()?;

        tracing::debug!(
            "Stored {} chunks for document {}",
            chunks.len(),
            record.document_id
        );
        Ok(())
    }

    /// Insert a single chunk without touching the document row
    pub fn insert_chunk(&self, chunk: &Chunk) -> Result<()> {
        let conn = self.db.get_conn()?;
        conn.execute(
            "INSERT INTO chunks (id, document_id, course_id, document_type, text, embedding, sequence_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                chunk.id,
                chunk.document_id,
                chunk.course_id,
                chunk.document_type.as_str(),
                chunk.text,
                encode_embedding(&chunk.embedding),
                chunk.sequence_index,
            ],
        )?;
        Ok(())
    }

    /// Bookkeeping row for a document, if it was ever indexed
    pub fn document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.db.get_conn()?;
        let row = conn
            .query_row(
                "SELECT document_id, course_id, document_type, content_hash, chunk_count, indexed_at
                 FROM documents WHERE document_id = ?1",
                params![document_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((document_id, course_id, document_type, content_hash, chunk_count, indexed_at)) =
            row
        else {
            return Ok(None);
        };

        let indexed_at = DateTime::parse_from_rfc3339(&indexed_at)
            .map_err(|e| InkpauseError::CorruptRecord {
                table: "documents".to_string(),
                message: format!("Bad indexed_at '{}': {}", indexed_at, e),
            })?
            .with_timezone(&Utc);

        Ok(Some(DocumentRecord {
            document_id,
            course_id,
            document_type: parse_document_type("documents", &document_type)?,
            content_hash,
            chunk_count: chunk_count.max(0) as usize,
            indexed_at,
        }))
    }

    /// Remove a document and its chunks. Returns the number of chunks removed.
    pub fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id],
        )?;
        tx.execute(
            "DELETE FROM documents WHERE document_id = ?1",
            params![document_id],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    /// Remove every document and chunk of a course. Returns the number of chunks removed.
    pub fn delete_course(&self, course_id: &str) -> Result<usize> {
        let mut conn = self.db.get_conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM chunks WHERE course_id = ?1", params![course_id])?;
        tx.execute(
            "DELETE FROM documents WHERE course_id = ?1",
            params![course_id],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    /// Stored chunks for a document; 0 for unknown ids
    pub fn chunk_count(&self, document_id: &str) -> Result<usize> {
        let conn = self.db.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// A document's chunks in sequence order
    pub fn chunks_for_document(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_id, course_id, document_type, text, embedding, sequence_index
             FROM chunks WHERE document_id = ?1 ORDER BY sequence_index",
        )?;
        let rows = stmt.query_map(params![document_id], read_raw_chunk)?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?.into_chunk()?);
        }
        Ok(chunks)
    }

    /// The `k` chunks of a course most similar to `query`, best first
    pub fn nearest(&self, query: &[f32], course_id: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_id, course_id, document_type, text, embedding, sequence_index
             FROM chunks WHERE course_id = ?1",
        )?;
        let rows = stmt.query_map(params![course_id], read_raw_chunk)?;

        let mut scored = Vec::new();
        let mut mismatched = 0usize;
        for row in rows {
            let chunk = row?.into_chunk()?;
            if chunk.embedding.len() != query.len() {
                mismatched += 1;
                continue;
            }
            let similarity = cosine_similarity(query, &chunk.embedding);
            scored.push(ScoredChunk { chunk, similarity });
        }

        if mismatched > 0 {
            tracing::warn!(
                "Skipped {} chunks in course {} with a different embedding dimension (query is {}D)",
                mismatched,
                course_id,
                query.len()
            );
        }

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.db.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let chunk_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        let course_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT course_id) FROM documents",
            [],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            course_count: course_count as usize,
        })
    }
}

/// Row as read from SQLite, before enum and blob decoding
struct RawChunk {
    id: String,
    document_id: String,
    course_id: String,
    document_type: String,
    text: String,
    embedding: Vec<u8>,
    sequence_index: u32,
}

fn read_raw_chunk(row: &Row<'_>) -> rusqlite::Result<RawChunk> {
    Ok(RawChunk {
        id: row.get(0)?,
        document_id: row.get(1)?,
        course_id: row.get(2)?,
        document_type: row.get(3)?,
        text: row.get(4)?,
        embedding: row.get(5)?,
        sequence_index: row.get(6)?,
    })
}

impl RawChunk {
    fn into_chunk(self) -> Result<Chunk> {
        Ok(Chunk {
            document_type: parse_document_type("chunks", &self.document_type)?,
            embedding: decode_embedding(&self.embedding)?,
            id: self.id,
            document_id: self.document_id,
            course_id: self.course_id,
            text: self.text,
            sequence_index: self.sequence_index,
        })
    }
}

fn parse_document_type(table: &str, value: &str) -> Result<DocumentType> {
    value
        .parse()
        .map_err(|message| InkpauseError::CorruptRecord {
            table: table.to_string(),
            message,
        })
}

pub(crate) fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(InkpauseError::CorruptRecord {
            table: "chunks".to_string(),
            message: format!("Embedding blob of {} bytes is not a whole number of f32s", bytes.len()),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
