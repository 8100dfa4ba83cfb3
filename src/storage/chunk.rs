//! Stored record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of course document a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Notes,
    Homework,
    Exam,
    Textbook,
    Syllabus,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Notes => "notes",
            DocumentType::Homework => "homework",
            DocumentType::Exam => "exam",
            DocumentType::Textbook => "textbook",
            DocumentType::Syllabus => "syllabus",
            DocumentType::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "notes" => Ok(DocumentType::Notes),
            "homework" => Ok(DocumentType::Homework),
            "exam" => Ok(DocumentType::Exam),
            "textbook" => Ok(DocumentType::Textbook),
            "syllabus" => Ok(DocumentType::Syllabus),
            "other" => Ok(DocumentType::Other),
            other => Err(format!("Unknown document type: {}", other)),
        }
    }
}

/// A stored slice of a document together with its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub course_id: String,
    pub document_type: DocumentType,
    pub text: String,
    pub embedding: Vec<f32>,
    /// Position of the chunk within its document
    pub sequence_index: u32,
}

impl Chunk {
    pub fn new(
        document_id: &str,
        course_id: &str,
        document_type: DocumentType,
        text: String,
        embedding: Vec<f32>,
        sequence_index: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            course_id: course_id.to_string(),
            document_type,
            text,
            embedding,
            sequence_index,
        }
    }
}

/// Per-document bookkeeping row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub course_id: String,
    pub document_type: DocumentType,
    /// BLAKE3 hex digest of the indexed text
    pub content_hash: String,
    pub chunk_count: usize,
    pub indexed_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// First 16 hex chars of the content hash, or all of it if shorter
    pub fn short_hash(&self) -> &str {
        self.content_hash.get(..16).unwrap_or(self.content_hash.as_str())
    }
}

/// Hex BLAKE3 digest used to detect changed document text
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// A chunk paired with its similarity to a query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_hash(hash: &str) -> DocumentRecord {
        DocumentRecord {
            document_id: "doc".to_string(),
            course_id: "calc".to_string(),
            document_type: DocumentType::Notes,
            content_hash: hash.to_string(),
            chunk_count: 0,
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn test_short_hash() {
        let full = record_with_hash(&content_hash("limits"));
        assert_eq!(full.short_hash().len(), 16);
        assert!(full.content_hash.starts_with(full.short_hash()));

        // Truncated rows must not panic
        assert_eq!(record_with_hash("abc").short_hash(), "abc");
        assert_eq!(record_with_hash("").short_hash(), "");
    }

    #[test]
    fn test_document_type_parsing() {
        assert_eq!("Notes".parse::<DocumentType>(), Ok(DocumentType::Notes));
        assert_eq!("exam".parse::<DocumentType>(), Ok(DocumentType::Exam));
        assert!("lecture-video".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_document_type_serde_is_lowercase() {
        let json = serde_json::to_string(&DocumentType::Syllabus).unwrap();
        assert_eq!(json, "\"syllabus\"");
    }

    #[test]
    fn test_new_chunks_get_distinct_ids() {
        let a = Chunk::new("doc", "course", DocumentType::Notes, "a".into(), vec![], 0);
        let b = Chunk::new("doc", "course", DocumentType::Notes, "b".into(), vec![], 1);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_content_hash_changes_with_text() {
        assert_eq!(content_hash("limits"), content_hash("limits"));
        assert_ne!(content_hash("limits"), content_hash("limits."));
        assert_eq!(content_hash("x").len(), 64);
    }
}
