//! Storage layer for course material
//!
//! A single SQLite file under the data directory holds documents, chunk text
//! and chunk embeddings.

pub mod chunk;
pub mod database;
pub mod vector_store;

use crate::error::{InkpauseError, Result};
use std::path::{Path, PathBuf};

pub use chunk::{content_hash, Chunk, DocumentRecord, DocumentType, ScoredChunk};
pub use database::{Database, DbConn, DbPool};
pub use vector_store::{StoreStats, VectorStore};

/// Location of the index database inside a data directory
pub fn index_path(data_dir: &Path) -> PathBuf {
    data_dir.join("index").join("chunks.sqlite")
}

/// Open the vector store living under `data_dir`
pub fn open_store(data_dir: &Path) -> Result<VectorStore> {
    std::fs::create_dir_all(data_dir).map_err(|e| InkpauseError::Io {
        source: e,
        context: format!("Failed to create data directory: {}", data_dir.display()),
    })?;
    VectorStore::open(&index_path(data_dir))
}

/// Format size as human-readable string
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}
