//! SQLite database management with migrations
//!
//! Holds course documents and their embedded chunks

use crate::error::{InkpauseError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled connection handed out by [`Database::get_conn`]
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database file and bring the schema up to date
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InkpauseError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        // Per-connection pragmas; journal mode is persisted in the file itself
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA busy_timeout = 5000;
                PRAGMA synchronous = NORMAL;
                ",
            )
        });

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| InkpauseError::Config(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool.get()?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Current schema version
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.get_conn()?;
        let version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    fn migrate(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (index, migration) in MIGRATIONS.iter().enumerate() {
            let version = index as i32 + 1;
            if version <= current_version {
                continue;
            }

            tracing::info!("Applying migration {}", version);

            let tx = conn.transaction()?;
            tx.execute_batch(migration)?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                params![version],
            )?;
            tx.commit()?;
        }

        Ok(())
    }
}

/// Database migrations (each string is one migration)
pub(crate) const MIGRATIONS: &[&str] = &[
    // Migration 1: documents and chunks
    r#"
    CREATE TABLE documents (
        document_id TEXT PRIMARY KEY,
        course_id TEXT NOT NULL,
        document_type TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        chunk_count INTEGER NOT NULL DEFAULT 0,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX idx_documents_course ON documents(course_id);

    CREATE TABLE chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        course_id TEXT NOT NULL,
        document_type TEXT NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        sequence_index INTEGER NOT NULL
    );

    CREATE INDEX idx_chunks_course ON chunks(course_id);
    CREATE INDEX idx_chunks_document ON chunks(document_id);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("index.db");

        let _db = Database::new(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_migrations_recorded_once() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("index.db");

        let db = Database::new(&db_path).unwrap();
        assert_eq!(db.schema_version().unwrap(), MIGRATIONS.len() as i32);
        drop(db);

        // Reopening must not re-run anything
        let db = Database::new(&db_path).unwrap();
        let conn = db.get_conn().unwrap();
        let rows: i32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_schema_exists() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("index.db")).unwrap();
        let conn = db.get_conn().unwrap();

        for table in ["documents", "chunks"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();

            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_busy_timeout_set_on_every_connection() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("index.db")).unwrap();

        let first = db.get_conn().unwrap();
        let second = db.get_conn().unwrap();
        for conn in [&first, &second] {
            let timeout: i64 = conn
                .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
                .unwrap();
            assert_eq!(timeout, 5000);
        }
    }
}
