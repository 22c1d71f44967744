//! Vector store using SQLite and sqlite-vec.
//!
//! One database per processed directory, at `<working_dir>/vectors.db`.
use std::path::Path;
use std::sync::Once;

use rusqlite::{Connection, OptionalExtension, params};
use sqlite_vec::sqlite3_vec_init;
use tracing::info;

use crate::error::{RagError, Result};

pub mod documents;
pub mod search;

pub use documents::{DocumentRecord, StoreStats};
pub use search::SearchHit;

/// File name of the per-directory database.
pub const DB_FILE_NAME: &str = "vectors.db";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    file_hash TEXT NOT NULL,
    modified_at DATETIME NOT NULL,
    indexed_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_filename ON documents(filename);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_document_id ON chunks(document_id);
"#;

static INIT_VEC: Once = Once::new();

/// Register the sqlite-vec extension for every new connection. Safe to call
/// multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A SQLite connection with sqlite-vec loaded and the store schema applied.
pub struct Store {
    pub(crate) conn: Connection,
    dimensions: usize,
}

impl Store {
    /// Open (or create) the database at `path` for vectors of `dimensions`.
    ///
    /// Fails with a configuration error when the file was created for a
    /// different dimension.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening vector store: {}", path.display());
        init_sqlite_vec();
        let conn = Connection::open(path)?;
        Self::init(conn, dimensions)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("embedding dimension must be positive".into()));
        }

        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        tracing::debug!("sqlite-vec version: {vec_version}");

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'embedding_dim'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(v) if v != dimensions.to_string() => {
                return Err(RagError::Config(format!(
                    "vector store was created with {v}-dimensional embeddings, \
                     current embedder produces {dimensions}"
                )));
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO store_meta (key, value) VALUES ('embedding_dim', ?)",
                    params![dimensions.to_string()],
                )?;
            }
        }

        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(embedding FLOAT[{dimensions}]);"
        ))?;

        Ok(Self { conn, dimensions })
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Serialize a float32 vector into the little-endian bytes vec0 expects.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_init() {
        let store = Store::open_in_memory(8).expect("Failed to open in-memory store");

        let tables: usize = store
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('documents', 'chunks', 'vec_chunks', 'store_meta');",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
        assert_eq!(store.dimensions(), 8);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(DB_FILE_NAME);
        drop(Store::open(&path, 8).unwrap());
        assert!(Store::open(&path, 8).is_ok());

        let err = Store::open(&path, 16).err().unwrap();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn test_serialize_vector() {
        let bytes = serialize_vector(&[1.0, -3.5]);
        assert_eq!(bytes.len(), 8);
        // 1.0f32 = 0x3f800000, -3.5f32 = 0xc0600000, little endian.
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x60, 0xc0]);
    }
}
