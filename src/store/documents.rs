use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;

use super::{Store, serialize_vector};
use crate::error::{RagError, Result};
use crate::extract::chunking::Chunk;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub file_hash: String,
    pub chunk_count: usize,
    pub modified_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
}

impl Store {
    /// Insert or replace a document with its chunks and embeddings.
    pub fn upsert_document(
        &mut self,
        filename: &str,
        file_hash: &str,
        modified_at: DateTime<Utc>,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::Embedding(format!(
                "chunks and embeddings length mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions()) {
            return Err(RagError::Embedding(format!(
                "expected {}-dimensional embedding, got {}",
                self.dimensions(),
                bad.len()
            )));
        }

        let tx = self.conn.transaction()?;

        // Insert or update document and get the stable ID
        let doc_id: i64 = tx.query_row(
            r#"
            INSERT INTO documents (filename, file_hash, modified_at, indexed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(filename) DO UPDATE SET
                file_hash = excluded.file_hash,
                modified_at = excluded.modified_at,
                indexed_at = excluded.indexed_at
            RETURNING id
            "#,
            params![filename, file_hash, modified_at, Utc::now()],
            |row| row.get(0),
        )?;

        // vec0 rows are not covered by the foreign key cascade.
        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
            params![doc_id],
        )?;
        tx.execute("DELETE FROM chunks WHERE document_id = ?", params![doc_id])?;

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            tx.execute(
                "INSERT INTO chunks (document_id, position, content) VALUES (?, ?, ?)",
                params![doc_id, chunk.position as i64, chunk.content],
            )?;
            let chunk_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
                params![chunk_id, serialize_vector(embedding)],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Stored content hash for `filename`, if indexed.
    pub fn document_hash(&self, filename: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT file_hash FROM documents WHERE filename = ?",
                params![filename],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// All indexed documents, ordered by filename.
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.filename, d.file_hash, d.modified_at, d.indexed_at, COUNT(c.id)
            FROM documents d
            LEFT JOIN chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.filename
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DocumentRecord {
                filename: row.get(0)?,
                file_hash: row.get(1)?,
                modified_at: row.get(2)?,
                indexed_at: row.get(3)?,
                chunk_count: row.get::<_, i64>(4)? as usize,
            })
        })?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    /// Delete a document with its chunks and vectors.
    pub fn delete_document(&mut self, filename: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let doc_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM documents WHERE filename = ?",
                params![filename],
                |row| row.get(0),
            )
            .optional()?;

        let Some(doc_id) = doc_id else {
            return Ok(false);
        };

        // vec0 rows first; chunks follow the document through the cascade.
        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
            params![doc_id],
        )?;
        let rows = tx.execute("DELETE FROM documents WHERE id = ?", params![doc_id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let (documents, chunks): (i64, i64) = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM documents), (SELECT COUNT(*) FROM chunks)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StoreStats {
            documents: documents as usize,
            chunks: chunks as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(position: usize, content: &str) -> Chunk {
        Chunk {
            position,
            content: content.to_string(),
        }
    }

    fn count(store: &Store, table: &str) -> i64 {
        store
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_documents_crud() {
        let mut store = Store::open_in_memory(4).unwrap();
        let filename = "/docs/test.md";

        store
            .upsert_document(
                filename,
                "hash-1",
                Utc::now(),
                &[chunk(0, "Hello"), chunk(1, "World")],
                &[vec![0.1; 4], vec![0.2; 4]],
            )
            .unwrap();

        let docs = store.list_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, filename);
        assert_eq!(docs[0].chunk_count, 2);
        assert_eq!(store.document_hash(filename).unwrap().as_deref(), Some("hash-1"));
        assert_eq!(count(&store, "vec_chunks"), 2);

        // Re-index replaces old chunks
        store
            .upsert_document(filename, "hash-2", Utc::now(), &[chunk(0, "Replaced")], &[vec![0.5; 4]])
            .unwrap();
        assert_eq!(count(&store, "chunks"), 1);
        assert_eq!(count(&store, "vec_chunks"), 1);
        assert_eq!(store.document_hash(filename).unwrap().as_deref(), Some("hash-2"));
        assert_eq!(store.stats().unwrap(), StoreStats { documents: 1, chunks: 1 });

        assert!(store.delete_document(filename).unwrap());
        assert!(!store.delete_document(filename).unwrap());
        assert_eq!(count(&store, "chunks"), 0);
        assert_eq!(count(&store, "vec_chunks"), 0);
        assert_eq!(store.document_hash(filename).unwrap(), None);
    }

    #[test]
    fn test_upsert_rejects_mismatched_inputs() {
        let mut store = Store::open_in_memory(4).unwrap();
        let err = store
            .upsert_document("a.md", "h", Utc::now(), &[chunk(0, "x")], &[])
            .unwrap_err();
        assert!(err.to_string().contains("length mismatch"));

        let err = store
            .upsert_document("a.md", "h", Utc::now(), &[chunk(0, "x")], &[vec![1.0; 3]])
            .unwrap_err();
        assert!(err.to_string().contains("4-dimensional"));
        assert_eq!(store.stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn test_document_without_chunks_is_listed() {
        let mut store = Store::open_in_memory(4).unwrap();
        store.upsert_document("empty.txt", "h", Utc::now(), &[], &[]).unwrap();
        let docs = store.list_documents().unwrap();
        assert_eq!(docs[0].chunk_count, 0);
    }
}
