use rusqlite::params;
use serde::Serialize;

use super::{Store, serialize_vector};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document: String,
    pub content: String,
    pub position: usize,
    /// `1 - cosine_distance / 2`, in [0, 1].
    pub similarity: f32,
}

fn map_hit(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchHit> {
    let distance: f64 = row.get(3)?;
    Ok(SearchHit {
        document: row.get(0)?,
        content: row.get(1)?,
        position: row.get::<_, i64>(2)? as usize,
        similarity: (1.0 - distance / 2.0) as f32,
    })
}

impl Store {
    /// Nearest `top_k` chunks across all documents.
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.filename, c.content, c.position,
                   vec_distance_cosine(v.embedding, ?) AS distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN documents d ON c.document_id = d.id
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(
            params![serialize_vector(query_vector), top_k as i64],
            map_hit,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Nearest `top_k` chunks within one document.
    pub fn search_in_document(
        &self,
        query_vector: &[f32],
        filename: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.filename, c.content, c.position,
                   vec_distance_cosine(v.embedding, ?) AS distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN documents d ON c.document_id = d.id
            WHERE d.filename = ?
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(
            params![serialize_vector(query_vector), filename, top_k as i64],
            map_hit,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The single best chunk of each document, best documents first.
    pub fn best_per_document(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        // SQLite returns the bare columns of the row that produced MIN().
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.filename, c.content, c.position,
                   MIN(vec_distance_cosine(v.embedding, ?)) AS distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN documents d ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(
            params![serialize_vector(query_vector), limit as i64],
            map_hit,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::chunking::Chunk;
    use chrono::Utc;

    fn unit(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; 4];
        v[i] = 1.0;
        v
    }

    fn chunk(position: usize, content: &str) -> Chunk {
        Chunk {
            position,
            content: content.to_string(),
        }
    }

    fn seeded() -> Store {
        let mut store = Store::open_in_memory(4).unwrap();
        store
            .upsert_document(
                "a.md",
                "ha",
                Utc::now(),
                &[chunk(0, "a0"), chunk(1, "a1")],
                &[unit(0), vec![0.7071, 0.7071, 0.0, 0.0]],
            )
            .unwrap();
        store
            .upsert_document("b.md", "hb", Utc::now(), &[chunk(0, "b0")], &[unit(2)])
            .unwrap();
        store
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let store = seeded();
        let hits = store.search(&unit(0), 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].content, "a0");
        assert!((hits[0].similarity - 1.0).abs() < 1e-4);
        assert_eq!(hits[1].content, "a1");
        // Orthogonal vectors: distance 1, similarity 0.5.
        assert!((hits[2].similarity - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_search_top_k_limits() {
        let store = seeded();
        assert_eq!(store.search(&unit(0), 1).unwrap().len(), 1);
    }

    #[test]
    fn test_search_in_document() {
        let store = seeded();
        let hits = store.search_in_document(&unit(2), "a.md", 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.document == "a.md"));
    }

    #[test]
    fn test_best_per_document() {
        let store = seeded();
        let hits = store.best_per_document(&unit(1), 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document, "a.md");
        assert_eq!(hits[0].content, "a1");
        assert_eq!(hits[1].document, "b.md");
    }

    #[test]
    fn test_search_empty_store() {
        let store = Store::open_in_memory(4).unwrap();
        assert!(store.search(&unit(0), 5).unwrap().is_empty());
        assert!(store.best_per_document(&unit(0), 5).unwrap().is_empty());
    }
}
