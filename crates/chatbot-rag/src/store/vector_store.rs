//! SQLite-backed persistent vector collection
//!
//! A store directory holds a single `vectors.sqlite3` file. Each named
//! collection remembers the embedding model and vector dimension it was
//! built with; records are append-only and searched with a brute-force
//! cosine scan.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::types::EmbeddingRecord;

/// Database file inside a store directory
pub const DB_FILE_NAME: &str = "vectors.sqlite3";

/// A record with its similarity to a query vector
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// The stored record
    pub record: EmbeddingRecord,
    /// Cosine similarity to the query
    pub score: f32,
}

/// Handle to one collection of a persistent store
pub struct VectorStore {
    root: PathBuf,
    collection: String,
    embedding_model: String,
    /// 0 until the first record fixes it
    dimensions: AtomicUsize,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("root", &self.root)
            .field("collection", &self.collection)
            .field("embedding_model", &self.embedding_model)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

impl VectorStore {
    /// Whether a store directory exists at `path`
    pub fn exists(path: &Path) -> bool {
        path.is_dir()
    }

    /// Delete the store directory and everything in it
    pub fn reset(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
            tracing::info!("Removed vector store at {}", path.display());
        }
        Ok(())
    }

    /// Create a new collection and write its initial records
    pub fn create(
        path: &Path,
        collection: &str,
        embedding_model: &str,
        initial_records: Vec<EmbeddingRecord>,
    ) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let conn = Connection::open(path.join(DB_FILE_NAME))?;
        migrate(&conn)?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT name FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(Error::StoreExists(path.to_path_buf()));
        }

        let dimensions = initial_records.first().map(|r| r.vector.len()).unwrap_or(0);
        conn.execute(
            "INSERT INTO collections (name, embedding_model, dimensions, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                collection,
                embedding_model,
                dimensions as i64,
                Utc::now().to_rfc3339()
            ],
        )?;

        let store = Self {
            root: path.to_path_buf(),
            collection: collection.to_string(),
            embedding_model: embedding_model.to_string(),
            dimensions: AtomicUsize::new(dimensions),
            conn: Mutex::new(conn),
        };

        let written = store.append(initial_records)?;
        tracing::info!(
            "Created collection '{}' at {} with {} records",
            collection,
            path.display(),
            written
        );
        Ok(store)
    }

    /// Open an existing collection without re-embedding anything
    pub fn open(path: &Path, collection: &str) -> Result<Self> {
        let db_path = path.join(DB_FILE_NAME);
        if !db_path.is_file() {
            return Err(Error::StoreNotFound(path.to_path_buf()));
        }

        let conn = Connection::open(&db_path)?;
        migrate(&conn)?;

        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT embedding_model, dimensions FROM collections WHERE name = ?1",
                params![collection],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (embedding_model, dimensions) =
            row.ok_or_else(|| Error::StoreNotFound(path.join(collection)))?;

        Ok(Self {
            root: path.to_path_buf(),
            collection: collection.to_string(),
            embedding_model,
            dimensions: AtomicUsize::new(dimensions.max(0) as usize),
            conn: Mutex::new(conn),
        })
    }

    /// Append records, skipping ids already present. Returns rows written.
    pub fn append(&self, records: Vec<EmbeddingRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let expected = match self.dimensions() {
            Some(dims) => dims,
            None => records[0].vector.len(),
        };
        if let Some(bad) = records.iter().find(|r| r.vector.len() != expected) {
            return Err(Error::DimensionMismatch {
                expected,
                actual: bad.vector.len(),
            });
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        if self.dimensions().is_none() {
            tx.execute(
                "UPDATE collections SET dimensions = ?1 WHERE name = ?2",
                params![expected as i64, self.collection],
            )?;
        }

        let mut next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM records WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        let created_at = Utc::now().to_rfc3339();
        let mut written = 0usize;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO records
                 (id, collection, seq, chunk_text, vector, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in &records {
                let changed = stmt.execute(params![
                    record.id,
                    self.collection,
                    next_seq,
                    record.chunk_text,
                    encode_vector(&record.vector),
                    serde_json::to_string(&record.metadata)?,
                    created_at,
                ])?;
                if changed > 0 {
                    next_seq += 1;
                    written += changed;
                }
            }
        }

        tx.commit()?;
        self.dimensions.store(expected, Ordering::SeqCst);

        tracing::debug!(
            "Appended {} of {} records to '{}'",
            written,
            records.len(),
            self.collection
        );
        Ok(written)
    }

    /// Top `k` records by cosine similarity, most similar first. Ties keep
    /// insertion order.
    pub fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(expected) = self.dimensions() {
            if query.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, chunk_text, vector, metadata FROM records
             WHERE collection = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![self.collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, chunk_text, blob, metadata) = row?;
            let vector = decode_vector(&blob)?;
            let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)?;
            let score = cosine_similarity(query, &vector);
            scored.push(ScoredRecord {
                record: EmbeddingRecord {
                    id,
                    chunk_text,
                    vector,
                    metadata,
                },
                score,
            });
        }

        // stable sort, so equal scores stay in seq order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    /// Number of records in the collection
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Whether the collection has no records
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fail if the collection was built with a different embedding model
    pub fn ensure_model(&self, configured: &str) -> Result<()> {
        if self.embedding_model != configured {
            return Err(Error::ModelMismatch {
                stored: self.embedding_model.clone(),
                configured: configured.to_string(),
            });
        }
        Ok(())
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Vector dimension, once the first record has been written
    pub fn dimensions(&self) -> Option<usize> {
        match self.dimensions.load(Ordering::SeqCst) {
            0 => None,
            dims => Some(dims),
        }
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            embedding_model TEXT NOT NULL,
            dimensions INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
            id TEXT NOT NULL,
            collection TEXT NOT NULL REFERENCES collections(name),
            seq INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            vector BLOB NOT NULL,
            metadata TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_records_seq ON records(collection, seq);
        "#,
    )?;
    Ok(())
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::vector_db(format!(
            "corrupt vector blob of {} bytes",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, text: &str, vector: Vec<f32>) -> EmbeddingRecord {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), "datas/test.md".to_string());
        EmbeddingRecord {
            id: id.to_string(),
            chunk_text: text.to_string(),
            vector,
            metadata,
        }
    }

    #[test]
    fn test_create_search_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");

        let store = VectorStore::create(
            &path,
            "sw_db",
            "test-embed",
            vec![
                record("a", "east", vec![1.0, 0.0]),
                record("b", "north", vec![0.0, 1.0]),
                record("c", "north-east", vec![1.0, 1.0]),
            ],
        )
        .unwrap();

        assert!(VectorStore::exists(&path));
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.dimensions(), Some(2));

        let hits = store.similarity_search(&[1.0, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.chunk_text, "east");
        assert_eq!(hits[1].record.chunk_text, "north-east");
        assert!(hits[0].score >= hits[1].score);
        drop(store);

        let reopened = VectorStore::open(&path, "sw_db").unwrap();
        assert_eq!(reopened.len().unwrap(), 3);
        assert_eq!(reopened.embedding_model(), "test-embed");
        assert_eq!(reopened.dimensions(), Some(2));
        assert_eq!(
            reopened.similarity_search(&[0.0, 1.0], 1).unwrap()[0].record.metadata["source"],
            "datas/test.md"
        );
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        VectorStore::create(dir.path(), "sw_db", "m", vec![record("a", "x", vec![1.0])]).unwrap();

        let err = VectorStore::create(dir.path(), "sw_db", "m", Vec::new()).unwrap_err();
        assert!(matches!(err, Error::StoreExists(_)));
    }

    #[test]
    fn test_open_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorStore::open(&dir.path().join("nothing"), "sw_db").unwrap_err();
        assert!(matches!(err, Error::StoreNotFound(_)));

        VectorStore::create(dir.path(), "sw_db", "m", Vec::new()).unwrap();
        let err = VectorStore::open(dir.path(), "other").unwrap_err();
        assert!(matches!(err, Error::StoreNotFound(_)));
    }

    #[test]
    fn test_append_ignores_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            VectorStore::create(dir.path(), "sw_db", "m", vec![record("a", "x", vec![1.0, 0.0])])
                .unwrap();

        let written = store
            .append(vec![
                record("a", "x", vec![1.0, 0.0]),
                record("b", "y", vec![0.0, 1.0]),
            ])
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            VectorStore::create(dir.path(), "sw_db", "m", vec![record("a", "x", vec![1.0, 0.0])])
                .unwrap();

        let err = store.append(vec![record("b", "y", vec![1.0, 0.0, 0.0])]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));

        let err = store.similarity_search(&[1.0], 1).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::create(
            dir.path(),
            "sw_db",
            "m",
            vec![
                record("first", "first", vec![1.0, 0.0]),
                record("second", "second", vec![2.0, 0.0]),
            ],
        )
        .unwrap();

        let hits = store.similarity_search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].record.id, "first");
        assert_eq!(hits[1].record.id, "second");
    }

    #[test]
    fn test_model_mismatch_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let store = VectorStore::create(&path, "sw_db", "nomic-embed-text", Vec::new()).unwrap();

        assert!(store.ensure_model("nomic-embed-text").is_ok());
        assert!(matches!(
            store.ensure_model("text-embedding-3-small"),
            Err(Error::ModelMismatch { .. })
        ));
        assert!(store.is_empty().unwrap());
        drop(store);

        VectorStore::reset(&path).unwrap();
        assert!(!VectorStore::exists(&path));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
