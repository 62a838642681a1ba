//! Persistent content-addressed embedding cache (SQLite-backed).
//!
//! `(text_hash, model_name)` is the unique key. Rows are only ever inserted,
//! never updated; conflicting inserts are ignored, so concurrent writers
//! racing on the same hash converge safely.

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingCacheError {
    #[error("embedding cache database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("embedding cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, EmbeddingCacheError>;

/// SHA-256 of the UTF-8 bytes of `text`, as a lowercase hex string.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Persistent, content-addressed embedding cache.
///
/// Thread-safe via an internal mutex on the connection, following
/// `storage/sqlite.rs`'s `Mutex<Connection>` convention.
pub struct EmbeddingCache {
    conn: Mutex<Connection>,
}

impl EmbeddingCache {
    pub fn open(path: &str) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> CacheResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS embedding_cache (
                text_hash TEXT NOT NULL,
                model_name TEXT NOT NULL,
                vector_json TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (text_hash, model_name)
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    /// Look up cached vectors for the given hashes, scoped to `model`.
    /// Returns a map from hash to vector for every hit; misses are absent.
    pub fn get_many(
        &self,
        hashes: &[String],
        model: &str,
    ) -> CacheResult<HashMap<String, Vec<f32>>> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().unwrap();
        let mut out = HashMap::with_capacity(hashes.len());
        let mut stmt = conn.prepare(
            "SELECT vector_json FROM embedding_cache WHERE text_hash = ?1 AND model_name = ?2",
        )?;
        for hash in hashes {
            let row: Option<String> = stmt
                .query_row(params![hash, model], |r| r.get(0))
                .optional()?;
            if let Some(vector_json) = row {
                let vector: Vec<f32> = serde_json::from_str(&vector_json)?;
                out.insert(hash.clone(), vector);
            }
        }
        Ok(out)
    }

    /// Bulk-insert new entries, ignoring rows whose `(text_hash, model_name)`
    /// already exists — idempotent under concurrent inserts of the same hash.
    pub fn bulk_insert_ignore(
        &self,
        entries: &[(String, String, Vec<f32>)],
        created_at: &str,
    ) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO embedding_cache (text_hash, model_name, vector_json, dimension, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(text_hash, model_name) DO NOTHING",
            )?;
            for (hash, model, vector) in entries {
                let vector_json = serde_json::to_string(vector)?;
                stmt.execute(params![hash, model, vector_json, vector.len() as i64, created_at])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
