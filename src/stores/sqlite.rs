//! SQLite vector store backed by the `sqlite-vec` extension.
//!
//! Embeddings are stored as JSON float arrays and compared with
//! `vec_distance_cosine` at query time; similarity reported to callers is
//! `1 - distance`. Upserts are `INSERT ... ON CONFLICT(id) DO UPDATE`, so each
//! write is atomic per record and last-write-wins on the composite id.

use async_trait::async_trait;
use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;
use rusqlite::ffi;
use tokio_rusqlite::Connection;

use super::VectorStore;
use crate::types::{EmbeddingRecord, GroundingError, Namespace, QueryMatch, SnippetMetadata};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS embeddings (
    id        TEXT PRIMARY KEY,
    namespace TEXT NOT NULL,
    ref_id    TEXT NOT NULL,
    embedding TEXT NOT NULL,
    metadata  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS embeddings_scope ON embeddings (namespace, ref_id);
";

#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
}

impl SqliteVectorStore {
    /// Opens (or creates) the database at `path` and ensures the schema and
    /// the sqlite-vec extension are in place.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, GroundingError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| GroundingError::Store(err.to_string()))?;
        conn.call(|conn| {
            // Fails loudly if the extension did not register.
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| GroundingError::Store(err.to_string()))?;
        Ok(Self { conn })
    }

    /// In-memory database, handy for tests and throwaway sessions.
    pub async fn open_in_memory() -> Result<Self, GroundingError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| GroundingError::Store(err.to_string()))?;
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| GroundingError::Store(err.to_string()))?;
        Ok(Self { conn })
    }

    fn register_sqlite_vec() -> Result<(), GroundingError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *const c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(GroundingError::Store)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), GroundingError> {
        let embedding = serde_json::to_string(&record.embedding)
            .map_err(|err| GroundingError::Store(err.to_string()))?;
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|err| GroundingError::Store(err.to_string()))?;
        let id = record.id;
        let namespace = record.namespace.as_str().to_string();
        let ref_id = record.ref_id;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO embeddings (id, namespace, ref_id, embedding, metadata) \
                     VALUES (?1, ?2, ?3, ?4, ?5) \
                     ON CONFLICT(id) DO UPDATE SET \
                         namespace = excluded.namespace, \
                         ref_id = excluded.ref_id, \
                         embedding = excluded.embedding, \
                         metadata = excluded.metadata",
                    [&id, &namespace, &ref_id, &embedding, &metadata],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| GroundingError::Store(err.to_string()))
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        namespace: Namespace,
        ref_id: &str,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, GroundingError> {
        let query_json = serde_json::to_string(query_embedding)
            .map_err(|err| GroundingError::Store(err.to_string()))?;
        let namespace = namespace.as_str().to_string();
        let ref_id = ref_id.to_string();

        let rows: Vec<(String, String, f32)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id, metadata, \
                         vec_distance_cosine(vec_f32(embedding), vec_f32(?1)) AS distance \
                         FROM embeddings \
                         WHERE namespace = ?2 AND ref_id = ?3 \
                         ORDER BY distance ASC \
                         LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mapped = stmt
                    .query_map([&query_json, &namespace, &ref_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, f32>(2)?,
                        ))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut rows = Vec::new();
                for row in mapped {
                    rows.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(rows)
            })
            .await
            .map_err(|err| GroundingError::Store(err.to_string()))?;

        rows.into_iter()
            .map(|(id, metadata, distance)| {
                let metadata: SnippetMetadata = serde_json::from_str(&metadata).map_err(|err| {
                    GroundingError::Store(format!("malformed metadata for '{id}': {err}"))
                })?;
                Ok(QueryMatch {
                    id,
                    metadata,
                    score: 1.0 - distance,
                })
            })
            .collect()
    }

    async fn delete_by_ref(
        &self,
        namespace: Namespace,
        ref_id: &str,
    ) -> Result<usize, GroundingError> {
        let namespace = namespace.as_str().to_string();
        let ref_id = ref_id.to_string();
        self.conn
            .call(move |conn| {
                let deleted = conn
                    .execute(
                        "DELETE FROM embeddings WHERE namespace = ?1 AND ref_id = ?2",
                        [&namespace, &ref_id],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(deleted)
            })
            .await
            .map_err(|err| GroundingError::Store(err.to_string()))
    }

    async fn count(&self) -> Result<usize, GroundingError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| GroundingError::Store(err.to_string()))
    }
}
