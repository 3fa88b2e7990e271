//! Vector storage engines.
//!
//! [`VectorStore`] abstracts the persistence backend so the orchestrator and
//! retrieval service never touch a concrete database client. Two engines ship
//! here: SQLite with the `sqlite-vec` extension for durable storage, and an
//! in-process map for tests and ephemeral use. Any other engine (pgvector, a
//! managed vector database) slots in behind the same trait.
//!
//! Scope filtering is a guarantee, not a ranking preference: `query` only ever
//! sees rows whose `(namespace, ref_id)` match exactly.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::types::{EmbeddingRecord, GroundingError, Namespace, QueryMatch};

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Persistent similarity-searchable store of [`EmbeddingRecord`]s.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces the record keyed by its `id`.
    ///
    /// Atomic per record; conflict policy is last-write-wins on `id`, which is
    /// what makes re-ingestion idempotent.
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), GroundingError>;

    /// Returns up to `top_k` records within the given scope, ranked by cosine
    /// similarity to `query_embedding`, most similar first.
    ///
    /// An empty result is valid when the scope holds no records. Tie order is
    /// stable per engine but not guaranteed across engines.
    async fn query(
        &self,
        query_embedding: &[f32],
        namespace: Namespace,
        ref_id: &str,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, GroundingError>;

    /// Deletes every record in the given scope, returning how many were
    /// removed. Called when the owning context document is deleted; the store
    /// has no automatic cascade.
    async fn delete_by_ref(
        &self,
        namespace: Namespace,
        ref_id: &str,
    ) -> Result<usize, GroundingError>;

    /// Total number of records in the store.
    async fn count(&self) -> Result<usize, GroundingError>;
}

/// Cosine similarity between two equal-length vectors.
///
/// Returns zero when either vector has zero magnitude, so degenerate rows sink
/// to the bottom of a ranking instead of poisoning it with NaN.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}
