//! In-process vector store.
//!
//! Backs tests and ephemeral sessions; also the proof that the
//! [`VectorStore`] port is engine-agnostic. Rows live in a map behind a
//! `parking_lot` RwLock and similarity runs in-process.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{VectorStore, cosine_similarity};
use crate::types::{EmbeddingRecord, GroundingError, Namespace, QueryMatch};

#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
    /// Dimension fixed by the first inserted record.
    dimensions: RwLock<Option<usize>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), GroundingError> {
        if embedding.is_empty() {
            return Err(GroundingError::Store("embedding vector is empty".into()));
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(GroundingError::Store(
                "embedding vector contains non-finite values".into(),
            ));
        }
        let mut dims = self.dimensions.write();
        match *dims {
            Some(expected) if expected != embedding.len() => Err(GroundingError::Store(format!(
                "embedding dimension mismatch: store holds {expected}, got {}",
                embedding.len()
            ))),
            Some(_) => Ok(()),
            None => {
                *dims = Some(embedding.len());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), GroundingError> {
        self.check_dimensions(&record.embedding)?;
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        namespace: Namespace,
        ref_id: &str,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, GroundingError> {
        let records = self.records.read();
        let mut matches: Vec<QueryMatch> = records
            .values()
            .filter(|record| record.namespace == namespace && record.ref_id == ref_id)
            .map(|record| QueryMatch {
                id: record.id.clone(),
                metadata: record.metadata.clone(),
                score: cosine_similarity(query_embedding, &record.embedding),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_by_ref(
        &self,
        namespace: Namespace,
        ref_id: &str,
    ) -> Result<usize, GroundingError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| !(record.namespace == namespace && record.ref_id == ref_id));
        Ok(before - records.len())
    }

    async fn count(&self) -> Result<usize, GroundingError> {
        Ok(self.records.read().len())
    }
}
