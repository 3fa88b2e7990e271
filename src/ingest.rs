//! Ingestion orchestrator: drives one uploaded document from URL to fully
//! indexed embeddings.
//!
//! The pipeline is sequential and fail-fast: extract, chunk, then embed and
//! upsert each chunk in order. Upserts are per chunk and not wrapped in a
//! transaction, so a failure at chunk `k` leaves chunks `0..k` committed. That
//! partial state is safe to leave behind: ids are deterministic, so re-running
//! the same ingestion overwrites instead of duplicating. Re-running is the
//! documented recovery path.

use serde::{Deserialize, Serialize};

use crate::chunk::chunk_text;
use crate::embed::EmbeddingProvider;
use crate::extract::TextExtractor;
use crate::stores::VectorStore;
use crate::types::{EmbeddingRecord, GroundingError, Namespace, SnippetMetadata};

/// One document upload to index, as delivered by the upload flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRequest {
    /// Public URL of the uploaded document in object storage.
    pub public_url: String,
    pub file_name: String,
    pub namespace: Namespace,
    /// Id of the owning workspace or chat.
    pub ref_id: String,
    /// Chunk window size in characters; service default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    /// Overlap fraction in `[0, 1)`; service default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_overlap: Option<f32>,
}

/// Summary of a completed ingestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionReport {
    pub file_name: String,
    /// Number of chunks embedded and upserted.
    pub chunks_indexed: usize,
    /// Length of the extracted text in bytes.
    pub text_bytes: usize,
}

/// Runs the full extract → chunk → embed → upsert pipeline for one document.
pub async fn ingest_document(
    extractor: &dyn TextExtractor,
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    request: &IngestionRequest,
    default_chunk_size: usize,
    default_chunk_overlap: f32,
) -> Result<IngestionReport, GroundingError> {
    let chunk_size = request.chunk_size.unwrap_or(default_chunk_size);
    let chunk_overlap = request.chunk_overlap.unwrap_or(default_chunk_overlap);

    tracing::info!(
        url = %request.public_url,
        file = %request.file_name,
        namespace = %request.namespace,
        ref_id = %request.ref_id,
        chunk_size,
        chunk_overlap,
        "starting context ingestion"
    );

    let text = extractor.extract(&request.public_url).await?;
    let chunks = chunk_text(&text, chunk_size, chunk_overlap);
    tracing::info!(
        file = %request.file_name,
        text_bytes = text.len(),
        chunks = chunks.len(),
        "extracted and chunked document"
    );

    for chunk in &chunks {
        let embedding = embedder.embed(&chunk.text).await?;
        let id = EmbeddingRecord::chunk_id(&request.ref_id, chunk.index);
        let record = EmbeddingRecord {
            id: id.clone(),
            namespace: request.namespace,
            ref_id: request.ref_id.clone(),
            metadata: SnippetMetadata {
                content: chunk.text.clone(),
                file_name: request.file_name.clone(),
                chunk_index: chunk.index,
                ref_id: request.ref_id.clone(),
            },
            embedding,
        };
        store.upsert(record).await?;
        tracing::debug!(id = %id, chunk = chunk.index, "upserted chunk embedding");
    }

    tracing::info!(
        file = %request.file_name,
        chunks = chunks.len(),
        "context ingestion complete"
    );

    Ok(IngestionReport {
        file_name: request.file_name.clone(),
        chunks_indexed: chunks.len(),
        text_bytes: text.len(),
    })
}
