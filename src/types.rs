//! Core record types and the pipeline error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors surfaced by the ingestion and retrieval pipeline.
///
/// The variants mirror the pipeline stages: fetching the source document,
/// extracting its text, embedding a chunk, and talking to the vector store.
/// Timeouts surface inside the variant of the stage that timed out.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GroundingError {
    /// The source document could not be fetched (network failure, non-2xx).
    #[error("failed to fetch source document: {0}")]
    Fetch(String),

    /// The fetched content could not be parsed as a PDF.
    #[error("failed to extract text from document: {0}")]
    Parse(String),

    /// The embedding API call failed.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// A vector store read or write failed.
    #[error("vector store operation failed: {0}")]
    Store(String),

    /// Local filesystem failure.
    #[error("i/o error: {0}")]
    Io(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for GroundingError {
    fn from(err: std::io::Error) -> Self {
        GroundingError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for GroundingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GroundingError::Fetch(format!("request timed out: {err}"))
        } else {
            GroundingError::Fetch(err.to_string())
        }
    }
}

/// Partition key separating the two independent retrieval scopes.
///
/// A query scoped to a chat never returns workspace material and vice versa;
/// the namespace is a hard filter on every store operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Workspace,
    Chat,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Workspace => "workspace",
            Namespace::Chat => "chat",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = GroundingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workspace" => Ok(Namespace::Workspace),
            "chat" => Ok(Namespace::Chat),
            other => Err(GroundingError::Config(format!(
                "unknown namespace '{other}', expected 'workspace' or 'chat'"
            ))),
        }
    }
}

/// Metadata stored alongside each embedding.
///
/// The chunk text itself is kept here so retrieval can return human-readable
/// snippets without a second fetch. Field names serialize camelCase to match
/// the external `embeddings` schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetMetadata {
    pub content: String,
    pub file_name: String,
    pub chunk_index: usize,
    pub ref_id: String,
}

/// The persisted unit of retrieval: one embedded chunk, scoped to a
/// workspace or chat.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Deterministic composite key: `"{ref_id}_{chunk_index}"`.
    pub id: String,
    pub namespace: Namespace,
    pub ref_id: String,
    pub embedding: Vec<f32>,
    pub metadata: SnippetMetadata,
}

impl EmbeddingRecord {
    /// Composite id for the chunk at `chunk_index` within the given scope.
    ///
    /// Re-ingesting the same document overwrites rows at the same index
    /// instead of duplicating them.
    pub fn chunk_id(ref_id: &str, chunk_index: usize) -> String {
        format!("{ref_id}_{chunk_index}")
    }
}

/// One scoped similarity-search hit, ranked by descending similarity.
#[derive(Clone, Debug)]
pub struct QueryMatch {
    pub id: String,
    pub metadata: SnippetMetadata,
    /// Cosine similarity to the query vector, higher is more similar.
    pub score: f32,
}
