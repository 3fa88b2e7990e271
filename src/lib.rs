//! Context ingestion and retrieval pipeline for grounding AI chat replies in
//! uploaded documents.
//!
//! ```text
//! Upload event ──► ingest::ingest_document
//!                      │
//!                      ├─► extract::PdfExtractor ──► raw text
//!                      ├─► chunk::chunk_text      ──► overlapping windows
//!                      └─► per chunk, in order:
//!                              embed::EmbeddingProvider ──► vector
//!                              stores::VectorStore.upsert (keyed "{ref_id}_{index}")
//!
//! User query ──► retrieve::relevant_context
//!                      │
//!                      ├─► embed query once
//!                      ├─► stores::VectorStore.query per scope (chat / workspace)
//!                      └─► merge, rank by similarity, top-N snippets
//!                              └─► retrieve::render_context_header ──► LLM prompt
//! ```
//!
//! Embeddings are partitioned by [`types::Namespace`] (`workspace` | `chat`)
//! and the owning scope's `ref_id`; a query never crosses scopes. Ingestion is
//! fail-fast with idempotent upsert keys, so re-running a failed ingestion is
//! always safe. Retrieval is best-effort: a failing scope degrades to zero
//! results instead of failing the chat turn.

pub mod chunk;
pub mod config;
pub mod embed;
pub mod extract;
pub mod ingest;
pub mod retrieve;
pub mod service;
pub mod stores;
pub mod types;

pub use chunk::{TextChunk, chunk_text};
pub use config::GroundingConfig;
pub use embed::{EmbeddingProvider, GeminiEmbedder, MockEmbeddingProvider};
pub use extract::{PdfExtractor, TextExtractor};
pub use ingest::{IngestionReport, IngestionRequest};
pub use retrieve::{ContextSnippet, RetrievalRequest, render_context_header};
pub use service::ContextService;
pub use stores::{MemoryVectorStore, SqliteVectorStore, VectorStore};
pub use types::{EmbeddingRecord, GroundingError, Namespace, QueryMatch, SnippetMetadata};
