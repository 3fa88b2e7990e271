//! `ContextService`: the facade wiring extractor, embedder, and store
//! together, plus the process-wide shared instance.
//!
//! Clients are constructed once at startup with explicit configuration and
//! held immutably behind [`ContextService::global`]; nothing in the pipeline
//! instantiates a fresh API client per call.

use std::sync::{Arc, OnceLock};

use crate::config::GroundingConfig;
use crate::embed::{EmbeddingProvider, GeminiEmbedder};
use crate::extract::{PdfExtractor, TextExtractor};
use crate::ingest::{IngestionReport, IngestionRequest, ingest_document};
use crate::retrieve::{ContextSnippet, RetrievalRequest, relevant_context, retrieve_scope};
use crate::stores::{SqliteVectorStore, VectorStore};
use crate::types::{GroundingError, Namespace};

static GLOBAL: OnceLock<ContextService> = OnceLock::new();

/// Tunable defaults applied when a request leaves them unset.
#[derive(Clone, Debug)]
struct ServiceDefaults {
    chunk_size: usize,
    chunk_overlap: f32,
    top_k: usize,
}

/// The context pipeline: ingestion on upload, retrieval per chat turn.
pub struct ContextService {
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    defaults: ServiceDefaults,
}

impl ContextService {
    pub fn builder() -> ContextServiceBuilder {
        ContextServiceBuilder::default()
    }

    /// Wires the production stack from configuration: PDF extraction, Gemini
    /// embeddings, and the SQLite vector store.
    pub async fn from_config(config: &GroundingConfig) -> Result<Self, GroundingError> {
        let extractor = PdfExtractor::with_timeout(config.request_timeout)?;
        let embedder = GeminiEmbedder::new(config)?;
        let store = SqliteVectorStore::open(&config.database_path).await?;
        Ok(Self::builder()
            .extractor(Arc::new(extractor))
            .embedder(Arc::new(embedder))
            .store(Arc::new(store))
            .chunk_size(config.chunk_size)
            .chunk_overlap(config.chunk_overlap)
            .top_k(config.top_k)
            .build())
    }

    /// Installs the process-wide instance. Fails if one is already installed.
    pub fn init_global(service: ContextService) -> Result<(), GroundingError> {
        GLOBAL
            .set(service)
            .map_err(|_| GroundingError::Config("context service already initialized".into()))
    }

    /// The process-wide instance, if [`init_global`](Self::init_global) ran.
    pub fn global() -> Option<&'static ContextService> {
        GLOBAL.get()
    }

    /// Ingests one uploaded document (ingestion trigger).
    pub async fn ingest(
        &self,
        request: &IngestionRequest,
    ) -> Result<IngestionReport, GroundingError> {
        ingest_document(
            self.extractor.as_ref(),
            self.embedder.as_ref(),
            self.store.as_ref(),
            request,
            self.defaults.chunk_size,
            self.defaults.chunk_overlap,
        )
        .await
    }

    /// Ranked snippets for one scope (retrieval trigger). Store failures
    /// propagate; use [`relevant_context`](Self::relevant_context) for the
    /// best-effort chat-turn path.
    pub async fn retrieve(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Vec<ContextSnippet>, GroundingError> {
        retrieve_scope(
            self.embedder.as_ref(),
            self.store.as_ref(),
            request,
            self.defaults.top_k,
        )
        .await
    }

    /// Merged, best-effort grounding context for a chat turn: chat scope
    /// always, workspace scope when `workspace_id` is supplied.
    pub async fn relevant_context(
        &self,
        query: &str,
        chat_id: &str,
        workspace_id: Option<&str>,
    ) -> Vec<ContextSnippet> {
        relevant_context(
            self.embedder.as_ref(),
            self.store.as_ref(),
            query,
            chat_id,
            workspace_id,
            self.defaults.top_k,
        )
        .await
    }

    /// Removes every embedding in a scope. Call when the owning context
    /// document is deleted; embeddings do not cascade on their own.
    pub async fn remove_context(
        &self,
        namespace: Namespace,
        ref_id: &str,
    ) -> Result<usize, GroundingError> {
        let removed = self.store.delete_by_ref(namespace, ref_id).await?;
        tracing::info!(namespace = %namespace, ref_id, removed, "removed context embeddings");
        Ok(removed)
    }
}

/// Builder for [`ContextService`].
#[derive(Default)]
pub struct ContextServiceBuilder {
    extractor: Option<Arc<dyn TextExtractor>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<f32>,
    top_k: Option<usize>,
}

impl ContextServiceBuilder {
    #[must_use]
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    #[must_use]
    pub fn chunk_overlap(mut self, chunk_overlap: f32) -> Self {
        self.chunk_overlap = Some(chunk_overlap);
        self
    }

    #[must_use]
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Builds the service.
    ///
    /// # Panics
    ///
    /// Panics if the extractor, embedder, or store was not provided.
    pub fn build(self) -> ContextService {
        self.try_build()
            .expect("ContextServiceBuilder requires an extractor, an embedder, and a store")
    }

    /// Builds the service, returning `None` if any port is missing.
    pub fn try_build(self) -> Option<ContextService> {
        let defaults = ServiceDefaults {
            chunk_size: self.chunk_size.unwrap_or(2000),
            chunk_overlap: self.chunk_overlap.unwrap_or(0.2),
            top_k: self.top_k.unwrap_or(5),
        };
        Some(ContextService {
            extractor: self.extractor?,
            embedder: self.embedder?,
            store: self.store?,
            defaults,
        })
    }
}
