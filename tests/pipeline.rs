//! End-to-end pipeline tests over deterministic in-process ports: a fixed-text
//! extractor, the mock embedding provider, and the in-memory vector store.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use grounding::{
    ContextService, EmbeddingProvider, GroundingError, IngestionRequest, MemoryVectorStore,
    MockEmbeddingProvider, Namespace, RetrievalRequest, TextExtractor, VectorStore, chunk_text,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Extractor that skips the network and returns canned text.
struct FixedTextExtractor {
    text: String,
}

#[async_trait]
impl TextExtractor for FixedTextExtractor {
    async fn extract(&self, _url: &str) -> Result<String, GroundingError> {
        Ok(self.text.clone())
    }
}

/// Embedder that fails on one specific call, then delegates to the mock.
struct FlakyEmbedder {
    inner: MockEmbeddingProvider,
    calls: AtomicUsize,
    fail_on: usize,
}

impl FlakyEmbedder {
    fn failing_on(fail_on: usize) -> Self {
        Self {
            inner: MockEmbeddingProvider::new(),
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, GroundingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on {
            return Err(GroundingError::Embedding("simulated rate limit".into()));
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Store whose queries fail for one namespace, to exercise degradation.
struct ScopedFailStore {
    inner: MemoryVectorStore,
    fail_namespace: Namespace,
}

#[async_trait]
impl VectorStore for ScopedFailStore {
    async fn upsert(&self, record: grounding::EmbeddingRecord) -> Result<(), GroundingError> {
        self.inner.upsert(record).await
    }

    async fn query(
        &self,
        query_embedding: &[f32],
        namespace: Namespace,
        ref_id: &str,
        top_k: usize,
    ) -> Result<Vec<grounding::QueryMatch>, GroundingError> {
        if namespace == self.fail_namespace {
            return Err(GroundingError::Store("simulated outage".into()));
        }
        self.inner.query(query_embedding, namespace, ref_id, top_k).await
    }

    async fn delete_by_ref(
        &self,
        namespace: Namespace,
        ref_id: &str,
    ) -> Result<usize, GroundingError> {
        self.inner.delete_by_ref(namespace, ref_id).await
    }

    async fn count(&self) -> Result<usize, GroundingError> {
        self.inner.count().await
    }
}

/// Three distinct 30-character segments, so `chunk_size = 30, overlap = 0`
/// yields exactly three chunks with known content.
fn three_segment_text() -> String {
    let seg_a = format!("{:<30}", "apples and orchards in autumn");
    let seg_b = format!("{:<30}", "rockets launching toward orbit");
    let seg_c = format!("{:<30}", "cheese aging in a stone cellar");
    format!("{seg_a}{seg_b}{seg_c}")
}

fn request(ref_id: &str, namespace: Namespace, file_name: &str) -> IngestionRequest {
    IngestionRequest {
        public_url: format!("https://files.example.com/{file_name}"),
        file_name: file_name.to_string(),
        namespace,
        ref_id: ref_id.to_string(),
        chunk_size: Some(30),
        chunk_overlap: Some(0.0),
    }
}

fn service_over(store: Arc<dyn VectorStore>, text: &str) -> ContextService {
    ContextService::builder()
        .extractor(Arc::new(FixedTextExtractor {
            text: text.to_string(),
        }))
        .embedder(Arc::new(MockEmbeddingProvider::new()))
        .store(store)
        .build()
}

#[tokio::test]
async fn ingestion_creates_one_record_per_chunk_with_composite_ids() {
    let store = Arc::new(MemoryVectorStore::new());
    let text = three_segment_text();
    let service = service_over(store.clone(), &text);

    let report = service
        .ingest(&request("chat-1", Namespace::Chat, "notes.pdf"))
        .await
        .unwrap();
    assert_eq!(report.chunks_indexed, 3);
    assert_eq!(store.count().await.unwrap(), 3);

    let expected_chunks = chunk_text(&text, 30, 0.0);
    let embedder = MockEmbeddingProvider::new();
    let probe = embedder.embed("anything").await.unwrap();
    let mut matches = store
        .query(&probe, Namespace::Chat, "chat-1", 10)
        .await
        .unwrap();
    matches.sort_by_key(|m| m.metadata.chunk_index);

    for (i, m) in matches.iter().enumerate() {
        assert_eq!(m.id, format!("chat-1_{i}"));
        assert_eq!(m.metadata.chunk_index, i);
        assert_eq!(m.metadata.content, expected_chunks[i].text);
        assert_eq!(m.metadata.file_name, "notes.pdf");
        assert_eq!(m.metadata.ref_id, "chat-1");
    }
}

#[tokio::test]
async fn reingestion_is_idempotent() {
    let store = Arc::new(MemoryVectorStore::new());
    let text = three_segment_text();
    let service = service_over(store.clone(), &text);
    let req = request("chat-2", Namespace::Chat, "notes.pdf");

    service.ingest(&req).await.unwrap();
    service.ingest(&req).await.unwrap();

    // Same ids on the second pass overwrite instead of duplicating.
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn embedding_failure_commits_only_the_prefix_and_rerun_recovers() {
    let store = Arc::new(MemoryVectorStore::new());
    let text = three_segment_text();
    let req = request("chat-3", Namespace::Chat, "notes.pdf");

    // Fails embedding chunk 1 (the second call).
    let flaky_service = ContextService::builder()
        .extractor(Arc::new(FixedTextExtractor { text: text.clone() }))
        .embedder(Arc::new(FlakyEmbedder::failing_on(1)))
        .store(store.clone())
        .build();

    let err = flaky_service.ingest(&req).await.unwrap_err();
    assert!(matches!(err, GroundingError::Embedding(_)));

    // Exactly chunk 0 made it in.
    assert_eq!(store.count().await.unwrap(), 1);
    let embedder = MockEmbeddingProvider::new();
    let probe = embedder.embed("anything").await.unwrap();
    let matches = store
        .query(&probe, Namespace::Chat, "chat-3", 10)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "chat-3_0");

    // A clean re-run completes the document without duplicates.
    let service = service_over(store.clone(), &text);
    service.ingest(&req).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 3);
    let matches = store
        .query(&probe, Namespace::Chat, "chat-3", 10)
        .await
        .unwrap();
    let mut ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["chat-3_0", "chat-3_1", "chat-3_2"]);
}

#[tokio::test]
async fn single_scope_retrieval_is_ranked_and_truncated() {
    let store = Arc::new(MemoryVectorStore::new());
    let text = three_segment_text();
    let service = service_over(store.clone(), &text);
    service
        .ingest(&request("chat-4", Namespace::Chat, "notes.pdf"))
        .await
        .unwrap();

    let snippets = service
        .retrieve(&RetrievalRequest {
            query: "apples and orchards in autumn".into(),
            namespace: Namespace::Chat,
            ref_id: "chat-4".into(),
            top_k: Some(2),
        })
        .await
        .unwrap();

    assert_eq!(snippets.len(), 2);
    assert!(snippets[0].score >= snippets[1].score);
    assert!(snippets.iter().all(|s| s.id.starts_with("chat-4_")));
}

#[tokio::test]
async fn chat_turn_context_merges_both_scopes_ranked() {
    let store = Arc::new(MemoryVectorStore::new());
    let text = three_segment_text();
    let service = service_over(store.clone(), &text);

    service
        .ingest(&request("chat-5", Namespace::Chat, "chat-notes.pdf"))
        .await
        .unwrap();
    service
        .ingest(&request("ws-5", Namespace::Workspace, "workspace-docs.pdf"))
        .await
        .unwrap();

    let snippets = service
        .relevant_context("rockets launching toward orbit", "chat-5", Some("ws-5"))
        .await;

    // 3 chat + 3 workspace candidates, cut to the global top 5.
    assert_eq!(snippets.len(), 5);
    for pair in snippets.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert!(snippets.iter().any(|s| s.file_name == "chat-notes.pdf"));
    assert!(snippets.iter().any(|s| s.file_name == "workspace-docs.pdf"));
}

#[tokio::test]
async fn chat_turn_context_ignores_workspace_when_absent() {
    let store = Arc::new(MemoryVectorStore::new());
    let text = three_segment_text();
    let service = service_over(store.clone(), &text);

    service
        .ingest(&request("chat-6", Namespace::Chat, "chat-notes.pdf"))
        .await
        .unwrap();
    service
        .ingest(&request("ws-6", Namespace::Workspace, "workspace-docs.pdf"))
        .await
        .unwrap();

    let snippets = service
        .relevant_context("cheese aging in a stone cellar", "chat-6", None)
        .await;

    assert_eq!(snippets.len(), 3);
    assert!(snippets.iter().all(|s| s.file_name == "chat-notes.pdf"));
}

#[tokio::test]
async fn failing_workspace_scope_degrades_to_chat_only() {
    init_tracing();
    let store = Arc::new(ScopedFailStore {
        inner: MemoryVectorStore::new(),
        fail_namespace: Namespace::Workspace,
    });
    let text = three_segment_text();
    let service = service_over(store.clone(), &text);

    service
        .ingest(&request("chat-7", Namespace::Chat, "chat-notes.pdf"))
        .await
        .unwrap();
    service
        .ingest(&request("ws-7", Namespace::Workspace, "workspace-docs.pdf"))
        .await
        .unwrap();

    let snippets = service
        .relevant_context("apples and orchards in autumn", "chat-7", Some("ws-7"))
        .await;

    // Workspace queries black-holed; the turn still gets chat grounding.
    assert_eq!(snippets.len(), 3);
    assert!(snippets.iter().all(|s| s.file_name == "chat-notes.pdf"));
}

#[tokio::test]
async fn removing_a_context_clears_only_its_scope() {
    let store = Arc::new(MemoryVectorStore::new());
    let text = three_segment_text();
    let service = service_over(store.clone(), &text);

    service
        .ingest(&request("chat-8", Namespace::Chat, "chat-notes.pdf"))
        .await
        .unwrap();
    service
        .ingest(&request("ws-8", Namespace::Workspace, "workspace-docs.pdf"))
        .await
        .unwrap();

    let removed = service
        .remove_context(Namespace::Chat, "chat-8")
        .await
        .unwrap();
    assert_eq!(removed, 3);
    assert_eq!(store.count().await.unwrap(), 3);
}
