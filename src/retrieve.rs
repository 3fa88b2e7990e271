//! Retrieval service: scoped similarity search and prompt context assembly.
//!
//! Single-scope retrieval propagates store failures to the caller. The merged
//! `relevant_context` path used per chat turn is best-effort instead: a
//! failing scope is logged and treated as zero results, because an assistant
//! reply without grounding beats no reply at all.

use serde::{Deserialize, Serialize};

use crate::embed::EmbeddingProvider;
use crate::stores::VectorStore;
use crate::types::{GroundingError, Namespace, QueryMatch};

/// One retrieval call against a single scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalRequest {
    pub query: String,
    pub namespace: Namespace,
    pub ref_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

/// A ranked grounding snippet, ready to drop into an LLM prompt.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnippet {
    pub id: String,
    pub content: String,
    pub file_name: String,
    pub score: f32,
}

impl From<QueryMatch> for ContextSnippet {
    fn from(m: QueryMatch) -> Self {
        ContextSnippet {
            id: m.id,
            content: m.metadata.content,
            file_name: m.metadata.file_name,
            score: m.score,
        }
    }
}

/// Embeds the query and runs one scoped similarity search.
pub async fn retrieve_scope(
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    request: &RetrievalRequest,
    default_top_k: usize,
) -> Result<Vec<ContextSnippet>, GroundingError> {
    let top_k = request.top_k.unwrap_or(default_top_k);
    let query_embedding = embedder.embed(&request.query).await?;
    let matches = store
        .query(&query_embedding, request.namespace, &request.ref_id, top_k)
        .await?;
    Ok(matches.into_iter().map(ContextSnippet::from).collect())
}

/// Builds the merged grounding context for one chat turn.
///
/// The query is embedded once. The chat scope is always searched; the
/// workspace scope joins in when a workspace id is supplied. Both scoped
/// queries run concurrently, each degrades independently to empty results on
/// failure, and the merged list is ranked by score and cut to `limit`.
pub async fn relevant_context(
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    query: &str,
    chat_id: &str,
    workspace_id: Option<&str>,
    limit: usize,
) -> Vec<ContextSnippet> {
    let query_embedding = match embedder.embed(query).await {
        Ok(vector) => vector,
        Err(err) => {
            tracing::warn!(error = %err, "query embedding failed, answering without context");
            return Vec::new();
        }
    };

    let chat_results = store.query(&query_embedding, Namespace::Chat, chat_id, limit);
    let workspace_results = async {
        match workspace_id {
            Some(id) => store.query(&query_embedding, Namespace::Workspace, id, limit).await,
            None => Ok(Vec::new()),
        }
    };
    let (chat_results, workspace_results) = tokio::join!(chat_results, workspace_results);

    let mut snippets: Vec<ContextSnippet> = Vec::new();
    for (scope, result) in [
        (Namespace::Chat, chat_results),
        (Namespace::Workspace, workspace_results),
    ] {
        match result {
            Ok(matches) => snippets.extend(matches.into_iter().map(ContextSnippet::from)),
            Err(err) => {
                tracing::warn!(namespace = %scope, error = %err, "scoped retrieval failed, treating as empty");
            }
        }
    }

    snippets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    snippets.truncate(limit);
    snippets
}

/// Renders retrieved snippets as the labeled context block of an LLM prompt.
pub fn render_context_header(snippets: &[ContextSnippet]) -> String {
    if snippets.is_empty() {
        return "No relevant context found.\n\n".to_string();
    }
    let blocks: Vec<String> = snippets
        .iter()
        .enumerate()
        .map(|(i, snippet)| {
            format!(
                "[Source {}: {}]\n{}",
                i + 1,
                snippet.file_name,
                snippet.content
            )
        })
        .collect();
    format!("Relevant context:\n{}\n\n", blocks.join("\n\n---\n\n"))
}
