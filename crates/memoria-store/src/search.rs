//! Hybrid lexical + vector search over stored memories
//!
//! Lexical scoring is query-token overlap against summary and tags; vector
//! scoring is cosine similarity between the query embedding and each
//! memory's stored embedding. When the embedding provider is unavailable
//! the search degrades to lexical-only with a recorded warning - provider
//! failures never fail the call.

use tracing::warn;

use crate::embed::{cosine_similarity, tokenize, EmbeddingProvider};
use crate::error::StoreResult;
use crate::storage_traits::MemoryStore;
use crate::types::{Memory, MemoryKind};

/// Default result cap.
pub const SEARCH_LIMIT_DEFAULT: usize = 20;

/// Parameters for a hybrid search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Restrict to these kinds (all kinds when empty).
    pub kinds: Vec<MemoryKind>,
    /// Drop memories whose stored base confidence is below this floor.
    pub min_confidence: Option<f64>,
    pub limit: usize,
    /// Blend weights; renormalized to lexical-only when no vector signal
    /// is available.
    pub lexical_weight: f64,
    pub vector_weight: f64,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kinds: Vec::new(),
            min_confidence: None,
            limit: SEARCH_LIMIT_DEFAULT,
            lexical_weight: 0.4,
            vector_weight: 0.6,
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<MemoryKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_min_confidence(mut self, floor: f64) -> Self {
        self.min_confidence = Some(floor);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A scored search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub memory: Memory,
    /// Blended score in `[0,1]`.
    pub score: f64,
    pub lexical: f64,
    /// Cosine similarity when both query and memory embeddings existed.
    pub vector: Option<f64>,
}

/// Fraction of query tokens found in the memory's summary or tags.
pub fn lexical_score(query_tokens: &[String], memory: &Memory) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let doc_tokens: Vec<String> = tokenize(&memory.summary)
        .into_iter()
        .chain(memory.tags.iter().flat_map(|t| tokenize(t)))
        .collect();
    let matched = query_tokens
        .iter()
        .filter(|t| doc_tokens.contains(t))
        .count();
    matched as f64 / query_tokens.len() as f64
}

/// Run a hybrid search against the active memories of `store`.
///
/// Ranking is score-descending with a deterministic tie-break (older
/// `created_at` first, then id).
pub async fn hybrid_search(
    store: &dyn MemoryStore,
    provider: &dyn EmbeddingProvider,
    request: &SearchRequest,
) -> StoreResult<Vec<SearchHit>> {
    let query_tokens = tokenize(&request.query);

    let query_embedding = match provider.embed(&request.query).await {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(
                event = "search.embedding_degraded",
                provider = provider.name(),
                error = %e,
                "falling back to lexical-only search"
            );
            None
        }
    };

    let mut hits: Vec<SearchHit> = Vec::new();
    for memory in store.all_active().await? {
        if !request.kinds.is_empty() && !request.kinds.contains(&memory.kind) {
            continue;
        }
        if let Some(floor) = request.min_confidence {
            if memory.base_confidence < floor {
                continue;
            }
        }

        let lexical = lexical_score(&query_tokens, &memory);
        let vector = match (&query_embedding, &memory.embedding) {
            (Some(q), Some(m)) => Some(cosine_similarity(q, m).max(0.0)),
            _ => None,
        };

        let score = match vector {
            Some(v) => request.lexical_weight * lexical + request.vector_weight * v,
            None => lexical,
        };
        if score <= 0.0 {
            continue;
        }
        hits.push(SearchHit {
            memory,
            score,
            lexical,
            vector,
        });
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.memory.created_at.cmp(&b.memory.created_at))
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    hits.truncate(request.limit);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{FailingEmbedder, HashEmbedder};
    use crate::fakes::InMemoryStore;
    use crate::types::Knowledge;

    async fn seed(store: &InMemoryStore, embedder: &HashEmbedder, summary: &str) -> Memory {
        let mut m = Memory::new(
            MemoryKind::Note,
            summary,
            Knowledge::Note {
                text: summary.into(),
            },
        );
        m.embedding = Some(embedder.embed(summary).await.unwrap());
        store.add(m.clone()).await.unwrap();
        m
    }

    #[tokio::test]
    async fn test_hybrid_ranks_relevant_first() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        seed(&store, &embedder, "database migrations need a lock").await;
        seed(&store, &embedder, "kitten pictures for the demo").await;

        let hits = hybrid_search(
            &store,
            &embedder,
            &SearchRequest::new("database lock contention"),
        )
        .await
        .unwrap();

        assert!(!hits.is_empty());
        assert!(hits[0].memory.summary.contains("database"));
    }

    #[tokio::test]
    async fn test_degrades_to_lexical_on_provider_failure() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        seed(&store, &embedder, "retry with exponential backoff").await;

        let hits = hybrid_search(
            &store,
            &FailingEmbedder,
            &SearchRequest::new("exponential backoff"),
        )
        .await
        .unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].vector.is_none());
        assert!(hits[0].lexical > 0.0);
    }

    #[tokio::test]
    async fn test_kind_and_confidence_filters() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        let m = seed(&store, &embedder, "shared filter target").await;
        store
            .update(
                &m.id,
                crate::types::MemoryPatch::confidence(0.1),
            )
            .await
            .unwrap();

        let by_kind = hybrid_search(
            &store,
            &embedder,
            &SearchRequest::new("shared filter target")
                .with_kinds(vec![MemoryKind::Warning]),
        )
        .await
        .unwrap();
        assert!(by_kind.is_empty());

        let by_floor = hybrid_search(
            &store,
            &embedder,
            &SearchRequest::new("shared filter target").with_min_confidence(0.5),
        )
        .await
        .unwrap();
        assert!(by_floor.is_empty());
    }

    #[tokio::test]
    async fn test_soft_deleted_excluded() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        let m = seed(&store, &embedder, "deleted memories stay hidden").await;
        store.soft_delete(&m.id).await.unwrap();

        let hits = hybrid_search(
            &store,
            &embedder,
            &SearchRequest::new("deleted memories stay hidden"),
        )
        .await
        .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_deterministic_tie_break() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        let now = chrono::Utc::now();
        for id in ["b", "a"] {
            let mut m = Memory::new(
                MemoryKind::Note,
                "identical summary text",
                Knowledge::Note {
                    text: "identical summary text".into(),
                },
            )
            .with_created_at(now);
            m.id = crate::types::MemoryId(id.to_string());
            m.embedding = Some(embedder.embed(&m.summary).await.unwrap());
            store.add(m).await.unwrap();
        }

        let hits = hybrid_search(
            &store,
            &embedder,
            &SearchRequest::new("identical summary text"),
        )
        .await
        .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
