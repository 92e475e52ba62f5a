//! Episodic consolidation: cluster raw interaction records into durable
//! summarized knowledge.
//!
//! Episodes are grouped by pairwise similarity with union-find; each
//! qualifying cluster is reduced to one `consolidated` memory linked
//! `derived_from` every source episode, and the sources are soft-deleted.
//! A sha-256 signature over the sorted member ids guards idempotence: a
//! cluster that was already consolidated is never reprocessed.
//!
//! Write ordering is cancellation-safe: the consolidated memory and its
//! links land atomically, then the guard record, then the source prune.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use memoria_store::{
    cosine_similarity, tokenize, CausalLink, ConsolidationRecord, EmbeddingProvider, Importance,
    Knowledge, Memory, MemoryKind, MemoryStore, Relation,
};

use crate::error::EngineResult;
use crate::retrieval::{estimated_tokens, CompressionLevel};

/// Options for one consolidation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationOptions {
    /// Clusters smaller than this are skipped.
    pub min_episodes: usize,
    /// Pairwise similarity required to join two episodes.
    pub similarity_threshold: f64,
    /// Compute stats without writing anything.
    pub dry_run: bool,
}

impl Default for ConsolidationOptions {
    fn default() -> Self {
        Self {
            min_episodes: 3,
            similarity_threshold: 0.80,
            dry_run: false,
        }
    }
}

/// Result of a consolidation pass.
///
/// `episodes_processed` counts the episodes examined; `memories_pruned`
/// counts the episodes soft-deleted into their consolidated memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsolidationStats {
    pub episodes_processed: usize,
    pub memories_created: usize,
    pub memories_pruned: usize,
    pub estimated_tokens_freed: usize,
}

// ---------------------------------------------------------------------------
// Union-find
// ---------------------------------------------------------------------------

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

// ---------------------------------------------------------------------------
// Clustering
// ---------------------------------------------------------------------------

fn jaccard(a: &str, b: &str) -> f64 {
    let ta: std::collections::HashSet<String> = tokenize(a).into_iter().collect();
    let tb: std::collections::HashSet<String> = tokenize(b).into_iter().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

/// Similarity between two episodes: embedding cosine when both vectors
/// exist, token Jaccard of summaries otherwise.
fn episode_similarity(a: &Memory, b: &Memory) -> f64 {
    match (&a.embedding, &b.embedding) {
        (Some(va), Some(vb)) => cosine_similarity(va, vb),
        _ => jaccard(&a.summary, &b.summary),
    }
}

/// Group episodes into similarity clusters. Members and clusters come out
/// in deterministic id order.
fn cluster_episodes(episodes: &[Memory], threshold: f64) -> Vec<Vec<usize>> {
    let mut uf = UnionFind::new(episodes.len());
    for i in 0..episodes.len() {
        for j in (i + 1)..episodes.len() {
            if episode_similarity(&episodes[i], &episodes[j]) >= threshold {
                uf.union(i, j);
            }
        }
    }

    let mut by_root: std::collections::BTreeMap<usize, Vec<usize>> = Default::default();
    for i in 0..episodes.len() {
        let root = uf.find(i);
        by_root.entry(root).or_default().push(i);
    }

    let mut clusters: Vec<Vec<usize>> = by_root.into_values().collect();
    for cluster in &mut clusters {
        cluster.sort_by(|a, b| episodes[*a].id.cmp(&episodes[*b].id));
    }
    clusters.sort_by(|a, b| episodes[a[0]].id.cmp(&episodes[b[0]].id));
    clusters
}

/// Signature of a cluster: sha-256 over the sorted member ids.
pub fn cluster_signature(members: &[&Memory]) -> String {
    let mut ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
    ids.sort_unstable();
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Most frequent summary tokens across a cluster, for the synthesized
/// pattern line. Deterministic: frequency desc, then alphabetical.
fn shared_pattern(members: &[&Memory]) -> String {
    let mut counts: std::collections::BTreeMap<String, usize> = Default::default();
    for member in members {
        for token in tokenize(&member.summary) {
            if token.len() < 3 {
                continue;
            }
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let theme: Vec<String> = ranked.into_iter().take(6).map(|(t, _)| t).collect();
    theme.join(" ")
}

fn synthesize(members: &[&Memory], now: DateTime<Utc>) -> Memory {
    let pattern = shared_pattern(members);
    let knowledge = Knowledge::Consolidated {
        pattern: pattern.clone(),
        source_count: members.len(),
    };
    let summary = knowledge.summary_text();

    let mean_confidence =
        members.iter().map(|m| m.base_confidence).sum::<f64>() / members.len() as f64;
    let importance = members
        .iter()
        .map(|m| m.importance)
        .max()
        .unwrap_or(Importance::Normal);
    let mut tags: Vec<String> = members
        .iter()
        .flat_map(|m| m.tags.iter().cloned())
        .collect();
    tags.sort();
    tags.dedup();

    Memory::new(MemoryKind::Consolidated, summary, knowledge)
        .with_confidence(mean_confidence)
        .with_importance(importance)
        .with_tags(tags)
        .with_created_at(now)
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// Run one consolidation pass over the active episodes.
///
/// Must run on the serialized mutation path unless `dry_run` is set.
pub async fn run_consolidation(
    store: &dyn MemoryStore,
    embedder: &dyn EmbeddingProvider,
    options: &ConsolidationOptions,
    now: DateTime<Utc>,
) -> EngineResult<ConsolidationStats> {
    let episodes: Vec<Memory> = {
        let mut episodes: Vec<Memory> = store
            .all_active()
            .await?
            .into_iter()
            .filter(|m| m.kind == MemoryKind::Episode)
            .collect();
        episodes.sort_by(|a, b| a.id.cmp(&b.id));
        episodes
    };

    let mut stats = ConsolidationStats {
        episodes_processed: episodes.len(),
        ..Default::default()
    };

    for cluster in cluster_episodes(&episodes, options.similarity_threshold) {
        if cluster.len() < options.min_episodes {
            continue;
        }
        let members: Vec<&Memory> = cluster.iter().map(|i| &episodes[*i]).collect();
        let signature = cluster_signature(&members);

        if store
            .consolidation_by_signature(&signature)
            .await?
            .is_some()
        {
            debug!(
                event = "consolidation.cluster_skipped",
                signature = %signature,
                "cluster already consolidated"
            );
            continue;
        }

        let mut consolidated = synthesize(&members, now);
        let freed: usize = members
            .iter()
            .map(|m| estimated_tokens(m, CompressionLevel::FullDetail))
            .sum::<usize>()
            .saturating_sub(estimated_tokens(&consolidated, CompressionLevel::FullDetail));

        stats.memories_created += 1;
        stats.memories_pruned += members.len();
        stats.estimated_tokens_freed += freed;

        if options.dry_run {
            continue;
        }

        match embedder.embed(&consolidated.summary).await {
            Ok(vector) => consolidated.embedding = Some(vector),
            Err(e) => warn!(
                event = "consolidation.embedding_degraded",
                error = %e,
                "storing consolidated memory without embedding"
            ),
        }

        let links: Vec<CausalLink> = members
            .iter()
            .map(|m| {
                CausalLink::new(
                    consolidated.id.clone(),
                    m.id.clone(),
                    Relation::DerivedFrom,
                )
            })
            .collect();
        let produced_id = store.add_with_links(consolidated, links).await?;

        store
            .put_consolidation(ConsolidationRecord {
                cluster_signature: signature,
                source_episode_ids: members.iter().map(|m| m.id.clone()).collect(),
                produced_memory_id: produced_id,
                created_at: now,
            })
            .await?;

        for member in &members {
            store.soft_delete(&member.id).await?;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_store::{HashEmbedder, InMemoryStore, MemoryId};

    async fn episode(store: &InMemoryStore, embedder: &HashEmbedder, id: &str, summary: &str) {
        let mut m = Memory::new(
            MemoryKind::Episode,
            summary,
            Knowledge::Episode {
                interaction: summary.into(),
                outcome: None,
            },
        );
        m.id = MemoryId::from(id);
        m.embedding = Some(embedder.embed(summary).await.unwrap());
        store.add(m).await.unwrap();
    }

    async fn seed_cluster(store: &InMemoryStore, embedder: &HashEmbedder) {
        episode(store, embedder, "e1", "retried the flaky checkout deploy pipeline").await;
        episode(store, embedder, "e2", "retried the flaky checkout deploy pipeline again").await;
        episode(store, embedder, "e3", "checkout deploy pipeline flaky, retried twice").await;
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = Memory::new(
            MemoryKind::Episode,
            "a",
            Knowledge::Episode {
                interaction: "a".into(),
                outcome: None,
            },
        );
        let b = Memory::new(
            MemoryKind::Episode,
            "b",
            Knowledge::Episode {
                interaction: "b".into(),
                outcome: None,
            },
        );
        assert_eq!(cluster_signature(&[&a, &b]), cluster_signature(&[&b, &a]));
        assert_ne!(cluster_signature(&[&a]), cluster_signature(&[&a, &b]));
    }

    #[test]
    fn test_union_find_groups() {
        let mut uf = UnionFind::new(4);
        uf.union(0, 1);
        uf.union(2, 3);
        assert_eq!(uf.find(0), uf.find(1));
        assert_eq!(uf.find(2), uf.find(3));
        assert_ne!(uf.find(0), uf.find(2));
    }

    #[tokio::test]
    async fn test_consolidates_similar_episodes() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        seed_cluster(&store, &embedder).await;
        episode(&store, &embedder, "e9", "unrelated lunch conversation").await;

        let stats = run_consolidation(
            &store,
            &embedder,
            &ConsolidationOptions {
                similarity_threshold: 0.5,
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(stats.episodes_processed, 4);
        assert_eq!(stats.memories_created, 1);
        assert_eq!(stats.memories_pruned, 3);

        // sources soft-deleted, consolidated memory present and linked
        let active = store.all_active().await.unwrap();
        let consolidated: Vec<&Memory> = active
            .iter()
            .filter(|m| m.kind == MemoryKind::Consolidated)
            .collect();
        assert_eq!(consolidated.len(), 1);
        let links = store.links_from(&consolidated[0].id).await.unwrap();
        assert_eq!(links.len(), 3);
        assert!(links.iter().all(|l| l.relation == Relation::DerivedFrom));

        let remaining_episodes = active
            .iter()
            .filter(|m| m.kind == MemoryKind::Episode)
            .count();
        assert_eq!(remaining_episodes, 1);
    }

    #[tokio::test]
    async fn test_small_clusters_skipped() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        episode(&store, &embedder, "e1", "two similar episodes one").await;
        episode(&store, &embedder, "e2", "two similar episodes two").await;

        let stats = run_consolidation(
            &store,
            &embedder,
            &ConsolidationOptions {
                min_episodes: 3,
                similarity_threshold: 0.5,
                dry_run: false,
            },
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(stats.memories_created, 0);
        assert_eq!(store.all_active().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        seed_cluster(&store, &embedder).await;

        let options = ConsolidationOptions {
            similarity_threshold: 0.5,
            ..Default::default()
        };
        let first = run_consolidation(&store, &embedder, &options, Utc::now())
            .await
            .unwrap();
        assert_eq!(first.memories_created, 1);

        let second = run_consolidation(&store, &embedder, &options, Utc::now())
            .await
            .unwrap();
        assert_eq!(second.memories_created, 0);
        assert_eq!(second.memories_pruned, 0);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        seed_cluster(&store, &embedder).await;

        let stats = run_consolidation(
            &store,
            &embedder,
            &ConsolidationOptions {
                similarity_threshold: 0.5,
                dry_run: true,
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(stats.memories_created, 1);
        assert!(stats.estimated_tokens_freed > 0);
        // nothing actually written
        assert_eq!(store.all_active().await.unwrap().len(), 3);
        assert_eq!(store.count_consolidations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_consolidated_memory_inherits_members() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        for (id, summary) in [
            ("e1", "timeout raising the pool size"),
            ("e2", "timeout raising the pool size again"),
            ("e3", "pool size timeout raised once more"),
        ] {
            let mut m = Memory::new(
                MemoryKind::Episode,
                summary,
                Knowledge::Episode {
                    interaction: summary.into(),
                    outcome: None,
                },
            )
            .with_confidence(0.6)
            .with_importance(Importance::High)
            .with_tag("db");
            m.id = MemoryId::from(id);
            m.embedding = Some(embedder.embed(summary).await.unwrap());
            store.add(m).await.unwrap();
        }

        run_consolidation(
            &store,
            &embedder,
            &ConsolidationOptions {
                similarity_threshold: 0.5,
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

        let active = store.all_active().await.unwrap();
        let consolidated = active
            .iter()
            .find(|m| m.kind == MemoryKind::Consolidated)
            .unwrap();
        assert!((consolidated.base_confidence - 0.6).abs() < 1e-9);
        assert_eq!(consolidated.importance, Importance::High);
        assert!(consolidated.tags.contains(&"db".to_string()));
        assert!(consolidated.summary.contains("3 episodes"));
    }
}
