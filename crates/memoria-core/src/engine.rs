//! The engine facade: one object exposing the full operation contract.
//!
//! `MemoryEngine` owns the store, the embedding provider, and the
//! configuration. All mutating operations are serialized through a single
//! write lock so that contradiction propagation, consolidation clustering,
//! and validation healing always observe a consistent snapshot; reads run
//! concurrently against the committed state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use memoria_store::{
    hybrid_search, CausalLink, EmbeddingProvider, Importance, Knowledge, ListFilter, Memory,
    MemoryId, MemoryKind, MemoryPatch, MemoryStore, Page, Relation, SearchHit, SearchRequest,
};

use crate::config::EngineConfig;
use crate::consolidation::{run_consolidation, ConsolidationOptions, ConsolidationStats};
use crate::contradiction::{ContradictionDetector, ContradictionReport};
use crate::decay::effective_confidence;
use crate::error::{EngineError, EngineResult};
use crate::graph::{explain, CausalGraph, Direction, Narrative, TraversalNode};
use crate::learning::{
    apply_feedback, learn_from_correction, CorrectionRequest, FeedbackAction, LearningOutcome,
};
use crate::obs;
use crate::prediction::{predict, PredictRequest, Prediction};
use crate::retrieval::{
    priority_kinds, select_within_budget, RetrieveRequest, RetrieveResult, ScoredCandidate,
};
use crate::session::SessionManager;
use crate::status::{compute_status, EngineStatus};
use crate::validation::{run_validation, ValidationOptions, ValidationStats};

/// A memory submitted through the write boundary.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub kind: MemoryKind,
    pub summary: String,
    pub knowledge: Knowledge,
    /// Defaults to 0.8 when absent; always clamped to `[0,1]`.
    pub base_confidence: Option<f64>,
    pub importance: Importance,
    pub tags: Vec<String>,
    /// Immediate links persisted atomically with the memory.
    pub links: Vec<(MemoryId, Relation)>,
}

impl NewMemory {
    pub fn new(kind: MemoryKind, summary: impl Into<String>, knowledge: Knowledge) -> Self {
        Self {
            kind,
            summary: summary.into(),
            knowledge,
            base_confidence: None,
            importance: Importance::Normal,
            tags: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.base_confidence = Some(confidence);
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_tags<I: IntoIterator<Item = String>>(mut self, tags: I) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_link(mut self, target: MemoryId, relation: Relation) -> Self {
        self.links.push((target, relation));
        self
    }
}

/// Result of an `add`: the stored memory plus any contradictions it
/// triggered.
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub memory: Memory,
    pub contradictions: Vec<ContradictionReport>,
}

/// The Memoria engine.
pub struct MemoryEngine {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: EngineConfig,
    detector: ContradictionDetector,
    sessions: SessionManager,
    /// Serializes every mutating operation (spec: single-writer discipline).
    write_lock: tokio::sync::Mutex<()>,
    /// Single-flight guard for consolidation passes.
    consolidating: AtomicBool,
}

impl MemoryEngine {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Self {
        let detector = ContradictionDetector::new(config.contradiction.clone());
        let sessions = SessionManager::new(store.clone(), config.session.ttl);
        Self {
            store,
            embedder,
            config,
            detector,
            sessions,
            write_lock: tokio::sync::Mutex::new(()),
            consolidating: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// Embed text, absorbing provider failures into `None`.
    async fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        match self.embedder.embed(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(
                    event = "engine.embedding_degraded",
                    provider = self.embedder.name(),
                    error = %e,
                    "storing without embedding"
                );
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    /// Persist a new memory, run contradiction detection, and return both.
    ///
    /// Structural errors (`ValidationFailure`) are rejected before any
    /// persistence occurs.
    pub async fn add(&self, new: NewMemory) -> EngineResult<AddOutcome> {
        if new.knowledge.kind() != new.kind {
            return Err(EngineError::ValidationFailure {
                reason: format!(
                    "knowledge payload is {} but memory kind is {}",
                    new.knowledge.kind(),
                    new.kind
                ),
            });
        }
        if !new.knowledge.is_well_formed() {
            return Err(EngineError::ValidationFailure {
                reason: format!("malformed {} payload", new.kind),
            });
        }

        let mut memory = Memory::new(new.kind, new.summary, new.knowledge)
            .with_importance(new.importance)
            .with_tags(new.tags);
        if let Some(confidence) = new.base_confidence {
            memory = memory.with_confidence(confidence);
        }
        memory.embedding = self.try_embed(&memory.summary).await;

        let links: Vec<CausalLink> = new
            .links
            .iter()
            .map(|(target, relation)| {
                CausalLink::new(memory.id.clone(), target.clone(), *relation)
            })
            .collect();
        let explicit_contradictions: Vec<MemoryId> = new
            .links
            .iter()
            .filter(|(_, relation)| *relation == Relation::Contradicts)
            .map(|(target, _)| target.clone())
            .collect();

        let _guard = self.write_lock.lock().await;
        self.store.add_with_links(memory.clone(), links).await?;

        let contradictions = self
            .detector
            .detect_and_apply(
                self.store.as_ref(),
                self.embedder.as_ref(),
                &memory,
                &explicit_contradictions,
            )
            .await?;
        drop(_guard);

        obs::emit_memory_added(memory.id.as_str(), &memory.kind.to_string(), new.links.len());
        for report in &contradictions {
            obs::emit_contradiction_detected(
                report.memory_id.as_str(),
                report.contradicted_id.as_str(),
                report.penalty_applied,
                report.propagated.len(),
            );
        }

        // Return the stored view (the direct penalty may have touched it
        // when the new memory was the older side of a contradiction).
        let memory = self.store.get(&memory.id).await?.unwrap_or(memory);
        Ok(AddOutcome {
            memory,
            contradictions,
        })
    }

    /// Apply a patch. A changed summary on a factual memory re-runs
    /// contradiction detection.
    pub async fn update(&self, id: &MemoryId, patch: MemoryPatch) -> EngineResult<Memory> {
        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound { id: id.0.clone() })?;
        if let Some(ref knowledge) = patch.knowledge {
            if knowledge.kind() != existing.kind {
                return Err(EngineError::ValidationFailure {
                    reason: format!(
                        "knowledge payload is {} but memory kind is {}",
                        knowledge.kind(),
                        existing.kind
                    ),
                });
            }
        }
        let summary_changed = patch
            .summary
            .as_ref()
            .map(|s| *s != existing.summary)
            .unwrap_or(false);

        let _guard = self.write_lock.lock().await;
        let mut updated = self.store.update(id, patch).await?;
        if summary_changed {
            // keep the stored vector in step with the summary
            if let Some(embedding) = self.try_embed(&updated.summary).await {
                updated = self
                    .store
                    .update(
                        id,
                        MemoryPatch {
                            embedding: Some(embedding),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            if updated.kind.is_factual() {
                self.detector
                    .detect_and_apply(self.store.as_ref(), self.embedder.as_ref(), &updated, &[])
                    .await?;
            }
        }
        Ok(updated)
    }

    /// Soft-delete a memory.
    pub async fn delete(&self, id: &MemoryId) -> EngineResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.soft_delete(id).await.map_err(|e| match e {
            memoria_store::StoreError::MemoryNotFound { id } => EngineError::NotFound { id },
            other => EngineError::Storage(other),
        })
    }

    /// Record explicit feedback on a memory.
    pub async fn feedback(
        &self,
        id: &MemoryId,
        action: FeedbackAction,
        new_summary: Option<String>,
    ) -> EngineResult<Memory> {
        let _guard = self.write_lock.lock().await;
        apply_feedback(self.store.as_ref(), id, action, new_summary).await
    }

    /// Learn from a correction event.
    pub async fn learn(&self, request: &CorrectionRequest) -> EngineResult<LearningOutcome> {
        let _guard = self.write_lock.lock().await;
        learn_from_correction(
            self.store.as_ref(),
            self.embedder.as_ref(),
            request,
            Utc::now(),
        )
        .await
    }

    /// Run a validation sweep.
    pub async fn validate(&self, options: &ValidationOptions) -> EngineResult<ValidationStats> {
        let _guard = self.write_lock.lock().await;
        let stats = run_validation(
            self.store.as_ref(),
            options,
            &self.config.decay,
            Utc::now(),
        )
        .await?;
        obs::emit_validation_finished(&stats);
        Ok(stats)
    }

    /// Run a consolidation pass.
    ///
    /// A second pass requested while one is running aborts cleanly and
    /// returns a zeroed no-op result, not an error.
    pub async fn consolidate(
        &self,
        options: &ConsolidationOptions,
    ) -> EngineResult<ConsolidationStats> {
        if self
            .consolidating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(
                event = "consolidation.already_in_progress",
                "skipping overlapping consolidation pass"
            );
            return Ok(ConsolidationStats::default());
        }

        let result = async {
            let _guard = self.write_lock.lock().await;
            run_consolidation(
                self.store.as_ref(),
                self.embedder.as_ref(),
                options,
                Utc::now(),
            )
            .await
        }
        .await;
        self.consolidating.store(false, Ordering::SeqCst);

        let stats = result?;
        obs::emit_consolidation_finished(&stats, options.dry_run);
        Ok(stats)
    }

    /// Consolidation with the configured defaults (background jobs).
    pub async fn consolidate_defaults(&self) -> EngineResult<ConsolidationStats> {
        let defaults = ConsolidationOptions {
            min_episodes: self.config.consolidation.min_episodes,
            similarity_threshold: self.config.consolidation.similarity_threshold,
            dry_run: false,
        };
        self.consolidate(&defaults).await
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    /// Point lookup. `None` for unknown ids.
    pub async fn get(&self, id: &MemoryId) -> EngineResult<Option<Memory>> {
        Ok(self.store.get(id).await?)
    }

    /// Filtered listing.
    pub async fn list(
        &self,
        filter: &ListFilter,
        cursor: Option<String>,
        limit: usize,
    ) -> EngineResult<Page> {
        Ok(self.store.list(filter, cursor, limit).await?)
    }

    /// Hybrid search over active memories.
    pub async fn search(&self, request: &SearchRequest) -> EngineResult<Vec<SearchHit>> {
        Ok(hybrid_search(self.store.as_ref(), self.embedder.as_ref(), request).await?)
    }

    /// Intent-aware, budget-constrained, session-deduplicated retrieval.
    pub async fn retrieve(&self, request: &RetrieveRequest) -> EngineResult<RetrieveResult> {
        let now = Utc::now();
        self.sessions.touch(&request.session_id, now).await?;
        let sent = self.sessions.sent_set(&request.session_id).await?;

        let search_request = SearchRequest::new(request.focus.as_str())
            .with_kinds(priority_kinds(request.intent).to_vec())
            .with_limit(self.config.retrieval.candidate_limit);
        let hits = hybrid_search(self.store.as_ref(), self.embedder.as_ref(), &search_request)
            .await?;

        let candidates: Vec<ScoredCandidate> = hits
            .into_iter()
            .filter(|hit| !sent.contains(hit.memory.id.as_str()))
            .map(|hit| {
                let confidence = effective_confidence(&hit.memory, now, &self.config.decay);
                ScoredCandidate {
                    score: confidence * hit.score,
                    memory: hit.memory,
                }
            })
            .collect();

        let result = select_within_budget(candidates, request.max_tokens, request.compression);

        let accepted: Vec<MemoryId> = result
            .memories
            .iter()
            .map(|m| m.memory.id.clone())
            .collect();
        if !accepted.is_empty() {
            let _guard = self.write_lock.lock().await;
            self.sessions
                .mark_sent(&request.session_id, &accepted, now)
                .await?;
            for id in &accepted {
                self.store.touch_access(id, now).await?;
            }
        }

        obs::emit_retrieval_served(
            &request.session_id,
            result.memories.len(),
            result.tokens_used,
        );
        Ok(result)
    }

    /// Rank memories the caller is likely to need next.
    pub async fn predict(&self, request: &PredictRequest) -> EngineResult<Vec<Prediction>> {
        predict(
            self.store.as_ref(),
            request,
            &self.config.decay,
            Utc::now(),
        )
        .await
    }

    /// Bounded graph traversal from a memory.
    pub async fn traverse(
        &self,
        id: &MemoryId,
        direction: Direction,
        max_depth: usize,
    ) -> EngineResult<Vec<TraversalNode>> {
        self.require_exists(id).await?;
        let graph = CausalGraph::from_links(self.store.all_links().await?);
        Ok(graph.traverse(id, direction, max_depth))
    }

    /// Chronological causal narrative for a memory.
    pub async fn explain(&self, id: &MemoryId, max_depth: usize) -> EngineResult<Narrative> {
        self.require_exists(id).await?;
        let graph = CausalGraph::from_links(self.store.all_links().await?);

        // Label every reachable node, soft-deleted ancestors included.
        let mut labels: HashMap<String, Memory> = HashMap::new();
        let mut wanted: Vec<MemoryId> = vec![id.clone()];
        wanted.extend(
            graph
                .traverse(id, Direction::Out, max_depth)
                .into_iter()
                .map(|node| node.id),
        );
        for node_id in wanted {
            if let Some(memory) = self.store.get(&node_id).await? {
                labels.insert(node_id.0.clone(), memory);
            }
        }

        Ok(explain(&graph, &labels, id, max_depth))
    }

    /// Aggregate status and health score.
    pub async fn status(&self) -> EngineResult<EngineStatus> {
        compute_status(
            self.store.as_ref(),
            &self.config.decay,
            self.config.validation.low_confidence_threshold,
            Utc::now(),
        )
        .await
    }

    /// Evict idle sessions. Returns the eviction count.
    pub async fn sweep_sessions(&self) -> EngineResult<usize> {
        self.sessions.sweep_expired(Utc::now()).await
    }

    async fn require_exists(&self, id: &MemoryId) -> EngineResult<()> {
        if self.store.get(id).await?.is_none() {
            return Err(EngineError::NotFound { id: id.0.clone() });
        }
        Ok(())
    }
}
