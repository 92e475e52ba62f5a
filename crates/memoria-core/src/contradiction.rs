//! Contradiction detection and confidence-penalty propagation.
//!
//! On every add/update of a factual-kind memory, similar existing memories
//! are checked for opposing claims. A confirmed contradiction records a
//! `contradicts` link, penalizes the older memory's base confidence, and
//! propagates a diminishing share of that penalty along
//! `supports`/`derived_from` edges.
//!
//! Thresholds are defaults, not guarantees; deployments tune them on
//! [`ContradictionConfig`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use memoria_store::{
    hybrid_search, CausalLink, EmbeddingProvider, Memory, MemoryId, MemoryKind, MemoryPatch,
    MemoryStore, Relation, SearchRequest,
};

use crate::error::EngineResult;
use crate::graph::{CausalGraph, Direction};

/// A pair of patterns whose split across two summaries signals opposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegationPattern {
    pub positive: String,
    pub negative: String,
}

impl NegationPattern {
    fn new(positive: &str, negative: &str) -> Self {
        Self {
            positive: positive.to_string(),
            negative: negative.to_string(),
        }
    }
}

/// Tunables for contradiction handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContradictionConfig {
    /// Minimum search similarity before two memories are compared at all.
    pub similarity_threshold: f64,
    /// Relative reduction applied to the older memory's base confidence.
    pub penalty_ratio: f64,
    /// Share of the applied delta propagated per hop (halved again each hop).
    pub propagation_fraction: f64,
    /// Maximum propagation depth.
    pub propagation_depth: usize,
    /// Candidate pool size pulled from search.
    pub candidate_limit: usize,
    pub negation_patterns: Vec<NegationPattern>,
}

impl Default for ContradictionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            penalty_ratio: 0.30,
            propagation_fraction: 0.50,
            propagation_depth: 2,
            candidate_limit: 20,
            negation_patterns: vec![
                NegationPattern::new(r"\balways\b", r"\bnever\b"),
                NegationPattern::new(r"\buse\b", r"\b(?:avoid|do not use|don't use)\b"),
                NegationPattern::new(r"\bshould\b", r"\bshould (?:not|never)\b|\bshouldn't\b"),
                NegationPattern::new(r"\bdo\b", r"\bdo not\b|\bdon't\b"),
                NegationPattern::new(r"\bis\b", r"\bis not\b|\bisn't\b"),
                NegationPattern::new(r"\benable\b", r"\bdisable\b"),
            ],
        }
    }
}

/// A propagated confidence reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagatedPenalty {
    pub memory_id: MemoryId,
    pub reduction: f64,
    pub depth: usize,
}

/// One confirmed contradiction and everything that was done about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContradictionReport {
    pub memory_id: MemoryId,
    pub contradicted_id: MemoryId,
    /// Id of the older of the two (the one that took the direct penalty).
    pub penalized_id: MemoryId,
    pub penalty_applied: f64,
    pub propagated: Vec<PropagatedPenalty>,
}

/// Compiled detector. Construct once per engine; invalid user patterns are
/// skipped with a warning.
pub struct ContradictionDetector {
    config: ContradictionConfig,
    compiled: Vec<(Regex, Regex)>,
}

impl ContradictionDetector {
    pub fn new(config: ContradictionConfig) -> Self {
        let mut compiled = Vec::new();
        for pattern in &config.negation_patterns {
            match (Regex::new(&pattern.positive), Regex::new(&pattern.negative)) {
                (Ok(pos), Ok(neg)) => compiled.push((pos, neg)),
                _ => warn!(
                    event = "contradiction.pattern_skipped",
                    positive = %pattern.positive,
                    negative = %pattern.negative,
                    "invalid negation pattern"
                ),
            }
        }
        Self { config, compiled }
    }

    pub fn config(&self) -> &ContradictionConfig {
        &self.config
    }

    /// Whether two summaries assert opposing claims under the pattern table.
    ///
    /// A pattern pair fires when its positive side matches exactly one of
    /// the summaries and its negative side matches the other.
    pub fn summaries_oppose(&self, a: &str, b: &str) -> bool {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        self.compiled.iter().any(|(pos, neg)| {
            (pos.is_match(&a) && !neg.is_match(&a) && neg.is_match(&b))
                || (pos.is_match(&b) && !neg.is_match(&b) && neg.is_match(&a))
        })
    }

    /// Check `memory` against existing similar memories and apply penalties.
    ///
    /// `explicit_targets` are ids the caller asserted a `contradicts` link
    /// against; they bypass negation-pattern matching (but still require
    /// scope overlap via search).
    ///
    /// Must run on the serialized mutation path: it writes links and
    /// confidence updates.
    pub async fn detect_and_apply(
        &self,
        store: &dyn MemoryStore,
        embedder: &dyn EmbeddingProvider,
        memory: &Memory,
        explicit_targets: &[MemoryId],
    ) -> EngineResult<Vec<ContradictionReport>> {
        if !memory.kind.is_factual() {
            return Ok(Vec::new());
        }

        let factual_kinds: Vec<MemoryKind> = MemoryKind::all()
            .iter()
            .filter(|k| k.is_factual())
            .copied()
            .collect();
        let request = SearchRequest::new(memory.summary.as_str())
            .with_kinds(factual_kinds)
            .with_limit(self.config.candidate_limit);
        let hits = hybrid_search(store, embedder, &request).await?;

        let mut reports = Vec::new();
        for hit in hits {
            let candidate = hit.memory;
            if candidate.id == memory.id {
                continue;
            }
            let explicit = explicit_targets.contains(&candidate.id);
            // Scope gate: semantically close, in overlapping territory.
            if !explicit {
                if hit.score < self.config.similarity_threshold {
                    continue;
                }
                if !memory.shares_tag_with(&candidate) && hit.lexical == 0.0 {
                    continue;
                }
                if !self.summaries_oppose(&memory.summary, &candidate.summary) {
                    continue;
                }
            }

            let report = self
                .apply_penalty(store, memory, &candidate)
                .await?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Record the `contradicts` link, penalize the older memory, and
    /// propagate a diminishing share of the delta.
    async fn apply_penalty(
        &self,
        store: &dyn MemoryStore,
        memory: &Memory,
        candidate: &Memory,
    ) -> EngineResult<ContradictionReport> {
        store
            .add_link(CausalLink::new(
                memory.id.clone(),
                candidate.id.clone(),
                Relation::Contradicts,
            ))
            .await?;

        let older = if candidate.created_at <= memory.created_at {
            candidate
        } else {
            memory
        };

        let penalty = older.base_confidence * self.config.penalty_ratio;
        let reduced = (older.base_confidence - penalty).max(0.0);
        store
            .update(&older.id, MemoryPatch::confidence(reduced))
            .await?;

        let propagated = self
            .propagate(store, &older.id, penalty, &[&memory.id, &candidate.id])
            .await?;

        Ok(ContradictionReport {
            memory_id: memory.id.clone(),
            contradicted_id: candidate.id.clone(),
            penalized_id: older.id.clone(),
            penalty_applied: penalty,
            propagated,
        })
    }

    /// Reduce confidence of memories causally connected to `origin`.
    ///
    /// Each hop halves the propagated fraction again; the reduction never
    /// drives confidence below 0 and never touches never-decays kinds.
    async fn propagate(
        &self,
        store: &dyn MemoryStore,
        origin: &MemoryId,
        applied_delta: f64,
        exclude: &[&MemoryId],
    ) -> EngineResult<Vec<PropagatedPenalty>> {
        let graph = CausalGraph::from_links(store.all_links().await?);
        let nodes = graph.traverse_relations(
            origin,
            Direction::Both,
            self.config.propagation_depth,
            &[Relation::Supports, Relation::DerivedFrom],
        );

        let mut propagated = Vec::new();
        for node in nodes {
            if exclude.contains(&&node.id) {
                continue;
            }
            let Some(target) = store.get(&node.id).await? else {
                continue;
            };
            if target.soft_deleted || target.kind.never_decays() {
                continue;
            }
            let reduction =
                applied_delta * self.config.propagation_fraction.powi(node.depth as i32);
            if reduction <= 0.0 {
                continue;
            }
            let reduced = (target.base_confidence - reduction).max(0.0);
            store
                .update(&target.id, MemoryPatch::confidence(reduced))
                .await?;
            propagated.push(PropagatedPenalty {
                memory_id: target.id.clone(),
                reduction,
                depth: node.depth,
            });
        }
        Ok(propagated)
    }
}
