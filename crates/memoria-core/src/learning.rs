//! Learning from corrections and explicit feedback.
//!
//! A correction event becomes a corrective feedback memory (plus a paired
//! anti-pattern when the rejected behavior is known), linked `derived_from`
//! its context. An existing memory whose summary textually matches the
//! corrected statement is implicitly rejected and superseded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use memoria_store::{
    lexical_score, tokenize, CausalLink, EmbeddingProvider, Knowledge, Memory, MemoryId,
    MemoryKind, MemoryPatch, MemoryStore, Relation,
};

use crate::error::{EngineError, EngineResult};

/// Feedback actions and their confidence arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackAction {
    /// `base = min(1, base + 0.10)`
    Confirm,
    /// `base = max(0, base × 0.70)`
    Reject,
    /// `base = max(0, base − 0.10)`, optionally replacing the summary.
    Modify,
}

impl std::str::FromStr for FeedbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm" => Ok(Self::Confirm),
            "reject" => Ok(Self::Reject),
            "modify" => Ok(Self::Modify),
            other => Err(other.to_string()),
        }
    }
}

/// Confidence adjustment for an action. Clamped to `[0,1]`.
pub fn adjusted_confidence(base: f64, action: FeedbackAction) -> f64 {
    match action {
        FeedbackAction::Confirm => (base + 0.10).min(1.0),
        FeedbackAction::Reject => (base * 0.70).max(0.0),
        FeedbackAction::Modify => (base - 0.10).max(0.0),
    }
}

/// Apply feedback to a stored memory.
///
/// Adjusts the *base* confidence only; effective confidence is always
/// recomputed from the unchanged age at read time.
pub async fn apply_feedback(
    store: &dyn MemoryStore,
    id: &MemoryId,
    action: FeedbackAction,
    new_summary: Option<String>,
) -> EngineResult<Memory> {
    let memory = store
        .get(id)
        .await?
        .ok_or_else(|| EngineError::NotFound { id: id.0.clone() })?;

    let mut patch = MemoryPatch::confidence(adjusted_confidence(memory.base_confidence, action));
    if action == FeedbackAction::Modify {
        if let Some(summary) = new_summary {
            patch.summary = Some(summary);
        }
    }
    Ok(store.update(id, patch).await?)
}

// ---------------------------------------------------------------------------
// Corrections
// ---------------------------------------------------------------------------

/// A correction event captured from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionRequest {
    /// The statement or behavior being corrected.
    pub original: String,
    /// The corrected statement.
    pub correction: String,
    /// Optional artifact demonstrating the corrected form.
    pub corrected_artifact: Option<String>,
    /// Tags describing the context the correction arose in.
    pub context_tags: Vec<String>,
    /// Memories the correction was derived from.
    pub related_memories: Vec<MemoryId>,
}

/// What a correction produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub created_memory_ids: Vec<MemoryId>,
    pub extracted_principles: Vec<String>,
    /// Memories implicitly rejected and superseded by the correction.
    pub superseded_memory_ids: Vec<MemoryId>,
}

/// Sentences of the correction that read as general rules.
fn extract_principles(correction: &str) -> Vec<String> {
    correction
        .split(['.', ';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let lower = s.to_lowercase();
            ["always", "never", "should", "must", "prefer", "avoid"]
                .iter()
                .any(|marker| lower.contains(marker))
        })
        .map(str::to_string)
        .collect()
}

/// Overlap threshold above which an existing summary counts as a textual
/// match of the corrected statement.
const SUPERSEDE_OVERLAP: f64 = 0.8;

/// Turn a correction into new memories plus causal links.
///
/// Must run on the serialized mutation path.
pub async fn learn_from_correction(
    store: &dyn MemoryStore,
    embedder: &dyn EmbeddingProvider,
    request: &CorrectionRequest,
    now: DateTime<Utc>,
) -> EngineResult<LearningOutcome> {
    if request.correction.trim().is_empty() {
        return Err(EngineError::ValidationFailure {
            reason: "correction text is empty".to_string(),
        });
    }

    let mut outcome = LearningOutcome {
        extracted_principles: extract_principles(&request.correction),
        ..Default::default()
    };

    // Existing memories whose summary textually matches the original are
    // implicitly rejected.
    let original_tokens = tokenize(&request.original);
    if !original_tokens.is_empty() {
        for existing in store.all_active().await? {
            if lexical_score(&original_tokens, &existing) >= SUPERSEDE_OVERLAP {
                let rejected =
                    adjusted_confidence(existing.base_confidence, FeedbackAction::Reject);
                store
                    .update(&existing.id, MemoryPatch::confidence(rejected))
                    .await?;
                outcome.superseded_memory_ids.push(existing.id.clone());
            }
        }
    }

    // The corrective fact itself.
    let mut corrective = Memory::new(
        MemoryKind::Feedback,
        request.correction.clone(),
        Knowledge::Feedback {
            verdict: "correction".to_string(),
            detail: request.original.clone(),
        },
    )
    .with_confidence(0.9)
    .with_tags(request.context_tags.iter().cloned())
    .with_created_at(now);
    match embedder.embed(&corrective.summary).await {
        Ok(vector) => corrective.embedding = Some(vector),
        Err(e) => warn!(
            event = "learning.embedding_degraded",
            error = %e,
            "storing corrective memory without embedding"
        ),
    }

    let mut links: Vec<CausalLink> = request
        .related_memories
        .iter()
        .map(|related| {
            CausalLink::new(corrective.id.clone(), related.clone(), Relation::DerivedFrom)
        })
        .collect();
    for superseded in &outcome.superseded_memory_ids {
        links.push(CausalLink::new(
            corrective.id.clone(),
            superseded.clone(),
            Relation::Supersedes,
        ));
    }

    let corrective_id = store.add_with_links(corrective, links).await?;
    outcome.created_memory_ids.push(corrective_id.clone());

    // Paired anti-pattern when we know what was wrong.
    if !request.original.trim().is_empty() {
        let remedy = match &request.corrected_artifact {
            Some(artifact) => format!("{} (see: {artifact})", request.correction),
            None => request.correction.clone(),
        };
        let mut anti = Memory::new(
            MemoryKind::AntiPattern,
            format!("avoid {}; instead {}", request.original, request.correction),
            Knowledge::AntiPattern {
                pattern: request.original.clone(),
                remedy,
            },
        )
        .with_confidence(0.85)
        .with_tags(request.context_tags.iter().cloned())
        .with_created_at(now);
        if let Ok(vector) = embedder.embed(&anti.summary).await {
            anti.embedding = Some(vector);
        }
        let anti_links = vec![CausalLink::new(
            anti.id.clone(),
            corrective_id.clone(),
            Relation::LearnedFrom,
        )];
        let anti_id = store.add_with_links(anti, anti_links).await?;
        outcome.created_memory_ids.push(anti_id);
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_store::{HashEmbedder, InMemoryStore};

    fn note(summary: &str) -> Memory {
        Memory::new(
            MemoryKind::Note,
            summary,
            Knowledge::Note {
                text: summary.into(),
            },
        )
    }

    #[test]
    fn test_feedback_arithmetic() {
        // confirm clamps at 1.0
        assert!((adjusted_confidence(0.95, FeedbackAction::Confirm) - 1.0).abs() < 1e-9);
        assert!((adjusted_confidence(0.5, FeedbackAction::Confirm) - 0.6).abs() < 1e-9);
        // reject is multiplicative: 0.8 × 0.70 = 0.56 exactly
        assert!((adjusted_confidence(0.8, FeedbackAction::Reject) - 0.56).abs() < 1e-12);
        // modify floors at 0
        assert!((adjusted_confidence(0.05, FeedbackAction::Modify) - 0.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_apply_feedback_confirm_and_modify() {
        let store = InMemoryStore::new();
        let id = store.add(note("original").with_confidence(0.5)).await.unwrap();

        let confirmed = apply_feedback(&store, &id, FeedbackAction::Confirm, None)
            .await
            .unwrap();
        assert!((confirmed.base_confidence - 0.6).abs() < 1e-9);

        let modified = apply_feedback(
            &store,
            &id,
            FeedbackAction::Modify,
            Some("rewritten".to_string()),
        )
        .await
        .unwrap();
        assert!((modified.base_confidence - 0.5).abs() < 1e-9);
        assert_eq!(modified.summary, "rewritten");
    }

    #[tokio::test]
    async fn test_apply_feedback_unknown_id() {
        let store = InMemoryStore::new();
        let err = apply_feedback(
            &store,
            &MemoryId::from("missing"),
            FeedbackAction::Confirm,
            None,
        )
        .await;
        assert!(matches!(err, Err(EngineError::NotFound { .. })));
    }

    #[test]
    fn test_extract_principles() {
        let principles = extract_principles(
            "Always pin the toolchain version. The build broke. Prefer lockfiles over ranges.",
        );
        assert_eq!(principles.len(), 2);
        assert!(principles[0].contains("Always pin"));
    }

    #[tokio::test]
    async fn test_correction_creates_fact_and_anti_pattern() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        let related = store.add(note("context memory")).await.unwrap();

        let outcome = learn_from_correction(
            &store,
            &embedder,
            &CorrectionRequest {
                original: "retry forever on 5xx".into(),
                correction: "always cap retries with exponential backoff".into(),
                corrected_artifact: None,
                context_tags: vec!["http".into()],
                related_memories: vec![related.clone()],
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.created_memory_ids.len(), 2);
        assert_eq!(outcome.extracted_principles.len(), 1);

        let corrective = store
            .get(&outcome.created_memory_ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(corrective.kind, MemoryKind::Feedback);
        let links = store.links_from(&corrective.id).await.unwrap();
        assert!(links
            .iter()
            .any(|l| l.target_id == related && l.relation == Relation::DerivedFrom));

        let anti = store
            .get(&outcome.created_memory_ids[1])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(anti.kind, MemoryKind::AntiPattern);
    }

    #[tokio::test]
    async fn test_correction_supersedes_textual_match() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        let stale = store
            .add(note("retry forever on 5xx").with_confidence(0.8))
            .await
            .unwrap();

        let outcome = learn_from_correction(
            &store,
            &embedder,
            &CorrectionRequest {
                original: "retry forever on 5xx".into(),
                correction: "never retry without a budget".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.superseded_memory_ids, vec![stale.clone()]);
        // reject penalty applied: 0.8 × 0.70
        let rejected = store.get(&stale).await.unwrap().unwrap();
        assert!((rejected.base_confidence - 0.56).abs() < 1e-9);

        // supersedes link from the corrective memory
        let corrective_id = &outcome.created_memory_ids[0];
        let links = store.links_from(corrective_id).await.unwrap();
        assert!(links
            .iter()
            .any(|l| l.target_id == stale && l.relation == Relation::Supersedes));
    }

    #[tokio::test]
    async fn test_empty_correction_rejected() {
        let store = InMemoryStore::new();
        let embedder = HashEmbedder::default();
        let err = learn_from_correction(
            &store,
            &embedder,
            &CorrectionRequest::default(),
            Utc::now(),
        )
        .await;
        assert!(matches!(err, Err(EngineError::ValidationFailure { .. })));
    }
}
