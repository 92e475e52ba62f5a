//! Prediction: anticipate which memories a caller will need next.
//!
//! Blends three signals: tag/topic overlap with the active context, causal
//! proximity to recently retrieved memories (inverse hop distance), and
//! effective confidence. Each result carries a short reason string built
//! from the dominant signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memoria_store::{tokenize, Memory, MemoryId, MemoryStore};

use crate::decay::{effective_confidence, DecayConfig};
use crate::error::EngineResult;
use crate::graph::CausalGraph;
use crate::retrieval::{priority_kinds, Intent};

/// Blend weights for the prediction score.
const OVERLAP_WEIGHT: f64 = 0.40;
const PROXIMITY_WEIGHT: f64 = 0.35;
const CONFIDENCE_WEIGHT: f64 = 0.25;

/// Graph radius considered "causally near".
const PROXIMITY_DEPTH: usize = 3;

/// Contextual signals for a prediction call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Tags describing what the caller is working on right now.
    pub active_tags: Vec<String>,
    /// Free-text focus, when available.
    pub focus: Option<String>,
    pub intent: Intent,
    /// Memories recently delivered to the caller.
    pub recent_memory_ids: Vec<MemoryId>,
    pub limit: usize,
}

/// One predicted memory with its reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub memory: Memory,
    pub score: f64,
    pub reason: String,
}

fn overlap_signal(request: &PredictRequest, memory: &Memory) -> (f64, Vec<String>) {
    let mut matched: Vec<String> = request
        .active_tags
        .iter()
        .filter(|t| memory.tags.contains(t))
        .cloned()
        .collect();
    let tag_part = if request.active_tags.is_empty() {
        0.0
    } else {
        matched.len() as f64 / request.active_tags.len() as f64
    };

    let focus_part = match &request.focus {
        Some(focus) => {
            let focus_tokens = tokenize(focus);
            if focus_tokens.is_empty() {
                0.0
            } else {
                let doc = tokenize(&memory.summary);
                let hits = focus_tokens.iter().filter(|t| doc.contains(t)).count();
                hits as f64 / focus_tokens.len() as f64
            }
        }
        None => 0.0,
    };

    matched.sort();
    (tag_part.max(focus_part), matched)
}

fn proximity_signal(
    graph: &CausalGraph,
    recent: &[MemoryId],
    id: &MemoryId,
) -> (f64, Option<(MemoryId, usize)>) {
    let mut best: Option<(MemoryId, usize)> = None;
    for anchor in recent {
        if let Some(distance) = graph.distance(anchor, id, PROXIMITY_DEPTH) {
            if distance == 0 {
                continue;
            }
            if best.as_ref().map(|(_, d)| distance < *d).unwrap_or(true) {
                best = Some((anchor.clone(), distance));
            }
        }
    }
    match &best {
        Some((_, distance)) => (1.0 / (1.0 + *distance as f64), best),
        None => (0.0, None),
    }
}

/// Rank active memories by anticipated usefulness.
pub async fn predict(
    store: &dyn MemoryStore,
    request: &PredictRequest,
    decay: &DecayConfig,
    now: DateTime<Utc>,
) -> EngineResult<Vec<Prediction>> {
    let graph = CausalGraph::from_links(store.all_links().await?);
    let limit = if request.limit == 0 { 10 } else { request.limit };

    let mut predictions: Vec<Prediction> = Vec::new();
    for memory in store.all_active().await? {
        if request.recent_memory_ids.contains(&memory.id) {
            continue;
        }

        let (overlap, matched_tags) = overlap_signal(request, &memory);
        let (proximity, anchor) = proximity_signal(&graph, &request.recent_memory_ids, &memory.id);
        let confidence = effective_confidence(&memory, now, decay);

        let mut score = OVERLAP_WEIGHT * overlap
            + PROXIMITY_WEIGHT * proximity
            + CONFIDENCE_WEIGHT * confidence;
        // kinds the intent prioritizes edge out otherwise-equal candidates
        if priority_kinds(request.intent).contains(&memory.kind) {
            score *= 1.1;
        }
        if score <= 0.0 {
            continue;
        }

        let weighted = [
            (OVERLAP_WEIGHT * overlap, 0usize),
            (PROXIMITY_WEIGHT * proximity, 1usize),
            (CONFIDENCE_WEIGHT * confidence, 2usize),
        ];
        let dominant = weighted
            .iter()
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, which)| *which)
            .unwrap_or(2);

        let reason = match dominant {
            0 if !matched_tags.is_empty() => {
                format!("shares tags [{}] with the active context", matched_tags.join(", "))
            }
            0 => "overlaps the current focus".to_string(),
            1 => match anchor {
                Some((anchor_id, distance)) => format!(
                    "causally linked to recently used memory {} (distance {})",
                    anchor_id.short(),
                    distance
                ),
                None => "causally near recent work".to_string(),
            },
            _ => format!("high effective confidence ({confidence:.2})"),
        };

        predictions.push(Prediction {
            memory,
            score,
            reason,
        });
    }

    predictions.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.memory.created_at.cmp(&b.memory.created_at))
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    predictions.truncate(limit);
    Ok(predictions)
}
