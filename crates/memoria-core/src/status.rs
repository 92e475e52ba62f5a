//! Aggregate engine status and health scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memoria_store::{MemoryKind, MemoryStore};

use crate::decay::{effective_confidence, DecayConfig};
use crate::error::EngineResult;

/// Aggregate health report for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub total_memories: usize,
    pub average_effective_confidence: f64,
    /// Memories whose effective confidence sits below the low threshold.
    pub low_confidence_count: usize,
    /// Active episodes still awaiting consolidation.
    pub pending_consolidation: usize,
    /// 0-100 blend of the aggregates above.
    pub health_score: u8,
}

/// Compute the status over the active memory set.
pub async fn compute_status(
    store: &dyn MemoryStore,
    decay: &DecayConfig,
    low_confidence_threshold: f64,
    now: DateTime<Utc>,
) -> EngineResult<EngineStatus> {
    let active = store.all_active().await?;

    let total_memories = active.len();
    let mut confidence_sum = 0.0;
    let mut low_confidence_count = 0;
    let mut pending_consolidation = 0;

    for memory in &active {
        let confidence = effective_confidence(memory, now, decay);
        confidence_sum += confidence;
        if confidence < low_confidence_threshold {
            low_confidence_count += 1;
        }
        if memory.kind == MemoryKind::Episode {
            pending_consolidation += 1;
        }
    }

    let average_effective_confidence = if total_memories > 0 {
        confidence_sum / total_memories as f64
    } else {
        0.0
    };

    let health_score = if total_memories == 0 {
        // an empty store is healthy, just unused
        100
    } else {
        let low_ratio = low_confidence_count as f64 / total_memories as f64;
        let pending_ratio = pending_consolidation as f64 / total_memories as f64;
        let blended = 0.5 * average_effective_confidence
            + 0.3 * (1.0 - low_ratio)
            + 0.2 * (1.0 - pending_ratio);
        (blended * 100.0).round().clamp(0.0, 100.0) as u8
    };

    Ok(EngineStatus {
        total_memories,
        average_effective_confidence,
        low_confidence_count,
        pending_consolidation,
        health_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use memoria_store::{InMemoryStore, Knowledge, Memory};

    #[tokio::test]
    async fn test_empty_store_status() {
        let store = InMemoryStore::new();
        let status = compute_status(&store, &DecayConfig::default(), 0.3, Utc::now())
            .await
            .unwrap();
        assert_eq!(status.total_memories, 0);
        assert_eq!(status.health_score, 100);
        assert_eq!(status.average_effective_confidence, 0.0);
    }

    #[tokio::test]
    async fn test_counts_and_average() {
        let store = InMemoryStore::new();
        store
            .add(
                Memory::new(
                    MemoryKind::Note,
                    "strong",
                    Knowledge::Note {
                        text: "strong".into(),
                    },
                )
                .with_confidence(1.0),
            )
            .await
            .unwrap();
        // a decayed episode far below the low threshold
        store
            .add(
                Memory::new(
                    MemoryKind::Episode,
                    "faded",
                    Knowledge::Episode {
                        interaction: "faded".into(),
                        outcome: None,
                    },
                )
                .with_confidence(1.0)
                .with_created_at(Utc::now() - Duration::days(60)),
            )
            .await
            .unwrap();

        let status = compute_status(&store, &DecayConfig::default(), 0.3, Utc::now())
            .await
            .unwrap();
        assert_eq!(status.total_memories, 2);
        assert_eq!(status.low_confidence_count, 1);
        assert_eq!(status.pending_consolidation, 1);
        assert!(status.average_effective_confidence > 0.4);
        assert!(status.average_effective_confidence < 0.6);
        assert!(status.health_score < 100);
    }

    #[tokio::test]
    async fn test_year_old_warning_contributes_half() {
        let store = InMemoryStore::new();
        store
            .add(
                Memory::new(
                    MemoryKind::Warning,
                    "Always use X",
                    Knowledge::Warning {
                        topic: "X".into(),
                        severity: memoria_store::Severity::High,
                        advice: "Always use X".into(),
                    },
                )
                .with_confidence(1.0)
                .with_created_at(Utc::now() - Duration::days(365)),
            )
            .await
            .unwrap();

        let status = compute_status(&store, &DecayConfig::default(), 0.3, Utc::now())
            .await
            .unwrap();
        assert!((status.average_effective_confidence - 0.5).abs() < 1e-3);
    }
}
