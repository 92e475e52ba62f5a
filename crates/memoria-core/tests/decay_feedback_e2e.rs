//! End-to-end scenario: decay over a year, status aggregation, and the
//! feedback arithmetic adjusting base confidence while effective
//! confidence is recomputed from the unchanged age.

use std::sync::Arc;

use chrono::{Duration, Utc};
use memoria_core::{
    effective_confidence, DecayConfig, EngineConfig, FeedbackAction, Knowledge, MemoryEngine,
    MemoryKind, Severity,
};
use memoria_store::{HashEmbedder, InMemoryStore, Memory, MemoryStore};

fn engine_with_store() -> (MemoryEngine, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let engine = MemoryEngine::new(
        store.clone(),
        Arc::new(HashEmbedder::default()),
        EngineConfig::default(),
    );
    (engine, store)
}

fn year_old_warning() -> Memory {
    Memory::new(
        MemoryKind::Warning,
        "Always use X",
        Knowledge::Warning {
            topic: "X".into(),
            severity: Severity::High,
            advice: "Always use X".into(),
        },
    )
    .with_confidence(1.0)
    .with_created_at(Utc::now() - Duration::days(365))
}

#[tokio::test]
async fn year_old_warning_reports_half_confidence_in_status() {
    let (engine, store) = engine_with_store();
    // backdated write goes straight to the store; the engine would stamp
    // the current time
    store.add(year_old_warning()).await.unwrap();

    let status = engine.status().await.unwrap();
    assert_eq!(status.total_memories, 1);
    assert!(
        (status.average_effective_confidence - 0.5).abs() < 1e-3,
        "expected ~0.5, got {}",
        status.average_effective_confidence
    );
}

#[tokio::test]
async fn confirm_adjusts_base_not_effective() {
    let (engine, store) = engine_with_store();
    let memory = year_old_warning().with_confidence(0.9);
    let id = store.add(memory).await.unwrap();

    let confirmed = engine
        .feedback(&id, FeedbackAction::Confirm, None)
        .await
        .unwrap();
    // base capped at 1.0
    assert!((confirmed.base_confidence - 1.0).abs() < 1e-9);

    // effective confidence still reflects the unchanged 365-day age
    let effective = effective_confidence(&confirmed, Utc::now(), &DecayConfig::default());
    assert!((effective - 0.5).abs() < 1e-2, "got {effective}");
}

#[tokio::test]
async fn reject_is_multiplicative() {
    let (engine, store) = engine_with_store();
    let id = store
        .add(year_old_warning().with_confidence(0.8))
        .await
        .unwrap();

    let rejected = engine
        .feedback(&id, FeedbackAction::Reject, None)
        .await
        .unwrap();
    assert!((rejected.base_confidence - 0.56).abs() < 1e-12);
}

#[tokio::test]
async fn repeated_confirm_never_exceeds_one() {
    let (engine, store) = engine_with_store();
    let id = store
        .add(year_old_warning().with_confidence(0.95))
        .await
        .unwrap();

    for _ in 0..5 {
        let memory = engine
            .feedback(&id, FeedbackAction::Confirm, None)
            .await
            .unwrap();
        assert!(memory.base_confidence <= 1.0);
    }
}

#[tokio::test]
async fn modify_replaces_summary_and_docks_confidence() {
    let (engine, store) = engine_with_store();
    let id = store
        .add(year_old_warning().with_confidence(0.5))
        .await
        .unwrap();

    let modified = engine
        .feedback(
            &id,
            FeedbackAction::Modify,
            Some("Always use X, except in batch jobs".to_string()),
        )
        .await
        .unwrap();
    assert!((modified.base_confidence - 0.4).abs() < 1e-9);
    assert_eq!(modified.summary, "Always use X, except in batch jobs");
}
