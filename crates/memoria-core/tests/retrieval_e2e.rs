//! End-to-end tests for budgeted, session-deduplicated retrieval.

use std::sync::Arc;

use memoria_core::{
    CompressionLevel, EngineConfig, Importance, Intent, Knowledge, MemoryEngine, MemoryKind,
    NewMemory, RetrieveRequest, Severity,
};
use memoria_store::{HashEmbedder, InMemoryStore};

fn engine() -> MemoryEngine {
    MemoryEngine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(HashEmbedder::default()),
        EngineConfig::default(),
    )
}

fn warning(summary: &str) -> NewMemory {
    NewMemory::new(
        MemoryKind::Warning,
        summary,
        Knowledge::Warning {
            topic: "deploys".into(),
            severity: Severity::High,
            advice: summary.into(),
        },
    )
    .with_tags(vec!["deploys".into()])
}

fn anti_pattern(summary: &str) -> NewMemory {
    NewMemory::new(
        MemoryKind::AntiPattern,
        summary,
        Knowledge::AntiPattern {
            pattern: summary.into(),
            remedy: "do the opposite".into(),
        },
    )
}

async fn seed_deploy_corpus(engine: &MemoryEngine, count: usize) {
    for i in 0..count {
        engine
            .add(warning(&format!(
                "deploy caution number {i}: verify canary metrics for deploys"
            )))
            .await
            .unwrap();
    }
}

fn request(session: &str, max_tokens: usize) -> RetrieveRequest {
    RetrieveRequest {
        intent: Intent::BugFix,
        focus: "deploy canary metrics".into(),
        max_tokens,
        compression: CompressionLevel::OneLine,
        session_id: session.into(),
    }
}

#[tokio::test]
async fn retrieve_never_exceeds_budget() {
    let engine = engine();
    seed_deploy_corpus(&engine, 12).await;

    for budget in [25, 60, 150, 400] {
        let result = engine
            .retrieve(&request(&format!("budget-{budget}"), budget))
            .await
            .unwrap();
        assert!(
            result.tokens_used <= budget,
            "budget {budget} exceeded: {}",
            result.tokens_used
        );
        let recomputed: usize = result.memories.iter().map(|m| m.estimated_tokens).sum();
        assert_eq!(recomputed, result.tokens_used);
    }
}

#[tokio::test]
async fn retrieve_dedupes_within_a_session() {
    let engine = engine();
    seed_deploy_corpus(&engine, 8).await;

    let mut seen: Vec<String> = Vec::new();
    // repeated calls drain distinct candidates until exhausted
    for _ in 0..6 {
        let result = engine.retrieve(&request("one-session", 120)).await.unwrap();
        for delivered in &result.memories {
            let id = delivered.memory.id.0.clone();
            assert!(
                !seen.contains(&id),
                "memory {id} delivered twice in one session"
            );
            seen.push(id);
        }
        if result.memories.is_empty() {
            break;
        }
    }
    assert!(!seen.is_empty());
}

#[tokio::test]
async fn retrieve_sessions_are_independent() {
    let engine = engine();
    seed_deploy_corpus(&engine, 4).await;

    let first = engine.retrieve(&request("session-a", 500)).await.unwrap();
    let second = engine.retrieve(&request("session-b", 500)).await.unwrap();

    assert!(!first.memories.is_empty());
    // a fresh session sees the same candidates again
    assert_eq!(first.memories.len(), second.memories.len());
}

#[tokio::test]
async fn retrieve_touches_accepted_memories() {
    let engine = engine();
    seed_deploy_corpus(&engine, 2).await;

    let result = engine.retrieve(&request("touching", 500)).await.unwrap();
    assert!(!result.memories.is_empty());

    for delivered in &result.memories {
        let stored = engine.get(&delivered.memory.id).await.unwrap().unwrap();
        assert_eq!(stored.access_count, 1);
    }
}

#[tokio::test]
async fn retrieve_prioritizes_intent_kinds() {
    let engine = engine();
    engine
        .add(anti_pattern("deploy canary metrics skipped under pressure"))
        .await
        .unwrap();
    engine
        .add(NewMemory::new(
            MemoryKind::Meeting,
            "deploy canary metrics discussed at standup",
            Knowledge::Meeting {
                subject: "deploy canary metrics discussed at standup".into(),
                attendees: vec![],
                notes: "notes".into(),
            },
        ))
        .await
        .unwrap();

    // bug_fix intent does not search meeting memories at all
    let result = engine.retrieve(&request("intent-check", 2000)).await.unwrap();
    assert!(!result.memories.is_empty());
    assert!(result
        .memories
        .iter()
        .all(|m| m.memory.kind != MemoryKind::Meeting));
}

#[tokio::test]
async fn retrieve_respects_compression_levels() {
    let engine = engine();
    engine
        .add(
            warning("a deploy warning with a fairly long body of advice text attached")
                .with_importance(Importance::High),
        )
        .await
        .unwrap();

    let mut costs = Vec::new();
    for (level, session) in [
        (CompressionLevel::IdOnly, "lvl0"),
        (CompressionLevel::OneLine, "lvl1"),
        (CompressionLevel::WithExample, "lvl2"),
        (CompressionLevel::FullDetail, "lvl3"),
    ] {
        let result = engine
            .retrieve(&RetrieveRequest {
                intent: Intent::BugFix,
                focus: "deploy warning advice".into(),
                max_tokens: 10_000,
                compression: level,
                session_id: session.into(),
            })
            .await
            .unwrap();
        assert_eq!(result.memories.len(), 1);
        costs.push(result.tokens_used);
    }
    assert!(costs.windows(2).all(|w| w[0] < w[1]), "costs: {costs:?}");
}
