//! Validation sweeps: mark stale memories and heal malformed ones.
//!
//! A sweep examines every memory in scope, writes a [`ValidationRecord`]
//! per memory touched, and optionally heals missing summaries from the
//! structured payload or soft-deletes unhealable entries. Running a sweep
//! twice without intervening writes heals/removes nothing on the second
//! pass.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use memoria_store::{
    Importance, Memory, MemoryPatch, MemoryStore, ValidationOutcome, ValidationRecord,
};

use crate::decay::{effective_confidence, DecayConfig};
use crate::error::EngineResult;

/// Which memories a sweep examines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationScope {
    #[default]
    All,
    /// Memories whose most recent validation marked them stale.
    Stale,
    /// Memories created within the last 7 days.
    Recent,
    /// Importance high or critical.
    HighImportance,
}

impl std::str::FromStr for ValidationScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "stale" => Ok(Self::Stale),
            "recent" => Ok(Self::Recent),
            "high_importance" => Ok(Self::HighImportance),
            other => Err(other.to_string()),
        }
    }
}

/// Options for one validation sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOptions {
    pub scope: ValidationScope,
    /// Regenerate missing summaries from the knowledge payload.
    pub auto_heal: bool,
    /// Soft-delete memories that cannot be healed.
    pub remove_invalid: bool,
    /// Effective-confidence floor below which a memory is stale.
    pub min_confidence: f64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            scope: ValidationScope::All,
            auto_heal: true,
            remove_invalid: false,
            min_confidence: 0.25,
        }
    }
}

/// Counts returned by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationStats {
    /// Memories examined.
    pub validated: usize,
    pub healed: usize,
    pub stale: usize,
    pub removed: usize,
}

fn summary_is_malformed(memory: &Memory) -> bool {
    memory.summary.trim().is_empty()
}

async fn in_scope(
    store: &dyn MemoryStore,
    memory: &Memory,
    scope: ValidationScope,
    now: DateTime<Utc>,
) -> EngineResult<bool> {
    let selected = match scope {
        ValidationScope::All => true,
        ValidationScope::Recent => now - memory.created_at <= Duration::days(7),
        ValidationScope::HighImportance => memory.importance >= Importance::High,
        ValidationScope::Stale => {
            let history = store.validations_for(&memory.id).await?;
            matches!(
                history.last().map(|v| v.outcome),
                Some(ValidationOutcome::Stale)
            )
        }
    };
    Ok(selected)
}

/// Run one validation sweep.
///
/// Must run on the serialized mutation path when `auto_heal` or
/// `remove_invalid` is set.
pub async fn run_validation(
    store: &dyn MemoryStore,
    options: &ValidationOptions,
    decay: &DecayConfig,
    now: DateTime<Utc>,
) -> EngineResult<ValidationStats> {
    let mut stats = ValidationStats::default();

    for memory in store.all_active().await? {
        if !in_scope(store, &memory, options.scope, now).await? {
            continue;
        }
        stats.validated += 1;

        let outcome = if summary_is_malformed(&memory) {
            let regenerated = memory.knowledge.summary_text();
            if options.auto_heal && !regenerated.trim().is_empty() {
                store
                    .update(&memory.id, MemoryPatch::summary(regenerated))
                    .await?;
                stats.healed += 1;
                ValidationOutcome::Healed
            } else if options.remove_invalid {
                store.soft_delete(&memory.id).await?;
                stats.removed += 1;
                ValidationOutcome::Removed
            } else {
                stats.stale += 1;
                ValidationOutcome::Stale
            }
        } else if effective_confidence(&memory, now, decay) < options.min_confidence {
            stats.stale += 1;
            ValidationOutcome::Stale
        } else {
            ValidationOutcome::Valid
        };

        store
            .record_validation(ValidationRecord {
                memory_id: memory.id.clone(),
                outcome,
                checked_at: now,
            })
            .await?;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use memoria_store::{InMemoryStore, Knowledge, MemoryKind};

    fn note(summary: &str, text: &str) -> Memory {
        Memory::new(
            MemoryKind::Note,
            summary,
            Knowledge::Note { text: text.into() },
        )
    }

    #[tokio::test]
    async fn test_healthy_memories_marked_valid() {
        let store = InMemoryStore::new();
        let id = store.add(note("fine", "fine")).await.unwrap();

        let stats = run_validation(
            &store,
            &ValidationOptions::default(),
            &DecayConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(stats.validated, 1);
        assert_eq!(stats.healed + stats.stale + stats.removed, 0);
        let history = store.validations_for(&id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn test_heals_empty_summary_from_knowledge() {
        let store = InMemoryStore::new();
        let id = store.add(note("  ", "recovered text")).await.unwrap();

        let stats = run_validation(
            &store,
            &ValidationOptions::default(),
            &DecayConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(stats.healed, 1);
        let healed = store.get(&id).await.unwrap().unwrap();
        assert_eq!(healed.summary, "recovered text");
    }

    #[tokio::test]
    async fn test_unhealable_removed_when_requested() {
        let store = InMemoryStore::new();
        // summary and payload both empty: nothing to regenerate from
        let id = store.add(note(" ", " ")).await.unwrap();

        let options = ValidationOptions {
            remove_invalid: true,
            ..Default::default()
        };
        let stats = run_validation(&store, &options, &DecayConfig::default(), Utc::now())
            .await
            .unwrap();

        assert_eq!(stats.removed, 1);
        assert!(store.get(&id).await.unwrap().unwrap().soft_deleted);
    }

    #[tokio::test]
    async fn test_low_effective_confidence_marked_stale() {
        let store = InMemoryStore::new();
        // episode half-life 7 days; 60 days old decays far below 0.25
        let m = Memory::new(
            MemoryKind::Episode,
            "an old episode",
            Knowledge::Episode {
                interaction: "an old episode".into(),
                outcome: None,
            },
        )
        .with_confidence(1.0)
        .with_created_at(Utc::now() - Duration::days(60));
        let id = store.add(m).await.unwrap();

        let stats = run_validation(
            &store,
            &ValidationOptions::default(),
            &DecayConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(stats.stale, 1);
        let history = store.validations_for(&id).await.unwrap();
        assert_eq!(history[0].outcome, ValidationOutcome::Stale);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let store = InMemoryStore::new();
        store.add(note(" ", "healable")).await.unwrap();
        store.add(note("fine", "fine")).await.unwrap();

        let options = ValidationOptions {
            remove_invalid: true,
            ..Default::default()
        };
        let first = run_validation(&store, &options, &DecayConfig::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(first.healed, 1);

        let second = run_validation(&store, &options, &DecayConfig::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(second.healed, 0);
        assert_eq!(second.removed, 0);
    }

    #[tokio::test]
    async fn test_scope_recent_and_high_importance() {
        let store = InMemoryStore::new();
        store
            .add(note("recent", "recent"))
            .await
            .unwrap();
        store
            .add(
                note("old normal", "old normal")
                    .with_created_at(Utc::now() - Duration::days(30)),
            )
            .await
            .unwrap();
        store
            .add(
                note("old critical", "old critical")
                    .with_created_at(Utc::now() - Duration::days(30))
                    .with_importance(Importance::Critical),
            )
            .await
            .unwrap();

        let recent = run_validation(
            &store,
            &ValidationOptions {
                scope: ValidationScope::Recent,
                ..Default::default()
            },
            &DecayConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(recent.validated, 1);

        let important = run_validation(
            &store,
            &ValidationOptions {
                scope: ValidationScope::HighImportance,
                ..Default::default()
            },
            &DecayConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(important.validated, 1);
    }

    #[tokio::test]
    async fn test_scope_stale_revisits_marked_memories() {
        let store = InMemoryStore::new();
        let m = Memory::new(
            MemoryKind::Episode,
            "fading",
            Knowledge::Episode {
                interaction: "fading".into(),
                outcome: None,
            },
        )
        .with_created_at(Utc::now() - Duration::days(60));
        let id = store.add(m).await.unwrap();
        store.add(note("fresh", "fresh")).await.unwrap();

        run_validation(
            &store,
            &ValidationOptions::default(),
            &DecayConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();

        let stale_only = run_validation(
            &store,
            &ValidationOptions {
                scope: ValidationScope::Stale,
                ..Default::default()
            },
            &DecayConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(stale_only.validated, 1);
        assert_eq!(store.validations_for(&id).await.unwrap().len(), 2);
    }
}
