//! In-memory store backend
//!
//! Satisfies the [`MemoryStore`](crate::MemoryStore) contract without any
//! external dependencies. Used directly by tests, and as the default
//! ephemeral backend for callers that do not need durability.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::storage_traits::{ListFilter, MemoryStore, Page};
use crate::types::{
    CausalLink, ConsolidationRecord, Memory, MemoryId, MemoryPatch, SessionRecord,
    ValidationRecord,
};

#[derive(Debug, Default)]
struct Inner {
    memories: HashMap<String, Memory>,
    links: Vec<CausalLink>,
    sessions: HashMap<String, SessionRecord>,
    consolidations: HashMap<String, ConsolidationRecord>,
    validations: Vec<ValidationRecord>,
}

/// In-memory store backed by a `Mutex<HashMap>` per table.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn add(&self, memory: Memory) -> StoreResult<MemoryId> {
        let id = memory.id.clone();
        let mut inner = self.inner.lock().unwrap();
        inner.memories.insert(id.0.clone(), memory);
        Ok(id)
    }

    async fn add_with_links(
        &self,
        memory: Memory,
        links: Vec<CausalLink>,
    ) -> StoreResult<MemoryId> {
        let id = memory.id.clone();
        // Single lock scope keeps the memory and its links atomic.
        let mut inner = self.inner.lock().unwrap();
        inner.memories.insert(id.0.clone(), memory);
        for link in links {
            let key = link.key();
            if !inner.links.iter().any(|l| l.key() == key) {
                inner.links.push(link);
            }
        }
        Ok(id)
    }

    async fn get(&self, id: &MemoryId) -> StoreResult<Option<Memory>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.memories.get(&id.0).cloned())
    }

    async fn update(&self, id: &MemoryId, patch: MemoryPatch) -> StoreResult<Memory> {
        let mut inner = self.inner.lock().unwrap();
        let memory = inner
            .memories
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::MemoryNotFound { id: id.0.clone() })?;
        patch.apply(memory, Utc::now());
        Ok(memory.clone())
    }

    async fn touch_access(&self, id: &MemoryId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let memory = inner
            .memories
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::MemoryNotFound { id: id.0.clone() })?;
        memory.last_accessed_at = at;
        memory.access_count += 1;
        Ok(())
    }

    async fn soft_delete(&self, id: &MemoryId) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let memory = inner
            .memories
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::MemoryNotFound { id: id.0.clone() })?;
        memory.soft_deleted = true;
        memory.updated_at = Utc::now();
        Ok(())
    }

    async fn list(
        &self,
        filter: &ListFilter,
        cursor: Option<String>,
        limit: usize,
    ) -> StoreResult<Page> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<&Memory> = inner
            .memories
            .values()
            .filter(|m| filter.matches(m))
            .filter(|m| cursor.as_deref().map(|c| m.id.0.as_str() > c).unwrap_or(true))
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));

        let has_more = matches.len() > limit;
        let memories: Vec<Memory> = matches.into_iter().take(limit).cloned().collect();
        let next_cursor = if has_more {
            memories.last().map(|m| m.id.0.clone())
        } else {
            None
        };
        Ok(Page {
            memories,
            next_cursor,
        })
    }

    async fn all_active(&self) -> StoreResult<Vec<Memory>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .memories
            .values()
            .filter(|m| !m.soft_deleted)
            .cloned()
            .collect())
    }

    async fn add_link(&self, link: CausalLink) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let key = link.key();
        if !inner.links.iter().any(|l| l.key() == key) {
            inner.links.push(link);
        }
        Ok(())
    }

    async fn links_from(&self, id: &MemoryId) -> StoreResult<Vec<CausalLink>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .links
            .iter()
            .filter(|l| l.source_id == *id)
            .cloned()
            .collect())
    }

    async fn links_to(&self, id: &MemoryId) -> StoreResult<Vec<CausalLink>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .links
            .iter()
            .filter(|l| l.target_id == *id)
            .cloned()
            .collect())
    }

    async fn all_links(&self) -> StoreResult<Vec<CausalLink>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.links.clone())
    }

    async fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sessions.get(session_id).cloned())
    }

    async fn put_session(&self, session: SessionRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sessions
            .insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.remove(session_id);
        Ok(())
    }

    async fn list_sessions(&self) -> StoreResult<Vec<SessionRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sessions.values().cloned().collect())
    }

    async fn consolidation_by_signature(
        &self,
        signature: &str,
    ) -> StoreResult<Option<ConsolidationRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.consolidations.get(signature).cloned())
    }

    async fn put_consolidation(&self, record: ConsolidationRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .consolidations
            .insert(record.cluster_signature.clone(), record);
        Ok(())
    }

    async fn count_consolidations(&self) -> StoreResult<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.consolidations.len())
    }

    async fn record_validation(&self, record: ValidationRecord) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.validations.push(record);
        Ok(())
    }

    async fn validations_for(&self, id: &MemoryId) -> StoreResult<Vec<ValidationRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .validations
            .iter()
            .filter(|v| v.memory_id == *id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Knowledge, MemoryKind, Relation};

    fn note(summary: &str) -> Memory {
        Memory::new(
            MemoryKind::Note,
            summary,
            Knowledge::Note {
                text: summary.into(),
            },
        )
    }

    #[tokio::test]
    async fn test_add_get_update() {
        let store = InMemoryStore::new();
        let id = store.add(note("first")).await.unwrap();

        let got = store.get(&id).await.unwrap().unwrap();
        assert_eq!(got.summary, "first");

        let updated = store
            .update(&id, MemoryPatch::summary("second"))
            .await
            .unwrap();
        assert_eq!(updated.summary, "second");
        assert!(store.get(&MemoryId::from("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_error() {
        let store = InMemoryStore::new();
        let err = store
            .update(&MemoryId::from("nope"), MemoryPatch::default())
            .await;
        assert!(matches!(err, Err(StoreError::MemoryNotFound { .. })));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_active() {
        let store = InMemoryStore::new();
        let id = store.add(note("gone")).await.unwrap();
        store.soft_delete(&id).await.unwrap();

        assert!(store.all_active().await.unwrap().is_empty());
        // still present for audit
        assert!(store.get(&id).await.unwrap().unwrap().soft_deleted);
    }

    #[tokio::test]
    async fn test_link_dedup_on_key() {
        let store = InMemoryStore::new();
        let a = store.add(note("a")).await.unwrap();
        let b = store.add(note("b")).await.unwrap();

        store
            .add_link(CausalLink::new(a.clone(), b.clone(), Relation::Supports))
            .await
            .unwrap();
        store
            .add_link(
                CausalLink::new(a.clone(), b.clone(), Relation::Supports).with_weight(0.2),
            )
            .await
            .unwrap();

        let out = store.links_from(&a).await.unwrap();
        assert_eq!(out.len(), 1);
        // first write wins
        assert!((out[0].weight - 1.0).abs() < f64::EPSILON);
        assert_eq!(store.links_to(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = InMemoryStore::new();
        for i in 0..7 {
            let mut m = note(&format!("m{i}"));
            m.id = MemoryId(format!("id-{i}"));
            store.add(m).await.unwrap();
        }

        let page1 = store.list(&ListFilter::all(), None, 3).await.unwrap();
        assert_eq!(page1.memories.len(), 3);
        let cursor = page1.next_cursor.clone().unwrap();

        let page2 = store.list(&ListFilter::all(), Some(cursor), 3).await.unwrap();
        assert_eq!(page2.memories.len(), 3);

        let page3 = store
            .list(&ListFilter::all(), page2.next_cursor.clone(), 3)
            .await
            .unwrap();
        assert_eq!(page3.memories.len(), 1);
        assert!(page3.next_cursor.is_none());

        // no overlap across pages
        let mut seen: Vec<String> = page1
            .memories
            .iter()
            .chain(&page2.memories)
            .chain(&page3.memories)
            .map(|m| m.id.0.clone())
            .collect();
        seen.dedup();
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let store = InMemoryStore::new();
        let mut s = SessionRecord::new("sess-1");
        s.sent_memory_ids.insert("m1".into());
        store.put_session(s).await.unwrap();

        let got = store.get_session("sess-1").await.unwrap().unwrap();
        assert!(got.sent_memory_ids.contains("m1"));

        store.delete_session("sess-1").await.unwrap();
        assert!(store.get_session("sess-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consolidation_record_guard() {
        let store = InMemoryStore::new();
        assert!(store
            .consolidation_by_signature("sig")
            .await
            .unwrap()
            .is_none());

        store
            .put_consolidation(ConsolidationRecord {
                cluster_signature: "sig".into(),
                source_episode_ids: vec![MemoryId::from("e1")],
                produced_memory_id: MemoryId::from("c1"),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(store
            .consolidation_by_signature("sig")
            .await
            .unwrap()
            .is_some());
        assert_eq!(store.count_consolidations().await.unwrap(), 1);
    }
}
