//! Storage trait definitions for Memoria
//!
//! `MemoryStore` is the single backend-agnostic abstraction over the five
//! persisted tables (memories, links, sessions, consolidations,
//! validations). An in-memory implementation lives in the `fakes` module;
//! the SurrealDB implementation lives in `handle`.
//!
//! Concurrency contract: callers serialize mutating operations through one
//! mutation path (the engine's write lock); reads may run concurrently and
//! observe the latest committed state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::types::{
    CausalLink, ConsolidationRecord, Memory, MemoryId, MemoryKind, MemoryPatch, SessionRecord,
    ValidationRecord,
};

/// Filter applied to `list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Restrict to these kinds (all kinds when empty).
    pub kinds: Vec<MemoryKind>,
    /// Require this tag to be present.
    pub tag: Option<String>,
    /// Include soft-deleted memories (audit/export callers only).
    pub include_deleted: bool,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Whether a memory passes this filter.
    pub fn matches(&self, memory: &Memory) -> bool {
        if !self.include_deleted && memory.soft_deleted {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&memory.kind) {
            return false;
        }
        if let Some(ref tag) = self.tag {
            if !memory.tags.contains(tag) {
                return false;
            }
        }
        true
    }
}

/// One page of `list` results. Keyset pagination: pass `next_cursor` back
/// in as the cursor to continue; `None` means the listing is exhausted.
#[derive(Debug, Clone)]
pub struct Page {
    pub memories: Vec<Memory>,
    pub next_cursor: Option<String>,
}

/// Backend-agnostic store for memories, causal links, and session state.
///
/// Guarantees:
/// - `add_with_links` is atomic: the memory and its links either all
///   persist or none do.
/// - `get` returns `Ok(None)` for unknown ids; only `update`,
///   `touch_access` and `soft_delete` treat a missing id as an error.
/// - Soft-deleted memories stay readable via `get`/`list(include_deleted)`
///   but are excluded from `all_active`.
/// - Link identity is `(source_id, target_id, relation)`; re-adding an
///   existing link is a no-op that keeps the original weight.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    // ---- memories ----

    /// Persist a new memory, returning its id.
    async fn add(&self, memory: Memory) -> StoreResult<MemoryId>;

    /// Persist a memory together with its immediate links, atomically.
    async fn add_with_links(&self, memory: Memory, links: Vec<CausalLink>)
        -> StoreResult<MemoryId>;

    /// Point lookup. `None` for unknown ids.
    async fn get(&self, id: &MemoryId) -> StoreResult<Option<Memory>>;

    /// Apply a patch and return the updated memory. Bumps `updated_at`.
    async fn update(&self, id: &MemoryId, patch: MemoryPatch) -> StoreResult<Memory>;

    /// Record a read access: sets `last_accessed_at`, increments
    /// `access_count`. Does not bump `updated_at`.
    async fn touch_access(&self, id: &MemoryId, at: DateTime<Utc>) -> StoreResult<()>;

    /// Mark a memory soft-deleted. Idempotent.
    async fn soft_delete(&self, id: &MemoryId) -> StoreResult<()>;

    /// Filtered keyset-paginated listing, ordered by ascending id.
    async fn list(
        &self,
        filter: &ListFilter,
        cursor: Option<String>,
        limit: usize,
    ) -> StoreResult<Page>;

    /// All non-deleted memories. Used by sweeps and status aggregation.
    async fn all_active(&self) -> StoreResult<Vec<Memory>>;

    // ---- causal links ----

    /// Add a link. No-op when the `(source, target, relation)` key exists.
    async fn add_link(&self, link: CausalLink) -> StoreResult<()>;

    /// Outgoing links of a memory.
    async fn links_from(&self, id: &MemoryId) -> StoreResult<Vec<CausalLink>>;

    /// Incoming links of a memory.
    async fn links_to(&self, id: &MemoryId) -> StoreResult<Vec<CausalLink>>;

    /// Every stored link; used to build the traversal index.
    async fn all_links(&self) -> StoreResult<Vec<CausalLink>>;

    // ---- sessions ----

    async fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>>;

    /// Insert or replace a session record (last-writer-wins).
    async fn put_session(&self, session: SessionRecord) -> StoreResult<()>;

    async fn delete_session(&self, session_id: &str) -> StoreResult<()>;

    async fn list_sessions(&self) -> StoreResult<Vec<SessionRecord>>;

    // ---- consolidation records ----

    async fn consolidation_by_signature(
        &self,
        signature: &str,
    ) -> StoreResult<Option<ConsolidationRecord>>;

    async fn put_consolidation(&self, record: ConsolidationRecord) -> StoreResult<()>;

    async fn count_consolidations(&self) -> StoreResult<usize>;

    // ---- validation records ----

    async fn record_validation(&self, record: ValidationRecord) -> StoreResult<()>;

    async fn validations_for(&self, id: &MemoryId) -> StoreResult<Vec<ValidationRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Knowledge;

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
    fn test_filter_kind_and_tag() {
        let m = note("n").with_tag("alpha");
        assert!(ListFilter::all().matches(&m));
        assert!(ListFilter::all().with_kind(MemoryKind::Note).matches(&m));
        assert!(!ListFilter::all().with_kind(MemoryKind::Episode).matches(&m));
        assert!(ListFilter::all().with_tag("alpha").matches(&m));
        assert!(!ListFilter::all().with_tag("beta").matches(&m));
    }

    #[test]
    fn test_filter_excludes_deleted_by_default() {
        let mut m = note("n");
        m.soft_deleted = true;
        assert!(!ListFilter::all().matches(&m));
        assert!(ListFilter::all().including_deleted().matches(&m));
    }
}
