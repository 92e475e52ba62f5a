//! Session tracking: which memory ids a caller has already received.
//!
//! Sessions are independent per caller and purely additive; once an id is
//! marked sent it is never resent within the session's lifetime. Expiry
//! sweeps are opportunistic and commutative with concurrent touches
//! (last-writer-wins on the TTL refresh).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use memoria_store::{MemoryId, MemoryStore, SessionRecord};

use crate::error::EngineResult;

/// Store-backed session manager.
pub struct SessionManager {
    store: Arc<dyn MemoryStore>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn MemoryStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Fetch-or-create a session and refresh its TTL.
    pub async fn touch(&self, session_id: &str, now: DateTime<Utc>) -> EngineResult<SessionRecord> {
        let mut session = self
            .store
            .get_session(session_id)
            .await?
            .unwrap_or_else(|| SessionRecord::new(session_id));
        session.last_touched_at = now;
        self.store.put_session(session.clone()).await?;
        Ok(session)
    }

    /// Record ids as delivered to the session.
    pub async fn mark_sent(
        &self,
        session_id: &str,
        ids: &[MemoryId],
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut session = self
            .store
            .get_session(session_id)
            .await?
            .unwrap_or_else(|| SessionRecord::new(session_id));
        for id in ids {
            session.sent_memory_ids.insert(id.0.clone());
        }
        session.last_touched_at = now;
        self.store.put_session(session).await?;
        Ok(())
    }

    /// The ids already delivered to a session (empty for unknown sessions).
    pub async fn sent_set(&self, session_id: &str) -> EngineResult<BTreeSet<String>> {
        Ok(self
            .store
            .get_session(session_id)
            .await?
            .map(|s| s.sent_memory_ids)
            .unwrap_or_default())
    }

    /// Evict sessions idle past the TTL. Returns the eviction count.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(1));
        let mut evicted = 0;
        for session in self.store.list_sessions().await? {
            if now - session.last_touched_at > ttl {
                self.store.delete_session(&session.session_id).await?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}
