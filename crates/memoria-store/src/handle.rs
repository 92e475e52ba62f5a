//! SurrealDB backend for the Memoria store
//!
//! Manages the connection and implements [`MemoryStore`] over five tables:
//! memories, links, sessions, consolidations, validations.
//!
//! Supports in-memory (`mem://`) and durable SurrealKV (`surrealkv://path`)
//! engines; `from_env` picks the engine from `MEMORIA_DB_URL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::{StoreError, StoreResult};
use crate::storage_traits::{ListFilter, MemoryStore, Page};
use crate::types::{
    CausalLink, ConsolidationRecord, Importance, Knowledge, Memory, MemoryId, MemoryKind,
    MemoryPatch, Relation, SessionRecord, ValidationOutcome, ValidationRecord,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

// ---------------------------------------------------------------------------
// Row types
//
// The domain id lives in `memory_id`/`session_id` fields; SurrealDB's own
// record `id` stays out of the serialized shape.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbMemory {
    memory_id: String,
    kind: MemoryKind,
    summary: String,
    knowledge: Knowledge,
    base_confidence: f64,
    importance: Importance,
    tags: Vec<String>,
    #[serde(with = "surreal_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    updated_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    last_accessed_at: DateTime<Utc>,
    access_count: u64,
    soft_deleted: bool,
    embedding: Option<Vec<f32>>,
}

impl From<Memory> for DbMemory {
    fn from(m: Memory) -> Self {
        Self {
            memory_id: m.id.0,
            kind: m.kind,
            summary: m.summary,
            knowledge: m.knowledge,
            base_confidence: m.base_confidence,
            importance: m.importance,
            tags: m.tags,
            created_at: m.created_at,
            updated_at: m.updated_at,
            last_accessed_at: m.last_accessed_at,
            access_count: m.access_count,
            soft_deleted: m.soft_deleted,
            embedding: m.embedding,
        }
    }
}

impl DbMemory {
    fn into_memory(self) -> Memory {
        Memory {
            id: MemoryId(self.memory_id),
            kind: self.kind,
            summary: self.summary,
            knowledge: self.knowledge,
            base_confidence: self.base_confidence,
            importance: self.importance,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            soft_deleted: self.soft_deleted,
            embedding: self.embedding,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbLink {
    source_id: String,
    target_id: String,
    relation: Relation,
    weight: f64,
    #[serde(with = "surreal_datetime")]
    created_at: DateTime<Utc>,
}

impl From<CausalLink> for DbLink {
    fn from(l: CausalLink) -> Self {
        Self {
            source_id: l.source_id.0,
            target_id: l.target_id.0,
            relation: l.relation,
            weight: l.weight,
            created_at: l.created_at,
        }
    }
}

impl DbLink {
    fn into_link(self) -> CausalLink {
        CausalLink {
            source_id: MemoryId(self.source_id),
            target_id: MemoryId(self.target_id),
            relation: self.relation,
            weight: self.weight,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbSession {
    session_id: String,
    sent_memory_ids: Vec<String>,
    #[serde(with = "surreal_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    last_touched_at: DateTime<Utc>,
}

impl From<SessionRecord> for DbSession {
    fn from(s: SessionRecord) -> Self {
        Self {
            session_id: s.session_id,
            sent_memory_ids: s.sent_memory_ids.into_iter().collect(),
            created_at: s.created_at,
            last_touched_at: s.last_touched_at,
        }
    }
}

impl DbSession {
    fn into_session(self) -> SessionRecord {
        SessionRecord {
            session_id: self.session_id,
            sent_memory_ids: self.sent_memory_ids.into_iter().collect(),
            created_at: self.created_at,
            last_touched_at: self.last_touched_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbConsolidation {
    cluster_signature: String,
    source_episode_ids: Vec<String>,
    produced_memory_id: String,
    #[serde(with = "surreal_datetime")]
    created_at: DateTime<Utc>,
}

impl From<ConsolidationRecord> for DbConsolidation {
    fn from(r: ConsolidationRecord) -> Self {
        Self {
            cluster_signature: r.cluster_signature,
            source_episode_ids: r.source_episode_ids.into_iter().map(|i| i.0).collect(),
            produced_memory_id: r.produced_memory_id.0,
            created_at: r.created_at,
        }
    }
}

impl DbConsolidation {
    fn into_record(self) -> ConsolidationRecord {
        ConsolidationRecord {
            cluster_signature: self.cluster_signature,
            source_episode_ids: self
                .source_episode_ids
                .into_iter()
                .map(MemoryId)
                .collect(),
            produced_memory_id: MemoryId(self.produced_memory_id),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbValidation {
    memory_id: String,
    outcome: ValidationOutcome,
    #[serde(with = "surreal_datetime")]
    checked_at: DateTime<Utc>,
}

impl From<ValidationRecord> for DbValidation {
    fn from(r: ValidationRecord) -> Self {
        Self {
            memory_id: r.memory_id.0,
            outcome: r.outcome,
            checked_at: r.checked_at,
        }
    }
}

impl DbValidation {
    fn into_record(self) -> ValidationRecord {
        ValidationRecord {
            memory_id: MemoryId(self.memory_id),
            outcome: self.outcome,
            checked_at: self.checked_at,
        }
    }
}

// ---------------------------------------------------------------------------
// SurrealStore
// ---------------------------------------------------------------------------

/// SurrealDB connection handle implementing [`MemoryStore`].
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Connect to an in-memory database and set up the schema.
    #[instrument(skip_all)]
    pub async fn in_memory() -> StoreResult<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect("mem://").await
    }

    /// Connect to a durable SurrealKV database at `path`.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn on_disk(path: &str) -> StoreResult<Self> {
        info!("Connecting to SurrealDB (surrealkv)");
        Self::connect(&format!("surrealkv://{path}")).await
    }

    /// Connect to an arbitrary engine URL and set up the schema.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        db.use_ns("memoria")
            .use_db("main")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = SurrealStore { db };
        store.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(store)
    }

    /// Connect using `MEMORIA_DB_URL`, falling back to in-memory.
    #[instrument(skip_all)]
    pub async fn from_env() -> StoreResult<Self> {
        if let Ok(url) = std::env::var("MEMORIA_DB_URL") {
            info!("MEMORIA_DB_URL found, connecting to {}", url);
            return Self::connect(&url).await;
        }
        info!("No MEMORIA_DB_URL, using in-memory database");
        Self::in_memory().await
    }

    /// Initialize the database schema
    async fn init_schema(&self) -> StoreResult<()> {
        debug!("Initializing Memoria schema");

        let schema = r#"
            -- Memories table (knowledge units)
            DEFINE TABLE memories SCHEMAFULL;
            DEFINE FIELD memory_id ON memories TYPE string;
            DEFINE FIELD kind ON memories TYPE string;
            DEFINE FIELD summary ON memories TYPE string;
            DEFINE FIELD knowledge ON memories FLEXIBLE TYPE object;
            DEFINE FIELD base_confidence ON memories TYPE number;
            DEFINE FIELD importance ON memories TYPE string;
            DEFINE FIELD tags ON memories TYPE array<string>;
            DEFINE FIELD created_at ON memories TYPE datetime;
            DEFINE FIELD updated_at ON memories TYPE datetime;
            DEFINE FIELD last_accessed_at ON memories TYPE datetime;
            DEFINE FIELD access_count ON memories TYPE int;
            DEFINE FIELD soft_deleted ON memories TYPE bool;
            DEFINE FIELD embedding ON memories TYPE option<array>;
            DEFINE INDEX idx_memory_id ON memories FIELDS memory_id UNIQUE;
            DEFINE INDEX idx_memory_kind ON memories FIELDS kind;
            DEFINE INDEX idx_memory_tags ON memories FIELDS tags;

            -- Causal links table
            DEFINE TABLE links SCHEMAFULL;
            DEFINE FIELD source_id ON links TYPE string;
            DEFINE FIELD target_id ON links TYPE string;
            DEFINE FIELD relation ON links TYPE string;
            DEFINE FIELD weight ON links TYPE number;
            DEFINE FIELD created_at ON links TYPE datetime;
            DEFINE INDEX idx_link_key ON links FIELDS source_id, target_id, relation UNIQUE;
            DEFINE INDEX idx_link_source ON links FIELDS source_id;
            DEFINE INDEX idx_link_target ON links FIELDS target_id;

            -- Sessions table (per-caller delivery tracking)
            DEFINE TABLE sessions SCHEMAFULL;
            DEFINE FIELD session_id ON sessions TYPE string;
            DEFINE FIELD sent_memory_ids ON sessions TYPE array<string>;
            DEFINE FIELD created_at ON sessions TYPE datetime;
            DEFINE FIELD last_touched_at ON sessions TYPE datetime;
            DEFINE INDEX idx_session_id ON sessions FIELDS session_id UNIQUE;

            -- Consolidation records (idempotence guards)
            DEFINE TABLE consolidations SCHEMAFULL;
            DEFINE FIELD cluster_signature ON consolidations TYPE string;
            DEFINE FIELD source_episode_ids ON consolidations TYPE array<string>;
            DEFINE FIELD produced_memory_id ON consolidations TYPE string;
            DEFINE FIELD created_at ON consolidations TYPE datetime;
            DEFINE INDEX idx_consolidation_sig ON consolidations FIELDS cluster_signature UNIQUE;

            -- Validation records (audit trail)
            DEFINE TABLE validations SCHEMAFULL;
            DEFINE FIELD memory_id ON validations TYPE string;
            DEFINE FIELD outcome ON validations TYPE string;
            DEFINE FIELD checked_at ON validations TYPE datetime;
            DEFINE INDEX idx_validation_memory ON validations FIELDS memory_id;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| StoreError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }

    async fn fetch_memory(&self, id: &str) -> StoreResult<Option<DbMemory>> {
        let id_owned = id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM memories WHERE memory_id = $id")
            .bind(("id", id_owned))
            .await?;
        let rows: Vec<DbMemory> = result.take(0)?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl MemoryStore for SurrealStore {
    #[instrument(skip(self, memory), fields(memory_id = %memory.id.short(), kind = %memory.kind))]
    async fn add(&self, memory: Memory) -> StoreResult<MemoryId> {
        debug!("Saving memory");
        let id = memory.id.clone();
        let row = DbMemory::from(memory);

        let created: Option<DbMemory> = self.db.create("memories").content(row).await?;
        created.ok_or_else(|| StoreError::Transaction("Failed to create memory".to_string()))?;
        Ok(id)
    }

    #[instrument(skip(self, memory, links), fields(memory_id = %memory.id.short(), links = links.len()))]
    async fn add_with_links(
        &self,
        memory: Memory,
        links: Vec<CausalLink>,
    ) -> StoreResult<MemoryId> {
        debug!("Saving memory with links");
        let id = memory.id.clone();

        // Deduplicate on link identity before building the transaction.
        let mut unique: Vec<CausalLink> = Vec::new();
        for link in links {
            if !unique.iter().any(|l| l.key() == link.key()) {
                unique.push(link);
            }
        }

        // One transaction: the memory and its links all persist or none do.
        let mut statements = vec![
            "BEGIN TRANSACTION".to_string(),
            "CREATE memories CONTENT $memory".to_string(),
        ];
        for i in 0..unique.len() {
            statements.push(format!("CREATE links CONTENT $link{i}"));
        }
        statements.push("COMMIT TRANSACTION".to_string());
        let query_text = statements.join("; ");

        let mut query = self
            .db
            .query(query_text)
            .bind(("memory", DbMemory::from(memory)));
        for (i, link) in unique.into_iter().enumerate() {
            query = query.bind((format!("link{i}"), DbLink::from(link)));
        }
        query
            .await?
            .check()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &MemoryId) -> StoreResult<Option<Memory>> {
        Ok(self.fetch_memory(&id.0).await?.map(DbMemory::into_memory))
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, id: &MemoryId, patch: MemoryPatch) -> StoreResult<Memory> {
        let row = self
            .fetch_memory(&id.0)
            .await?
            .ok_or_else(|| StoreError::MemoryNotFound { id: id.0.clone() })?;

        let mut memory = row.into_memory();
        patch.apply(&mut memory, Utc::now());

        let id_owned = id.0.clone();
        let updated_row = DbMemory::from(memory.clone());
        let mut result = self
            .db
            .query("UPDATE memories CONTENT $memory WHERE memory_id = $id")
            .bind(("memory", updated_row))
            .bind(("id", id_owned))
            .await?;
        let rows: Vec<DbMemory> = result.take(0)?;
        if rows.is_empty() {
            return Err(StoreError::Transaction(
                "Failed to update memory".to_string(),
            ));
        }
        Ok(memory)
    }

    #[instrument(skip(self))]
    async fn touch_access(&self, id: &MemoryId, at: DateTime<Utc>) -> StoreResult<()> {
        let id_owned = id.0.clone();
        let at_owned = surrealdb::sql::Datetime::from(at);
        let mut result = self
            .db
            .query(
                "UPDATE memories SET last_accessed_at = $at, access_count += 1 \
                 WHERE memory_id = $id RETURN AFTER",
            )
            .bind(("at", at_owned))
            .bind(("id", id_owned))
            .await?;
        let rows: Vec<DbMemory> = result.take(0)?;
        if rows.is_empty() {
            return Err(StoreError::MemoryNotFound { id: id.0.clone() });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn soft_delete(&self, id: &MemoryId) -> StoreResult<()> {
        let id_owned = id.0.clone();
        let now = surrealdb::sql::Datetime::from(Utc::now());
        let mut result = self
            .db
            .query(
                "UPDATE memories SET soft_deleted = true, updated_at = $now \
                 WHERE memory_id = $id RETURN AFTER",
            )
            .bind(("now", now))
            .bind(("id", id_owned))
            .await?;
        let rows: Vec<DbMemory> = result.take(0)?;
        if rows.is_empty() {
            return Err(StoreError::MemoryNotFound { id: id.0.clone() });
        }
        Ok(())
    }

    #[instrument(skip(self, filter))]
    async fn list(
        &self,
        filter: &ListFilter,
        cursor: Option<String>,
        limit: usize,
    ) -> StoreResult<Page> {
        let mut conditions: Vec<&str> = Vec::new();
        if !filter.include_deleted {
            conditions.push("soft_deleted = false");
        }
        if !filter.kinds.is_empty() {
            conditions.push("kind IN $kinds");
        }
        if filter.tag.is_some() {
            conditions.push("tags CONTAINS $tag");
        }
        if cursor.is_some() {
            conditions.push("memory_id > $cursor");
        }

        let mut query_text = String::from("SELECT * FROM memories");
        if !conditions.is_empty() {
            query_text.push_str(" WHERE ");
            query_text.push_str(&conditions.join(" AND "));
        }
        // Fetch one past the page to detect whether more rows remain.
        query_text.push_str(" ORDER BY memory_id LIMIT $limit");

        let kinds: Vec<String> = filter.kinds.iter().map(|k| k.to_string()).collect();
        let mut query = self
            .db
            .query(query_text)
            .bind(("limit", (limit + 1) as i64));
        if !filter.kinds.is_empty() {
            query = query.bind(("kinds", kinds));
        }
        if let Some(tag) = filter.tag.clone() {
            query = query.bind(("tag", tag));
        }
        if let Some(cursor) = cursor {
            query = query.bind(("cursor", cursor));
        }

        let mut result = query.await?;
        let rows: Vec<DbMemory> = result.take(0)?;

        let has_more = rows.len() > limit;
        let memories: Vec<Memory> = rows
            .into_iter()
            .take(limit)
            .map(DbMemory::into_memory)
            .collect();
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

    #[instrument(skip(self))]
    async fn all_active(&self) -> StoreResult<Vec<Memory>> {
        let mut result = self
            .db
            .query("SELECT * FROM memories WHERE soft_deleted = false")
            .await?;
        let rows: Vec<DbMemory> = result.take(0)?;
        Ok(rows.into_iter().map(DbMemory::into_memory).collect())
    }

    #[instrument(skip(self, link), fields(relation = %link.relation))]
    async fn add_link(&self, link: CausalLink) -> StoreResult<()> {
        // No-op when the (source, target, relation) key already exists.
        let source = link.source_id.0.clone();
        let target = link.target_id.0.clone();
        let relation = link.relation.to_string();
        let mut result = self
            .db
            .query(
                "SELECT * FROM links WHERE source_id = $source \
                 AND target_id = $target AND relation = $relation",
            )
            .bind(("source", source))
            .bind(("target", target))
            .bind(("relation", relation))
            .await?;
        let existing: Vec<DbLink> = result.take(0)?;
        if !existing.is_empty() {
            return Ok(());
        }

        let _created: Option<DbLink> = self.db.create("links").content(DbLink::from(link)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn links_from(&self, id: &MemoryId) -> StoreResult<Vec<CausalLink>> {
        let id_owned = id.0.clone();
        let mut result = self
            .db
            .query("SELECT * FROM links WHERE source_id = $id")
            .bind(("id", id_owned))
            .await?;
        let rows: Vec<DbLink> = result.take(0)?;
        Ok(rows.into_iter().map(DbLink::into_link).collect())
    }

    #[instrument(skip(self))]
    async fn links_to(&self, id: &MemoryId) -> StoreResult<Vec<CausalLink>> {
        let id_owned = id.0.clone();
        let mut result = self
            .db
            .query("SELECT * FROM links WHERE target_id = $id")
            .bind(("id", id_owned))
            .await?;
        let rows: Vec<DbLink> = result.take(0)?;
        Ok(rows.into_iter().map(DbLink::into_link).collect())
    }

    #[instrument(skip(self))]
    async fn all_links(&self) -> StoreResult<Vec<CausalLink>> {
        let mut result = self.db.query("SELECT * FROM links").await?;
        let rows: Vec<DbLink> = result.take(0)?;
        Ok(rows.into_iter().map(DbLink::into_link).collect())
    }

    #[instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let id_owned = session_id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM sessions WHERE session_id = $id")
            .bind(("id", id_owned))
            .await?;
        let rows: Vec<DbSession> = result.take(0)?;
        Ok(rows.into_iter().next().map(DbSession::into_session))
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    async fn put_session(&self, session: SessionRecord) -> StoreResult<()> {
        let existing = self.get_session(&session.session_id).await?;
        let row = DbSession::from(session);

        if existing.is_some() {
            let id_owned = row.session_id.clone();
            let mut result = self
                .db
                .query("UPDATE sessions CONTENT $session WHERE session_id = $id")
                .bind(("session", row))
                .bind(("id", id_owned))
                .await?;
            let updated: Vec<DbSession> = result.take(0)?;
            if updated.is_empty() {
                return Err(StoreError::Transaction(
                    "Failed to update session".to_string(),
                ));
            }
        } else {
            let _created: Option<DbSession> = self.db.create("sessions").content(row).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        let id_owned = session_id.to_string();
        self.db
            .query("DELETE FROM sessions WHERE session_id = $id")
            .bind(("id", id_owned))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_sessions(&self) -> StoreResult<Vec<SessionRecord>> {
        let mut result = self.db.query("SELECT * FROM sessions").await?;
        let rows: Vec<DbSession> = result.take(0)?;
        Ok(rows.into_iter().map(DbSession::into_session).collect())
    }

    #[instrument(skip(self))]
    async fn consolidation_by_signature(
        &self,
        signature: &str,
    ) -> StoreResult<Option<ConsolidationRecord>> {
        let sig_owned = signature.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM consolidations WHERE cluster_signature = $sig")
            .bind(("sig", sig_owned))
            .await?;
        let rows: Vec<DbConsolidation> = result.take(0)?;
        Ok(rows.into_iter().next().map(DbConsolidation::into_record))
    }

    #[instrument(skip(self, record), fields(signature = %record.cluster_signature))]
    async fn put_consolidation(&self, record: ConsolidationRecord) -> StoreResult<()> {
        let _created: Option<DbConsolidation> = self
            .db
            .create("consolidations")
            .content(DbConsolidation::from(record))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_consolidations(&self) -> StoreResult<usize> {
        #[derive(Deserialize)]
        struct CountRow {
            count: usize,
        }
        let mut result = self
            .db
            .query("SELECT count() AS count FROM consolidations GROUP ALL")
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.count).unwrap_or(0))
    }

    #[instrument(skip(self, record), fields(memory_id = %record.memory_id.short(), outcome = %record.outcome))]
    async fn record_validation(&self, record: ValidationRecord) -> StoreResult<()> {
        let _created: Option<DbValidation> = self
            .db
            .create("validations")
            .content(DbValidation::from(record))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn validations_for(&self, id: &MemoryId) -> StoreResult<Vec<ValidationRecord>> {
        let id_owned = id.0.clone();
        let mut result = self
            .db
            .query("SELECT * FROM validations WHERE memory_id = $id ORDER BY checked_at")
            .bind(("id", id_owned))
            .await?;
        let rows: Vec<DbValidation> = result.take(0)?;
        Ok(rows.into_iter().map(DbValidation::into_record).collect())
    }
}
