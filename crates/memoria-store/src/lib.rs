//! Memoria-Store: Persistence Layer for the Memoria Knowledge Store
//!
//! This crate provides durable keyed persistence for memories, causal
//! links, and sessions, plus hybrid (lexical + vector) search and the
//! embedding-provider abstraction.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: Record integrity, atomic memory+link writes, and search.
//!
//! ## Key Components
//!
//! - `MemoryStore`: backend-agnostic storage trait
//! - `InMemoryStore`: dependency-free backend for tests and ephemeral use
//! - `SurrealStore`: SurrealDB backend (in-memory or SurrealKV)
//! - `EmbeddingProvider`: pluggable text-to-vector provider
//! - `hybrid_search`: blended lexical/vector ranking with lexical fallback

mod error;
pub mod embed;
pub mod fakes;
mod handle;
pub mod search;
pub mod storage_traits;
pub mod types;

pub use embed::{
    cosine_similarity, tokenize, EmbeddingProvider, FailingEmbedder, HashEmbedder, HttpEmbedder,
    EMBED_TIMEOUT_DEFAULT, HASH_EMBEDDING_DIM,
};
pub use error::{StoreError, StoreResult};
pub use fakes::InMemoryStore;
pub use handle::SurrealStore;
pub use search::{hybrid_search, lexical_score, SearchHit, SearchRequest, SEARCH_LIMIT_DEFAULT};
pub use storage_traits::{ListFilter, MemoryStore, Page};
pub use types::{
    CausalLink, ConsolidationRecord, Importance, Knowledge, Memory, MemoryId, MemoryKind,
    MemoryPatch, Relation, SessionRecord, Severity, ValidationOutcome, ValidationRecord,
};
