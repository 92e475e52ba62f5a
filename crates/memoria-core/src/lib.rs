//! Memoria Core Library
//!
//! The engine behind the Memoria knowledge store: confidence decay,
//! causal-graph traversal, contradiction handling, episodic consolidation,
//! and token-budgeted retrieval, exposed as an in-process operation
//! contract consumed by thin callers.

pub mod config;
pub mod consolidation;
pub mod contradiction;
pub mod decay;
pub mod engine;
pub mod error;
pub mod graph;
pub mod jobs;
pub mod learning;
pub mod obs;
pub mod prediction;
pub mod retrieval;
pub mod session;
pub mod status;
pub mod telemetry;
pub mod validation;

pub use config::{
    ConsolidationDefaults, EngineConfig, RetrievalConfig, SessionConfig, ValidationDefaults,
};
pub use consolidation::{run_consolidation, ConsolidationOptions, ConsolidationStats};
pub use contradiction::{
    ContradictionConfig, ContradictionDetector, ContradictionReport, NegationPattern,
    PropagatedPenalty,
};
pub use decay::{age_days, effective_confidence, DecayConfig};
pub use engine::{AddOutcome, MemoryEngine, NewMemory};
pub use error::{EngineError, EngineResult};
pub use graph::{explain, CausalGraph, Direction, Narrative, TraversalNode};
pub use jobs::{BackgroundJobs, JobsConfig};
pub use learning::{
    apply_feedback, learn_from_correction, CorrectionRequest, FeedbackAction, LearningOutcome,
};
pub use prediction::{predict, PredictRequest, Prediction};
pub use retrieval::{
    estimated_tokens, priority_kinds, select_within_budget, CompressionLevel, Intent,
    RetrieveRequest, RetrieveResult, RetrievedMemory, ScoredCandidate,
};
pub use session::SessionManager;
pub use status::{compute_status, EngineStatus};
pub use telemetry::init_tracing;
pub use validation::{run_validation, ValidationOptions, ValidationScope, ValidationStats};

pub use memoria_store::{
    CausalLink, EmbeddingProvider, HashEmbedder, HttpEmbedder, Importance, InMemoryStore,
    Knowledge, ListFilter, Memory, MemoryId, MemoryKind, MemoryPatch, MemoryStore, Relation,
    SearchHit, SearchRequest, Severity, StoreError, SurrealStore,
};

/// Memoria version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
