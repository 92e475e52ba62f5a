//! Engine configuration.
//!
//! Every tunable threshold lives here with a default, so deployments can
//! adjust behavior without code changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contradiction::ContradictionConfig;
use crate::decay::DecayConfig;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub decay: DecayConfig,
    pub contradiction: ContradictionConfig,
    pub retrieval: RetrievalConfig,
    pub session: SessionConfig,
    pub consolidation: ConsolidationDefaults,
    pub validation: ValidationDefaults,
}

/// Retrieval defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidate pool size fetched from search before budget packing.
    pub candidate_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 64,
        }
    }
}

/// Session expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle TTL after which a session is evicted.
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Defaults applied when a consolidation pass is requested without
/// explicit options (background jobs use these).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationDefaults {
    pub min_episodes: usize,
    pub similarity_threshold: f64,
}

impl Default for ConsolidationDefaults {
    fn default() -> Self {
        Self {
            min_episodes: 3,
            similarity_threshold: 0.80,
        }
    }
}

/// Defaults for background validation sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDefaults {
    pub min_confidence: f64,
    /// Confidence floor used by `status` for the low-confidence count.
    pub low_confidence_threshold: f64,
}

impl Default for ValidationDefaults {
    fn default() -> Self {
        Self {
            min_confidence: 0.25,
            low_confidence_threshold: 0.3,
        }
    }
}
