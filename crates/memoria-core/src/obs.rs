//! Structured observability hooks for engine lifecycle events.
//!
//! Events are emitted at `info!` level; configure verbosity with the
//! `RUST_LOG` environment variable (see [`crate::telemetry::init_tracing`]).

use tracing::info;

use crate::consolidation::ConsolidationStats;
use crate::validation::ValidationStats;

/// Emit event: a memory was persisted.
pub fn emit_memory_added(memory_id: &str, kind: &str, links: usize) {
    info!(event = "memory.added", memory_id = %memory_id, kind = %kind, links = links);
}

/// Emit event: a contradiction was confirmed and penalized.
pub fn emit_contradiction_detected(
    memory_id: &str,
    contradicted_id: &str,
    penalty: f64,
    propagated: usize,
) {
    info!(
        event = "contradiction.detected",
        memory_id = %memory_id,
        contradicted_id = %contradicted_id,
        penalty = penalty,
        propagated = propagated,
    );
}

/// Emit event: a consolidation pass finished.
pub fn emit_consolidation_finished(stats: &ConsolidationStats, dry_run: bool) {
    info!(
        event = "consolidation.finished",
        episodes_processed = stats.episodes_processed,
        memories_created = stats.memories_created,
        memories_pruned = stats.memories_pruned,
        estimated_tokens_freed = stats.estimated_tokens_freed,
        dry_run = dry_run,
    );
}

/// Emit event: a validation sweep finished.
pub fn emit_validation_finished(stats: &ValidationStats) {
    info!(
        event = "validation.finished",
        validated = stats.validated,
        healed = stats.healed,
        stale = stats.stale,
        removed = stats.removed,
    );
}

/// Emit event: a retrieval bundle was served.
pub fn emit_retrieval_served(session_id: &str, memories: usize, tokens_used: usize) {
    info!(
        event = "retrieval.served",
        session_id = %session_id,
        memories = memories,
        tokens_used = tokens_used,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic() {
        emit_memory_added("m-1", "warning", 2);
        emit_contradiction_detected("m-1", "m-2", 0.3, 1);
        emit_consolidation_finished(&ConsolidationStats::default(), true);
        emit_validation_finished(&ValidationStats::default());
        emit_retrieval_served("s-1", 3, 420);
    }
}
