//! Confidence decay.
//!
//! Effective confidence is the stored base confidence discounted by age:
//! `base × 2^(-effective_age_days / half_life_days)`, where frequent access
//! earns a bounded age reduction. Kinds without a half-life never decay.
//!
//! Every read path that ranks memories uses [`effective_confidence`];
//! reads never mutate the stored base confidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memoria_store::Memory;

/// Usage-bonus constants for the decay curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Days of age forgiven per recorded access.
    pub bonus_per_access_days: f64,
    /// Cap on the total age forgiven; access slows decay but never stops it.
    pub max_usage_bonus_days: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            bonus_per_access_days: 2.0,
            max_usage_bonus_days: 60.0,
        }
    }
}

/// Age of a memory in fractional days at `now`. Clock skew clamps to zero.
pub fn age_days(memory: &Memory, now: DateTime<Utc>) -> f64 {
    let seconds = (now - memory.created_at).num_seconds();
    (seconds as f64 / 86_400.0).max(0.0)
}

/// Compute the effective confidence of a memory at `now`.
pub fn effective_confidence(memory: &Memory, now: DateTime<Utc>, config: &DecayConfig) -> f64 {
    let half_life = match memory.kind.half_life_days() {
        Some(days) => days,
        None => return memory.base_confidence,
    };

    let usage_bonus = (memory.access_count as f64 * config.bonus_per_access_days)
        .min(config.max_usage_bonus_days);
    let effective_age = (age_days(memory, now) - usage_bonus).max(0.0);

    memory.base_confidence * 2f64.powf(-effective_age / half_life)
}
