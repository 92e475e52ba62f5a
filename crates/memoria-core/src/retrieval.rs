//! Intent-aware, budget-constrained retrieval.
//!
//! Candidates come from hybrid search restricted to the intent's priority
//! kinds; each is scored `effective_confidence × similarity`, ids already
//! delivered to the session are excluded, and the rest are greedily packed
//! into the token budget at the requested compression level.

use serde::{Deserialize, Serialize};

use memoria_store::{Memory, MemoryKind};

/// Task intent driving kind prioritization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BugFix,
    FeatureAdd,
    Refactor,
    Review,
    Debug,
    Planning,
    #[default]
    General,
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bug_fix" => Ok(Self::BugFix),
            "feature_add" => Ok(Self::FeatureAdd),
            "refactor" => Ok(Self::Refactor),
            "review" => Ok(Self::Review),
            "debug" => Ok(Self::Debug),
            "planning" => Ok(Self::Planning),
            "general" => Ok(Self::General),
            other => Err(other.to_string()),
        }
    }
}

/// Fixed kind-priority table per intent.
pub fn priority_kinds(intent: Intent) -> &'static [MemoryKind] {
    match intent {
        Intent::BugFix => &[
            MemoryKind::AntiPattern,
            MemoryKind::Warning,
            MemoryKind::Postmortem,
            MemoryKind::Procedure,
            MemoryKind::Consolidated,
        ],
        Intent::FeatureAdd => &[
            MemoryKind::PatternRationale,
            MemoryKind::Procedure,
            MemoryKind::Decision,
            MemoryKind::Workflow,
            MemoryKind::Consolidated,
        ],
        Intent::Refactor => &[
            MemoryKind::PatternRationale,
            MemoryKind::AntiPattern,
            MemoryKind::Decision,
            MemoryKind::Exception,
            MemoryKind::Consolidated,
        ],
        Intent::Review => &[
            MemoryKind::Warning,
            MemoryKind::AntiPattern,
            MemoryKind::Exception,
            MemoryKind::Decision,
            MemoryKind::PatternRationale,
        ],
        Intent::Debug => &[
            MemoryKind::Postmortem,
            MemoryKind::Warning,
            MemoryKind::AntiPattern,
            MemoryKind::Environment,
            MemoryKind::Episode,
        ],
        Intent::Planning => &[
            MemoryKind::Objective,
            MemoryKind::Decision,
            MemoryKind::Workflow,
            MemoryKind::Meeting,
            MemoryKind::Consolidated,
        ],
        // general intent searches the full kind set
        Intent::General => MemoryKind::all(),
    }
}

/// Verbosity tier used to fit results into the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    IdOnly,
    #[default]
    OneLine,
    WithExample,
    FullDetail,
}

impl CompressionLevel {
    /// Parse the numeric tiers 0-3.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::IdOnly),
            1 => Some(Self::OneLine),
            2 => Some(Self::WithExample),
            3 => Some(Self::FullDetail),
            _ => None,
        }
    }
}

/// Rough token cost of rendering a memory at a compression level.
///
/// Uses the usual 4-chars-per-token heuristic; strictly non-decreasing in
/// the level.
pub fn estimated_tokens(memory: &Memory, level: CompressionLevel) -> usize {
    let id_cost = 8;
    let summary_cost = memory.summary.len().div_ceil(4);
    let knowledge_cost = serde_json::to_string(&memory.knowledge)
        .map(|s| s.len().div_ceil(4))
        .unwrap_or(0);

    match level {
        CompressionLevel::IdOnly => id_cost,
        CompressionLevel::OneLine => id_cost + summary_cost,
        CompressionLevel::WithExample => id_cost + summary_cost + knowledge_cost / 2,
        CompressionLevel::FullDetail => id_cost + summary_cost + knowledge_cost,
    }
}

/// A retrieval request for one caller session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub intent: Intent,
    /// Free-text focus of the current task.
    pub focus: String,
    pub max_tokens: usize,
    pub compression: CompressionLevel,
    pub session_id: String,
}

/// One delivered memory with its ranking score and token cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub memory: Memory,
    pub score: f64,
    pub estimated_tokens: usize,
}

/// The delivered bundle. The sum of `estimated_tokens` never exceeds the
/// requested budget.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveResult {
    pub memories: Vec<RetrievedMemory>,
    pub tokens_used: usize,
}

/// A candidate entering budget packing.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub memory: Memory,
    /// `effective_confidence × similarity`.
    pub score: f64,
}

/// Greedily pack candidates into the budget.
///
/// Ordering is deterministic: score descending, then older `created_at`
/// first, then id. Candidates that do not fit are skipped, not truncated.
pub fn select_within_budget(
    mut candidates: Vec<ScoredCandidate>,
    max_tokens: usize,
    level: CompressionLevel,
) -> RetrieveResult {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.memory.created_at.cmp(&b.memory.created_at))
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });

    let mut result = RetrieveResult::default();
    for candidate in candidates {
        let cost = estimated_tokens(&candidate.memory, level);
        if result.tokens_used + cost > max_tokens {
            continue;
        }
        result.tokens_used += cost;
        result.memories.push(RetrievedMemory {
            memory: candidate.memory,
            score: candidate.score,
            estimated_tokens: cost,
        });
    }
    result
}
