//! Record types persisted by the Memoria store.
//!
//! Tables:
//! - memories: the atomic unit of knowledge (kind-polymorphic payload)
//! - links: directed, typed causal relationships between memories
//! - sessions: per-caller delivery tracking
//! - consolidations: idempotence guards for episodic consolidation
//! - validations: audit trail of validation sweeps

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// MemoryId
// ---------------------------------------------------------------------------

/// Unique identifier for a memory, immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub String);

impl MemoryId {
    /// Generate a new random MemoryId.
    pub fn new() -> Self {
        MemoryId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 chars) for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        MemoryId(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// MemoryKind
// ---------------------------------------------------------------------------

/// The closed set of memory variants.
///
/// Each kind carries its own decay half-life and payload shape. Unknown kind
/// tags are rejected at the write boundary, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Durable identity facts. Never decay.
    Identity,
    /// Institutional warnings ("always X", "never Y").
    Warning,
    /// How-to procedures with ordered steps.
    Procedure,
    /// Knowledge consolidated from raw episodes.
    Consolidated,
    /// Raw interaction records; short-lived consolidation fodder.
    Episode,
    /// Rationale behind an observed pattern.
    PatternRationale,
    /// A known-bad pattern and its remedy.
    AntiPattern,
    /// Decision context (what was chosen and why).
    Decision,
    /// An approved exception to a rule.
    Exception,
    /// An objective or goal being pursued.
    Objective,
    /// Postmortem findings from an incident.
    Postmortem,
    /// Skill proficiency descriptor.
    Skill,
    /// Environment descriptor (host, toolchain, endpoints).
    Environment,
    /// Reusable agent configuration.
    AgentProfile,
    /// A multi-stage workflow.
    Workflow,
    /// A tracked entity (person, service, system).
    Entity,
    /// Meeting record.
    Meeting,
    /// Conversation summary.
    Conversation,
    /// Feedback record (corrections, confirmations).
    Feedback,
    /// Free-form note.
    Note,
}

impl MemoryKind {
    /// Decay half-life in days. `None` means the kind never decays.
    pub fn half_life_days(&self) -> Option<f64> {
        match self {
            Self::Identity => None,
            Self::Warning => Some(365.0),
            Self::Procedure => Some(180.0),
            Self::Consolidated => Some(270.0),
            Self::Episode => Some(7.0),
            Self::PatternRationale => Some(180.0),
            Self::AntiPattern => Some(270.0),
            Self::Decision => Some(120.0),
            Self::Exception => Some(90.0),
            Self::Objective => Some(60.0),
            Self::Postmortem => Some(180.0),
            Self::Skill => Some(120.0),
            Self::Environment => Some(90.0),
            Self::AgentProfile => Some(120.0),
            Self::Workflow => Some(180.0),
            Self::Entity => Some(240.0),
            Self::Meeting => Some(30.0),
            Self::Conversation => Some(14.0),
            Self::Feedback => Some(60.0),
            Self::Note => Some(30.0),
        }
    }

    /// Whether effective confidence equals base confidence at any age.
    pub fn never_decays(&self) -> bool {
        self.half_life_days().is_none()
    }

    /// Kinds that assert checkable claims and participate in contradiction
    /// detection on write.
    pub fn is_factual(&self) -> bool {
        matches!(
            self,
            Self::Identity
                | Self::Warning
                | Self::PatternRationale
                | Self::AntiPattern
                | Self::Decision
                | Self::Exception
                | Self::Environment
                | Self::Entity
                | Self::Skill
        )
    }

    /// All kinds, in declaration order.
    pub fn all() -> &'static [MemoryKind] {
        &[
            Self::Identity,
            Self::Warning,
            Self::Procedure,
            Self::Consolidated,
            Self::Episode,
            Self::PatternRationale,
            Self::AntiPattern,
            Self::Decision,
            Self::Exception,
            Self::Objective,
            Self::Postmortem,
            Self::Skill,
            Self::Environment,
            Self::AgentProfile,
            Self::Workflow,
            Self::Entity,
            Self::Meeting,
            Self::Conversation,
            Self::Feedback,
            Self::Note,
        ]
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Identity => "identity",
            Self::Warning => "warning",
            Self::Procedure => "procedure",
            Self::Consolidated => "consolidated",
            Self::Episode => "episode",
            Self::PatternRationale => "pattern_rationale",
            Self::AntiPattern => "anti_pattern",
            Self::Decision => "decision",
            Self::Exception => "exception",
            Self::Objective => "objective",
            Self::Postmortem => "postmortem",
            Self::Skill => "skill",
            Self::Environment => "environment",
            Self::AgentProfile => "agent_profile",
            Self::Workflow => "workflow",
            Self::Entity => "entity",
            Self::Meeting => "meeting",
            Self::Conversation => "conversation",
            Self::Feedback => "feedback",
            Self::Note => "note",
        };
        write!(f, "{tag}")
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemoryKind::all()
            .iter()
            .find(|k| k.to_string() == s)
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Importance
// ---------------------------------------------------------------------------

/// Ordinal importance of a memory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ---------------------------------------------------------------------------
// Knowledge - kind-polymorphic payload
// ---------------------------------------------------------------------------

/// Severity attached to warning payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

/// Kind-specific structured payload, one case per [`MemoryKind`].
///
/// Dispatch is by pattern matching; the variant tag must agree with the
/// memory's `kind` field (checked at the write boundary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Knowledge {
    Identity { statement: String },
    Warning { topic: String, severity: Severity, advice: String },
    Procedure { goal: String, steps: Vec<String> },
    Consolidated { pattern: String, source_count: usize },
    Episode { interaction: String, outcome: Option<String> },
    PatternRationale { pattern: String, rationale: String },
    AntiPattern { pattern: String, remedy: String },
    Decision { decision: String, context: String, alternatives: Vec<String> },
    Exception { rule: String, justification: String },
    Objective { goal: String, due: Option<DateTime<Utc>> },
    Postmortem { incident: String, root_cause: String, lessons: Vec<String> },
    Skill { name: String, proficiency: f64 },
    Environment { name: String, attributes: BTreeMap<String, String> },
    AgentProfile { name: String, config: serde_json::Value },
    Workflow { name: String, stages: Vec<String> },
    Entity { name: String, attributes: BTreeMap<String, String> },
    Meeting { subject: String, attendees: Vec<String>, notes: String },
    Conversation { digest: String },
    Feedback { verdict: String, detail: String },
    Note { text: String },
}

impl Knowledge {
    /// The memory kind this payload belongs to.
    pub fn kind(&self) -> MemoryKind {
        match self {
            Self::Identity { .. } => MemoryKind::Identity,
            Self::Warning { .. } => MemoryKind::Warning,
            Self::Procedure { .. } => MemoryKind::Procedure,
            Self::Consolidated { .. } => MemoryKind::Consolidated,
            Self::Episode { .. } => MemoryKind::Episode,
            Self::PatternRationale { .. } => MemoryKind::PatternRationale,
            Self::AntiPattern { .. } => MemoryKind::AntiPattern,
            Self::Decision { .. } => MemoryKind::Decision,
            Self::Exception { .. } => MemoryKind::Exception,
            Self::Objective { .. } => MemoryKind::Objective,
            Self::Postmortem { .. } => MemoryKind::Postmortem,
            Self::Skill { .. } => MemoryKind::Skill,
            Self::Environment { .. } => MemoryKind::Environment,
            Self::AgentProfile { .. } => MemoryKind::AgentProfile,
            Self::Workflow { .. } => MemoryKind::Workflow,
            Self::Entity { .. } => MemoryKind::Entity,
            Self::Meeting { .. } => MemoryKind::Meeting,
            Self::Conversation { .. } => MemoryKind::Conversation,
            Self::Feedback { .. } => MemoryKind::Feedback,
            Self::Note { .. } => MemoryKind::Note,
        }
    }

    /// Regenerate a human-readable summary from the payload.
    ///
    /// Used by validation healing when the stored summary is missing or
    /// malformed. Returns an empty string when the payload itself carries
    /// no usable text.
    pub fn summary_text(&self) -> String {
        match self {
            Self::Identity { statement } => statement.clone(),
            Self::Warning { topic, advice, .. } => format!("{topic}: {advice}"),
            Self::Procedure { goal, steps } => {
                format!("{goal} ({} steps)", steps.len())
            }
            Self::Consolidated { pattern, source_count } => {
                format!("{pattern} (from {source_count} episodes)")
            }
            Self::Episode { interaction, .. } => interaction.clone(),
            Self::PatternRationale { pattern, rationale } => {
                format!("{pattern}: {rationale}")
            }
            Self::AntiPattern { pattern, remedy } => {
                format!("avoid {pattern}; instead {remedy}")
            }
            Self::Decision { decision, context, .. } => format!("{decision} ({context})"),
            Self::Exception { rule, justification } => {
                format!("exception to {rule}: {justification}")
            }
            Self::Objective { goal, .. } => goal.clone(),
            Self::Postmortem { incident, root_cause, .. } => {
                format!("{incident}: {root_cause}")
            }
            Self::Skill { name, proficiency } => {
                format!("{name} (proficiency {proficiency:.2})")
            }
            Self::Environment { name, .. } => name.clone(),
            Self::AgentProfile { name, .. } => name.clone(),
            Self::Workflow { name, stages } => format!("{name} ({} stages)", stages.len()),
            Self::Entity { name, .. } => name.clone(),
            Self::Meeting { subject, .. } => subject.clone(),
            Self::Conversation { digest } => digest.clone(),
            Self::Feedback { verdict, detail } => format!("{verdict}: {detail}"),
            Self::Note { text } => text.clone(),
        }
    }

    /// Whether the payload carries the minimum structure its kind requires.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Identity { statement } => !statement.trim().is_empty(),
            Self::Warning { topic, advice, .. } => {
                !topic.trim().is_empty() && !advice.trim().is_empty()
            }
            Self::Procedure { goal, steps } => !goal.trim().is_empty() && !steps.is_empty(),
            Self::Consolidated { pattern, source_count } => {
                !pattern.trim().is_empty() && *source_count > 0
            }
            Self::Episode { interaction, .. } => !interaction.trim().is_empty(),
            Self::PatternRationale { pattern, rationale } => {
                !pattern.trim().is_empty() && !rationale.trim().is_empty()
            }
            Self::AntiPattern { pattern, remedy } => {
                !pattern.trim().is_empty() && !remedy.trim().is_empty()
            }
            Self::Decision { decision, .. } => !decision.trim().is_empty(),
            Self::Exception { rule, .. } => !rule.trim().is_empty(),
            Self::Objective { goal, .. } => !goal.trim().is_empty(),
            Self::Postmortem { incident, root_cause, .. } => {
                !incident.trim().is_empty() && !root_cause.trim().is_empty()
            }
            Self::Skill { name, proficiency } => {
                !name.trim().is_empty() && (0.0..=1.0).contains(proficiency)
            }
            Self::Environment { name, .. } => !name.trim().is_empty(),
            Self::AgentProfile { name, config } => !name.trim().is_empty() && !config.is_null(),
            Self::Workflow { name, stages } => !name.trim().is_empty() && !stages.is_empty(),
            Self::Entity { name, .. } => !name.trim().is_empty(),
            Self::Meeting { subject, .. } => !subject.trim().is_empty(),
            Self::Conversation { digest } => !digest.trim().is_empty(),
            Self::Feedback { verdict, .. } => !verdict.trim().is_empty(),
            Self::Note { text } => !text.trim().is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// The atomic unit of knowledge.
///
/// Invariants:
/// - `base_confidence` stays in `[0,1]`; every writer clamps.
/// - `soft_deleted` memories are excluded from retrieval and search but
///   retained for audit and causal-chain integrity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub kind: MemoryKind,
    pub summary: String,
    pub knowledge: Knowledge,
    pub base_confidence: f64,
    pub importance: Importance,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
    pub soft_deleted: bool,
    /// Provider-produced embedding vector; absent when the provider was
    /// unavailable at write time.
    pub embedding: Option<Vec<f32>>,
}

impl Memory {
    /// Create a memory with a fresh id and the current time.
    ///
    /// The payload's variant must agree with `kind`; callers that accept
    /// external input check this with [`Memory::kind_matches`] before
    /// persisting.
    pub fn new(kind: MemoryKind, summary: impl Into<String>, knowledge: Knowledge) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            kind,
            summary: summary.into(),
            knowledge,
            base_confidence: 0.8,
            importance: Importance::Normal,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            access_count: 0,
            soft_deleted: false,
            embedding: None,
        }
    }

    /// Whether the payload variant agrees with the declared kind.
    pub fn kind_matches(&self) -> bool {
        self.knowledge.kind() == self.kind
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.base_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_tags<I: IntoIterator<Item = String>>(mut self, tags: I) -> Self {
        for tag in tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self.last_accessed_at = at;
        self
    }

    /// Whether this memory shares at least one tag with `other`.
    pub fn shares_tag_with(&self, other: &Memory) -> bool {
        self.tags.iter().any(|t| other.tags.contains(t))
    }
}

/// Partial update applied through [`crate::MemoryStore::update`].
///
/// `base_confidence` is clamped to `[0,1]` when applied; `updated_at` is
/// bumped by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryPatch {
    pub summary: Option<String>,
    pub knowledge: Option<Knowledge>,
    pub base_confidence: Option<f64>,
    pub importance: Option<Importance>,
    pub tags: Option<Vec<String>>,
    pub soft_deleted: Option<bool>,
    /// Replacement embedding; `None` leaves the stored vector unchanged.
    pub embedding: Option<Vec<f32>>,
}

impl MemoryPatch {
    pub fn confidence(value: f64) -> Self {
        Self {
            base_confidence: Some(value),
            ..Default::default()
        }
    }

    pub fn summary(value: impl Into<String>) -> Self {
        Self {
            summary: Some(value.into()),
            ..Default::default()
        }
    }

    /// Apply this patch to a memory in place.
    pub fn apply(&self, memory: &mut Memory, now: DateTime<Utc>) {
        if let Some(ref summary) = self.summary {
            memory.summary = summary.clone();
        }
        if let Some(ref knowledge) = self.knowledge {
            memory.knowledge = knowledge.clone();
        }
        if let Some(confidence) = self.base_confidence {
            memory.base_confidence = confidence.clamp(0.0, 1.0);
        }
        if let Some(importance) = self.importance {
            memory.importance = importance;
        }
        if let Some(ref tags) = self.tags {
            memory.tags = tags.clone();
        }
        if let Some(deleted) = self.soft_deleted {
            memory.soft_deleted = deleted;
        }
        if let Some(ref embedding) = self.embedding {
            memory.embedding = Some(embedding.clone());
        }
        memory.updated_at = now;
    }
}

// ---------------------------------------------------------------------------
// CausalLink
// ---------------------------------------------------------------------------

/// Typed relation carried by a causal link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    DerivedFrom,
    Supersedes,
    Supports,
    Contradicts,
    RelatedTo,
    Owns,
    Affects,
    Blocks,
    Requires,
    LearnedFrom,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::DerivedFrom => "derived_from",
            Self::Supersedes => "supersedes",
            Self::Supports => "supports",
            Self::Contradicts => "contradicts",
            Self::RelatedTo => "related_to",
            Self::Owns => "owns",
            Self::Affects => "affects",
            Self::Blocks => "blocks",
            Self::Requires => "requires",
            Self::LearnedFrom => "learned_from",
        };
        write!(f, "{tag}")
    }
}

/// Directed edge between two memories. The graph may contain cycles; all
/// traversals guard with a visited set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalLink {
    pub source_id: MemoryId,
    pub target_id: MemoryId,
    pub relation: Relation,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

impl CausalLink {
    pub fn new(source_id: MemoryId, target_id: MemoryId, relation: Relation) -> Self {
        Self {
            source_id,
            target_id,
            relation,
            weight: 1.0,
            created_at: Utc::now(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Identity key: at most one link per `(source, target, relation)`.
    pub fn key(&self) -> (String, String, Relation) {
        (
            self.source_id.0.clone(),
            self.target_id.0.clone(),
            self.relation,
        )
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// Per-caller delivery tracking: a memory id, once sent, is never resent
/// within the session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub sent_memory_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub last_touched_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            sent_memory_ids: BTreeSet::new(),
            created_at: now,
            last_touched_at: now,
        }
    }

    pub fn has_sent(&self, id: &MemoryId) -> bool {
        self.sent_memory_ids.contains(&id.0)
    }
}

// ---------------------------------------------------------------------------
// ConsolidationRecord / ValidationRecord
// ---------------------------------------------------------------------------

/// Idempotence guard for episodic consolidation. A cluster signature that
/// already has a record is never reprocessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationRecord {
    pub cluster_signature: String,
    pub source_episode_ids: Vec<MemoryId>,
    pub produced_memory_id: MemoryId,
    pub created_at: DateTime<Utc>,
}

/// Outcome of examining one memory during a validation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Valid,
    Healed,
    Stale,
    Removed,
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Healed => write!(f, "healed"),
            Self::Stale => write!(f, "stale"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// Audit record written for every memory touched by a validation sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub memory_id: MemoryId,
    pub outcome: ValidationOutcome,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tag_roundtrip() {
        for kind in MemoryKind::all() {
            let tag = kind.to_string();
            let parsed: MemoryKind = tag.parse().unwrap();
            assert_eq!(parsed, *kind);
        }
        assert!("no_such_kind".parse::<MemoryKind>().is_err());
    }

    #[test]
    fn test_kind_serde_matches_display() {
        for kind in MemoryKind::all() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_identity_never_decays() {
        assert!(MemoryKind::Identity.never_decays());
        assert!(MemoryKind::Identity.half_life_days().is_none());
        assert!(!MemoryKind::Episode.never_decays());
    }

    #[test]
    fn test_episode_has_shortest_half_life() {
        let episode = MemoryKind::Episode.half_life_days().unwrap();
        for kind in MemoryKind::all() {
            if let Some(hl) = kind.half_life_days() {
                assert!(hl >= episode, "{kind} half-life below episode");
            }
        }
    }

    #[test]
    fn test_knowledge_kind_agreement() {
        let k = Knowledge::Warning {
            topic: "locks".into(),
            severity: Severity::High,
            advice: "always take the write lock first".into(),
        };
        assert_eq!(k.kind(), MemoryKind::Warning);

        let m = Memory::new(MemoryKind::Warning, "lock ordering", k);
        assert!(m.kind_matches());

        let mismatched = Memory::new(
            MemoryKind::Episode,
            "x",
            Knowledge::Note { text: "x".into() },
        );
        assert!(!mismatched.kind_matches());
    }

    #[test]
    fn test_summary_regeneration() {
        let k = Knowledge::Procedure {
            goal: "rotate credentials".into(),
            steps: vec!["revoke".into(), "issue".into(), "deploy".into()],
        };
        assert_eq!(k.summary_text(), "rotate credentials (3 steps)");

        let empty = Knowledge::Note { text: "  ".into() };
        assert!(!empty.is_well_formed());
    }

    #[test]
    fn test_confidence_clamped_by_builders() {
        let m = Memory::new(
            MemoryKind::Note,
            "n",
            Knowledge::Note { text: "n".into() },
        )
        .with_confidence(1.7);
        assert!((m.base_confidence - 1.0).abs() < f64::EPSILON);

        let mut m = m;
        MemoryPatch::confidence(-0.4).apply(&mut m, Utc::now());
        assert!((m.base_confidence - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_patch_bumps_updated_at() {
        let mut m = Memory::new(
            MemoryKind::Note,
            "before",
            Knowledge::Note { text: "before".into() },
        );
        let later = m.updated_at + chrono::Duration::hours(1);
        MemoryPatch::summary("after").apply(&mut m, later);
        assert_eq!(m.summary, "after");
        assert_eq!(m.updated_at, later);
    }

    #[test]
    fn test_tags_are_set_like() {
        let m = Memory::new(
            MemoryKind::Note,
            "n",
            Knowledge::Note { text: "n".into() },
        )
        .with_tag("rust")
        .with_tag("rust")
        .with_tag("async");
        assert_eq!(m.tags.len(), 2);
    }

    #[test]
    fn test_link_key_dedup_identity() {
        let a = MemoryId::from("a");
        let b = MemoryId::from("b");
        let l1 = CausalLink::new(a.clone(), b.clone(), Relation::Supports);
        let l2 = CausalLink::new(a, b, Relation::Supports).with_weight(0.5);
        assert_eq!(l1.key(), l2.key());
    }

    #[test]
    fn test_memory_serde_roundtrip() {
        let m = Memory::new(
            MemoryKind::Decision,
            "chose surrealkv",
            Knowledge::Decision {
                decision: "chose surrealkv".into(),
                context: "embedded durability".into(),
                alternatives: vec!["sqlite".into()],
            },
        )
        .with_tag("storage")
        .with_importance(Importance::High);
        let json = serde_json::to_string(&m).unwrap();
        let back: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
