//! Memoria - persistent knowledge store CLI
//!
//! The `memoria` command exposes the engine's operation contract to
//! scripts and humans.
//!
//! ## Commands
//!
//! - `add` / `get` / `list` / `search` / `delete`: memory CRUD and search
//! - `retrieve`: token-budgeted, session-deduplicated context bundle
//! - `feedback` / `learn`: confidence adjustment and correction capture
//! - `validate` / `consolidate`: maintenance passes
//! - `explain` / `graph`: causal narratives and traversal
//! - `predict` / `status`: anticipation and health

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use memoria_core::{
    init_tracing, CompressionLevel, CorrectionRequest, Direction, EngineConfig, EngineError,
    FeedbackAction, Importance, Intent, Knowledge, ListFilter, MemoryEngine, MemoryId, MemoryKind,
    NewMemory, PredictRequest, Relation, RetrieveRequest, SearchRequest, Severity,
    ConsolidationOptions, ValidationOptions, ValidationScope,
};
use memoria_store::SurrealStore;

#[derive(Parser)]
#[command(name = "memoria")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Persistent, self-decaying, causally-linked knowledge store", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Database URL (mem:// or surrealkv://path)
    #[arg(long, global = true, env = "MEMORIA_DB_URL", default_value = "mem://")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a memory
    Add {
        /// Memory kind tag (e.g. warning, procedure, episode)
        #[arg(short, long)]
        kind: String,

        /// Short human-readable summary
        #[arg(short, long)]
        summary: String,

        /// Kind-specific payload as JSON (defaults to a payload derived
        /// from the summary)
        #[arg(long)]
        knowledge: Option<String>,

        /// Base confidence in [0,1]
        #[arg(short, long)]
        confidence: Option<f64>,

        /// Importance: low, normal, high, critical
        #[arg(short, long, default_value = "normal")]
        importance: String,

        /// Tags (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Immediate links as id=relation (repeatable)
        #[arg(short, long)]
        link: Vec<String>,
    },

    /// Get a memory by id
    Get {
        id: String,
    },

    /// List memories with filters
    List {
        #[arg(short, long)]
        kind: Option<String>,

        #[arg(short, long)]
        tag: Option<String>,

        #[arg(long)]
        include_deleted: bool,

        #[arg(long)]
        cursor: Option<String>,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Hybrid lexical + vector search
    Search {
        query: String,

        /// Restrict to kinds (repeatable)
        #[arg(short, long)]
        kind: Vec<String>,

        #[arg(long)]
        min_confidence: Option<f64>,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Retrieve a token-budgeted context bundle for a task
    Retrieve {
        /// Free-text focus of the task
        focus: String,

        /// Task intent: bug_fix, feature_add, refactor, review, debug,
        /// planning, general
        #[arg(short, long, default_value = "general")]
        intent: String,

        #[arg(short, long, default_value = "2000")]
        max_tokens: usize,

        /// Compression level 0-3 (id-only .. full detail)
        #[arg(short, long, default_value = "1")]
        compression: u8,

        /// Caller session id (dedup scope)
        #[arg(short, long)]
        session: String,
    },

    /// Record feedback on a memory
    Feedback {
        id: String,

        /// confirm, reject, or modify
        action: String,

        /// Replacement summary (modify only)
        #[arg(long)]
        summary: Option<String>,
    },

    /// Learn from a correction
    Learn {
        /// The statement being corrected
        #[arg(long)]
        original: String,

        /// The corrected statement
        #[arg(long)]
        correction: String,

        #[arg(short, long)]
        tag: Vec<String>,

        /// Related memory ids (repeatable)
        #[arg(short, long)]
        related: Vec<String>,
    },

    /// Run a validation sweep
    Validate {
        /// all, stale, recent, high_importance
        #[arg(long, default_value = "all")]
        scope: String,

        /// Skip summary regeneration for malformed memories
        #[arg(long)]
        no_heal: bool,

        #[arg(long)]
        remove_invalid: bool,

        #[arg(long, default_value = "0.25")]
        min_confidence: f64,
    },

    /// Consolidate raw episodes into durable knowledge
    Consolidate {
        #[arg(long, default_value = "3")]
        min_episodes: usize,

        #[arg(long, default_value = "0.8")]
        similarity_threshold: f64,

        #[arg(long)]
        dry_run: bool,
    },

    /// Render the causal narrative of a memory
    Explain {
        id: String,

        #[arg(short, long, default_value = "3")]
        depth: usize,
    },

    /// Traverse the causal graph from a memory
    Graph {
        id: String,

        /// out, in, or both
        #[arg(long, default_value = "both")]
        direction: String,

        #[arg(short, long, default_value = "2")]
        depth: usize,
    },

    /// Predict which memories will be needed next
    Predict {
        #[arg(short, long)]
        tag: Vec<String>,

        #[arg(long)]
        focus: Option<String>,

        #[arg(short, long, default_value = "general")]
        intent: String,

        /// Recently retrieved memory ids (repeatable)
        #[arg(short, long)]
        recent: Vec<String>,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Aggregate status and health score
    Status,

    /// Soft-delete a memory
    Delete {
        id: String,
    },
}

fn parse_kind(tag: &str) -> Result<MemoryKind> {
    tag.parse()
        .map_err(|kind| anyhow!(EngineError::InvalidKind { kind }))
}

fn parse_importance(tag: &str) -> Result<Importance> {
    match tag {
        "low" => Ok(Importance::Low),
        "normal" => Ok(Importance::Normal),
        "high" => Ok(Importance::High),
        "critical" => Ok(Importance::Critical),
        other => Err(anyhow!("unknown importance: {other}")),
    }
}

fn parse_relation(tag: &str) -> Result<Relation> {
    let relation = match tag {
        "derived_from" => Relation::DerivedFrom,
        "supersedes" => Relation::Supersedes,
        "supports" => Relation::Supports,
        "contradicts" => Relation::Contradicts,
        "related_to" => Relation::RelatedTo,
        "owns" => Relation::Owns,
        "affects" => Relation::Affects,
        "blocks" => Relation::Blocks,
        "requires" => Relation::Requires,
        "learned_from" => Relation::LearnedFrom,
        other => return Err(anyhow!("unknown relation: {other}")),
    };
    Ok(relation)
}

/// Payload derived from the summary when `--knowledge` is not given.
fn default_knowledge(kind: MemoryKind, summary: &str) -> Knowledge {
    let text = summary.to_string();
    match kind {
        MemoryKind::Identity => Knowledge::Identity { statement: text },
        MemoryKind::Warning => Knowledge::Warning {
            topic: text.clone(),
            severity: Severity::Medium,
            advice: text,
        },
        MemoryKind::Procedure => Knowledge::Procedure {
            goal: text.clone(),
            steps: vec![text],
        },
        MemoryKind::Consolidated => Knowledge::Consolidated {
            pattern: text,
            source_count: 1,
        },
        MemoryKind::Episode => Knowledge::Episode {
            interaction: text,
            outcome: None,
        },
        MemoryKind::PatternRationale => Knowledge::PatternRationale {
            pattern: text.clone(),
            rationale: text,
        },
        MemoryKind::AntiPattern => Knowledge::AntiPattern {
            pattern: text.clone(),
            remedy: text,
        },
        MemoryKind::Decision => Knowledge::Decision {
            decision: text.clone(),
            context: text,
            alternatives: Vec::new(),
        },
        MemoryKind::Exception => Knowledge::Exception {
            rule: text.clone(),
            justification: text,
        },
        MemoryKind::Objective => Knowledge::Objective {
            goal: text,
            due: None,
        },
        MemoryKind::Postmortem => Knowledge::Postmortem {
            incident: text.clone(),
            root_cause: text,
            lessons: Vec::new(),
        },
        MemoryKind::Skill => Knowledge::Skill {
            name: text,
            proficiency: 0.5,
        },
        MemoryKind::Environment => Knowledge::Environment {
            name: text,
            attributes: BTreeMap::new(),
        },
        MemoryKind::AgentProfile => Knowledge::AgentProfile {
            name: text,
            config: serde_json::json!({}),
        },
        MemoryKind::Workflow => Knowledge::Workflow {
            name: text.clone(),
            stages: vec![text],
        },
        MemoryKind::Entity => Knowledge::Entity {
            name: text,
            attributes: BTreeMap::new(),
        },
        MemoryKind::Meeting => Knowledge::Meeting {
            subject: text.clone(),
            attendees: Vec::new(),
            notes: text,
        },
        MemoryKind::Conversation => Knowledge::Conversation { digest: text },
        MemoryKind::Feedback => Knowledge::Feedback {
            verdict: "noted".to_string(),
            detail: text,
        },
        MemoryKind::Note => Knowledge::Note { text },
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(cli.json, level);

    let store = SurrealStore::connect(&cli.db)
        .await
        .with_context(|| format!("failed to open database at {}", cli.db))?;
    let engine = MemoryEngine::new(
        Arc::new(store),
        Arc::new(memoria_store::HashEmbedder::default()),
        EngineConfig::default(),
    );

    match cli.command {
        Commands::Add {
            kind,
            summary,
            knowledge,
            confidence,
            importance,
            tag,
            link,
        } => {
            let kind = parse_kind(&kind)?;
            let knowledge = match knowledge {
                Some(raw) => {
                    serde_json::from_str(&raw).context("invalid knowledge payload JSON")?
                }
                None => default_knowledge(kind, &summary),
            };

            let mut new = NewMemory::new(kind, summary, knowledge)
                .with_importance(parse_importance(&importance)?)
                .with_tags(tag);
            if let Some(confidence) = confidence {
                new = new.with_confidence(confidence);
            }
            for entry in link {
                let (id, relation) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow!("link must be id=relation, got {entry}"))?;
                new = new.with_link(MemoryId::from(id), parse_relation(relation)?);
            }

            let outcome = engine.add(new).await?;
            print_json(&serde_json::json!({
                "memory": outcome.memory,
                "contradictions": outcome.contradictions,
            }))?;
        }

        Commands::Get { id } => match engine.get(&MemoryId::from(id.as_str())).await? {
            Some(memory) => print_json(&memory)?,
            None => {
                println!("{}", serde_json::json!({ "found": false }));
            }
        },

        Commands::List {
            kind,
            tag,
            include_deleted,
            cursor,
            limit,
        } => {
            let mut filter = ListFilter::all();
            if let Some(kind) = kind {
                filter = filter.with_kind(parse_kind(&kind)?);
            }
            if let Some(tag) = tag {
                filter = filter.with_tag(&tag);
            }
            if include_deleted {
                filter = filter.including_deleted();
            }
            let page = engine.list(&filter, cursor, limit).await?;
            print_json(&serde_json::json!({
                "memories": page.memories,
                "next_cursor": page.next_cursor,
            }))?;
        }

        Commands::Search {
            query,
            kind,
            min_confidence,
            limit,
        } => {
            let kinds = kind
                .iter()
                .map(|k| parse_kind(k))
                .collect::<Result<Vec<_>>>()?;
            let mut request = SearchRequest::new(query).with_kinds(kinds).with_limit(limit);
            if let Some(floor) = min_confidence {
                request = request.with_min_confidence(floor);
            }
            let hits = engine.search(&request).await?;
            print_json(
                &hits
                    .iter()
                    .map(|h| {
                        serde_json::json!({
                            "id": h.memory.id,
                            "summary": h.memory.summary,
                            "kind": h.memory.kind,
                            "score": h.score,
                        })
                    })
                    .collect::<Vec<_>>(),
            )?;
        }

        Commands::Retrieve {
            focus,
            intent,
            max_tokens,
            compression,
            session,
        } => {
            let intent: Intent = intent.parse().map_err(|i| anyhow!("unknown intent: {i}"))?;
            let compression = CompressionLevel::from_level(compression)
                .ok_or_else(|| anyhow!("compression must be 0-3"))?;
            let result = engine
                .retrieve(&RetrieveRequest {
                    intent,
                    focus,
                    max_tokens,
                    compression,
                    session_id: session,
                })
                .await?;
            print_json(&result)?;
        }

        Commands::Feedback { id, action, summary } => {
            let action: FeedbackAction = action
                .parse()
                .map_err(|a| anyhow!("unknown feedback action: {a}"))?;
            let memory = engine
                .feedback(&MemoryId::from(id.as_str()), action, summary)
                .await?;
            print_json(&memory)?;
        }

        Commands::Learn {
            original,
            correction,
            tag,
            related,
        } => {
            let outcome = engine
                .learn(&CorrectionRequest {
                    original,
                    correction,
                    corrected_artifact: None,
                    context_tags: tag,
                    related_memories: related
                        .iter()
                        .map(|id| MemoryId::from(id.as_str()))
                        .collect(),
                })
                .await?;
            print_json(&outcome)?;
        }

        Commands::Validate {
            scope,
            no_heal,
            remove_invalid,
            min_confidence,
        } => {
            let scope: ValidationScope = scope
                .parse()
                .map_err(|s| anyhow!("unknown validation scope: {s}"))?;
            let stats = engine
                .validate(&ValidationOptions {
                    scope,
                    auto_heal: !no_heal,
                    remove_invalid,
                    min_confidence,
                })
                .await?;
            print_json(&stats)?;
        }

        Commands::Consolidate {
            min_episodes,
            similarity_threshold,
            dry_run,
        } => {
            let stats = engine
                .consolidate(&ConsolidationOptions {
                    min_episodes,
                    similarity_threshold,
                    dry_run,
                })
                .await?;
            print_json(&stats)?;
        }

        Commands::Explain { id, depth } => {
            let narrative = engine.explain(&MemoryId::from(id.as_str()), depth).await?;
            print_json(&narrative)?;
        }

        Commands::Graph {
            id,
            direction,
            depth,
        } => {
            let direction: Direction = direction
                .parse()
                .map_err(|d| anyhow!("unknown direction: {d}"))?;
            let nodes = engine
                .traverse(&MemoryId::from(id.as_str()), direction, depth)
                .await?;
            print_json(&nodes)?;
        }

        Commands::Predict {
            tag,
            focus,
            intent,
            recent,
            limit,
        } => {
            let intent: Intent = intent.parse().map_err(|i| anyhow!("unknown intent: {i}"))?;
            let predictions = engine
                .predict(&PredictRequest {
                    active_tags: tag,
                    focus,
                    intent,
                    recent_memory_ids: recent
                        .iter()
                        .map(|id| MemoryId::from(id.as_str()))
                        .collect(),
                    limit,
                })
                .await?;
            print_json(
                &predictions
                    .iter()
                    .map(|p| {
                        serde_json::json!({
                            "id": p.memory.id,
                            "summary": p.memory.summary,
                            "score": p.score,
                            "reason": p.reason,
                        })
                    })
                    .collect::<Vec<_>>(),
            )?;
        }

        Commands::Status => {
            let status = engine.status().await?;
            print_json(&status)?;
        }

        Commands::Delete { id } => {
            engine.delete(&MemoryId::from(id.as_str())).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
    }

    Ok(())
}
