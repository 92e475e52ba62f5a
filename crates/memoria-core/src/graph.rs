//! Causal graph over memory ids.
//!
//! The relationship graph is directed and may contain cycles; it is held
//! as an adjacency index keyed by id, and every traversal carries an
//! explicit visited set. No algorithm here assumes a DAG or topological
//! order.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use memoria_store::{CausalLink, Memory, MemoryId, Relation};

/// Edge direction for traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Out,
    In,
    Both,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "out" => Ok(Self::Out),
            "in" => Ok(Self::In),
            "both" => Ok(Self::Both),
            other => Err(other.to_string()),
        }
    }
}

/// One visited node of a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalNode {
    pub id: MemoryId,
    /// Relation of the edge that reached this node.
    pub relation: Relation,
    pub depth: usize,
    /// Ids from the start node to this node, inclusive.
    pub path: Vec<MemoryId>,
}

/// Adjacency index over the stored causal links.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    out_edges: HashMap<String, Vec<CausalLink>>,
    in_edges: HashMap<String, Vec<CausalLink>>,
}

impl CausalGraph {
    /// Build the index from a link set.
    pub fn from_links(links: Vec<CausalLink>) -> Self {
        let mut graph = Self::default();
        for link in links {
            graph
                .out_edges
                .entry(link.source_id.0.clone())
                .or_default()
                .push(link.clone());
            graph
                .in_edges
                .entry(link.target_id.0.clone())
                .or_default()
                .push(link);
        }
        // Deterministic neighbor order regardless of storage order.
        for edges in graph.out_edges.values_mut() {
            edges.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.target_id.cmp(&b.target_id))
            });
        }
        for edges in graph.in_edges.values_mut() {
            edges.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.source_id.cmp(&b.source_id))
            });
        }
        graph
    }

    /// Neighbors reachable over one hop in `direction`. Each entry is the
    /// neighbor id plus the traversed link.
    fn neighbors<'a>(
        &'a self,
        id: &str,
        direction: Direction,
    ) -> Vec<(&'a str, &'a CausalLink)> {
        let mut result: Vec<(&str, &CausalLink)> = Vec::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            if let Some(edges) = self.out_edges.get(id) {
                result.extend(edges.iter().map(|l| (l.target_id.0.as_str(), l)));
            }
        }
        if matches!(direction, Direction::In | Direction::Both) {
            if let Some(edges) = self.in_edges.get(id) {
                result.extend(edges.iter().map(|l| (l.source_id.0.as_str(), l)));
            }
        }
        result
    }

    /// Breadth-first traversal from `start`, bounded by `max_depth`.
    ///
    /// Cycle-safe: each id is visited at most once. The start node itself
    /// is not reported.
    pub fn traverse(
        &self,
        start: &MemoryId,
        direction: Direction,
        max_depth: usize,
    ) -> Vec<TraversalNode> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.0.clone());

        let mut result = Vec::new();
        let mut queue: VecDeque<(String, usize, Vec<MemoryId>)> = VecDeque::new();
        queue.push_back((start.0.clone(), 0, vec![start.clone()]));

        while let Some((current, depth, path)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (neighbor, link) in self.neighbors(&current, direction) {
                if !visited.insert(neighbor.to_string()) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(MemoryId(neighbor.to_string()));
                result.push(TraversalNode {
                    id: MemoryId(neighbor.to_string()),
                    relation: link.relation,
                    depth: depth + 1,
                    path: next_path.clone(),
                });
                queue.push_back((neighbor.to_string(), depth + 1, next_path));
            }
        }
        result
    }

    /// Traversal restricted to a relation subset. Used by contradiction
    /// propagation (`supports`/`derived_from` only).
    pub fn traverse_relations(
        &self,
        start: &MemoryId,
        direction: Direction,
        max_depth: usize,
        relations: &[Relation],
    ) -> Vec<TraversalNode> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.0.clone());

        let mut result = Vec::new();
        let mut queue: VecDeque<(String, usize, Vec<MemoryId>)> = VecDeque::new();
        queue.push_back((start.0.clone(), 0, vec![start.clone()]));

        while let Some((current, depth, path)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (neighbor, link) in self.neighbors(&current, direction) {
                if !relations.contains(&link.relation) {
                    continue;
                }
                if !visited.insert(neighbor.to_string()) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(MemoryId(neighbor.to_string()));
                result.push(TraversalNode {
                    id: MemoryId(neighbor.to_string()),
                    relation: link.relation,
                    depth: depth + 1,
                    path: next_path.clone(),
                });
                queue.push_back((neighbor.to_string(), depth + 1, next_path));
            }
        }
        result
    }

    /// Shortest hop distance between two ids within `max_depth`, ignoring
    /// edge direction. `None` when unreachable.
    pub fn distance(&self, from: &MemoryId, to: &MemoryId, max_depth: usize) -> Option<usize> {
        if from == to {
            return Some(0);
        }
        self.traverse(from, Direction::Both, max_depth)
            .into_iter()
            .find(|n| n.id == *to)
            .map(|n| n.depth)
    }
}

/// Causal narrative for one memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub memory_id: MemoryId,
    pub sentences: Vec<String>,
}

impl std::fmt::Display for Narrative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sentences.join(" "))
    }
}

fn label(memories: &HashMap<String, Memory>, id: &MemoryId) -> String {
    memories
        .get(&id.0)
        .map(|m| m.summary.clone())
        .unwrap_or_else(|| id.0.clone())
}

/// Render the causal history of `start` as one sentence per hop.
///
/// Walks `derived_from`/`supersedes` edges outward from the memory (its
/// ancestry), orders hops chronologically by link creation time, and is
/// deterministic: repeated calls on unchanged data produce identical text.
pub fn explain(
    graph: &CausalGraph,
    memories: &HashMap<String, Memory>,
    start: &MemoryId,
    max_depth: usize,
) -> Narrative {
    let mut hops: Vec<&CausalLink> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.0.clone());

    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((start.0.clone(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        if let Some(edges) = graph.out_edges.get(&current) {
            for link in edges {
                if !matches!(link.relation, Relation::DerivedFrom | Relation::Supersedes) {
                    continue;
                }
                hops.push(link);
                if visited.insert(link.target_id.0.clone()) {
                    queue.push_back((link.target_id.0.clone(), depth + 1));
                }
            }
        }
    }

    // Chronological order, stable tie-break on the edge key.
    hops.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| a.target_id.cmp(&b.target_id))
    });

    let sentences = if hops.is_empty() {
        vec![format!("\"{}\" has no recorded causal history.", label(memories, start))]
    } else {
        hops.iter()
            .map(|link| match link.relation {
                Relation::Supersedes => format!(
                    "\"{}\" supersedes \"{}\".",
                    label(memories, &link.source_id),
                    label(memories, &link.target_id)
                ),
                _ => format!(
                    "\"{}\" exists because of \"{}\".",
                    label(memories, &link.source_id),
                    label(memories, &link.target_id)
                ),
            })
            .collect()
    };

    Narrative {
        memory_id: start.clone(),
        sentences,
    }
}
