//! Causal graph model.
//!
//! Nodes and edges live in flat vectors addressed by stable string ids, with
//! a side index from node id to arena position. Nothing here assumes a
//! topological order: the shipped topology contains cycles (several derived
//! nodes feed back into sector nodes) and the propagation engine treats the
//! graph as a plain edge list.
//!
//! Every mutator on [`CausalGraph`] is copy-on-write: it returns a new graph
//! and leaves `self` untouched, so before/after snapshots can always be
//! diffed safely.

pub mod baseline;
pub mod wire;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{GraphError, GraphResult};

/// Inclusive upper bound of a sector activity level.
pub const MAX_ACTIVITY: f64 = 100.0;

/// Role of a node in the causal graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Exogenous activity level, set only by the caller.
    Sector,
    /// Derived throughput between sectors and outputs.
    Intermediate,
    /// Derived throughput tracked by impact analysis (CO2, AQI).
    Output,
}

impl NodeKind {
    /// Whether propagation recomputes this node's value.
    #[inline]
    pub fn is_derived(self) -> bool {
        !matches!(self, NodeKind::Sector)
    }
}

/// A node in the causal graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub enabled: bool,
    pub value: f64,
}

impl Node {
    /// Create an enabled sector node with the given activity level.
    pub fn sector(id: impl Into<String>, label: impl Into<String>, activity: f64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Sector,
            enabled: true,
            value: activity,
        }
    }

    /// Create an enabled intermediate node with zero throughput.
    pub fn intermediate(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Intermediate,
            enabled: true,
            value: 0.0,
        }
    }

    /// Create an enabled output node with zero throughput.
    pub fn output(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Output,
            enabled: true,
            value: 0.0,
        }
    }

    /// Builder-style enable flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A directed, weighted edge. The weight is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub weight: f64,
}

impl Edge {
    /// Create an edge, clamping the weight into `[0, 1]`.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            weight: clamp_weight(weight),
        }
    }
}

/// Clamp a weight into `[0, 1]`. NaN collapses to 0.
#[inline]
pub fn clamp_weight(weight: f64) -> f64 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}

/// The causal graph: node/edge arenas plus an id index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "GraphParts", into = "GraphParts")]
pub struct CausalGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct GraphParts {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl From<GraphParts> for CausalGraph {
    fn from(parts: GraphParts) -> Self {
        CausalGraph::new(parts.nodes, parts.edges)
    }
}

impl From<CausalGraph> for GraphParts {
    fn from(graph: CausalGraph) -> Self {
        GraphParts {
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}

impl PartialEq for CausalGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }
}

impl CausalGraph {
    /// Build a graph. Weights are clamped; when a node id repeats, the
    /// first occurrence is the one addressed by id.
    pub fn new(nodes: Vec<Node>, mut edges: Vec<Edge>) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            index.entry(node.id.clone()).or_insert(pos);
        }
        for edge in &mut edges {
            edge.weight = clamp_weight(edge.weight);
        }
        Self {
            nodes,
            edges,
            index,
        }
    }

    /// All nodes in definition order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges in definition order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Arena position of a node.
    #[inline]
    pub fn position(&self, node_id: &str) -> Option<usize> {
        self.index.get(node_id).copied()
    }

    /// Look up a node by id.
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.position(node_id).map(|pos| &self.nodes[pos])
    }

    pub(crate) fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        match self.position(node_id) {
            Some(pos) => Some(&mut self.nodes[pos]),
            None => None,
        }
    }

    /// Value of a node, or 0 when the id is unknown.
    pub fn value_of(&self, node_id: &str) -> f64 {
        self.node(node_id).map(|n| n.value).unwrap_or(0.0)
    }

    /// Look up the first edge from `source` to `target`.
    pub fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    pub(crate) fn edge_mut(&mut self, source: &str, target: &str) -> Option<&mut Edge> {
        self.edges
            .iter_mut()
            .find(|e| e.source == source && e.target == target)
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Return a copy with the sector's activity level set to `value`.
    pub fn set_sector_activity(&self, node_id: &str, value: f64) -> GraphResult<CausalGraph> {
        let node = self.node(node_id).ok_or_else(|| GraphError::NodeNotFound {
            node_id: node_id.to_string(),
        })?;
        if node.kind != NodeKind::Sector {
            return Err(GraphError::NotASector {
                node_id: node_id.to_string(),
            });
        }
        if !(0.0..=MAX_ACTIVITY).contains(&value) {
            return Err(GraphError::ActivityOutOfRange {
                node_id: node_id.to_string(),
                value,
            });
        }

        let mut next = self.clone();
        if let Some(node) = next.node_mut(node_id) {
            node.value = value;
        }
        Ok(next)
    }

    /// Return a copy with the node's `enabled` flag flipped.
    pub fn toggle_node(&self, node_id: &str) -> GraphResult<CausalGraph> {
        let mut next = self.clone();
        let node = next.node_mut(node_id).ok_or_else(|| GraphError::NodeNotFound {
            node_id: node_id.to_string(),
        })?;
        node.enabled = !node.enabled;
        Ok(next)
    }

    /// Return a copy of `self` carrying the `enabled` flags and edge weights
    /// of `other`.
    ///
    /// Node values, kinds and labels stay as they are in `self`. Fails when
    /// `other` does not have exactly the same node ids and edges, matched by
    /// edge id and then by `(source, target)`.
    pub fn with_state_from(&self, other: &CausalGraph) -> GraphResult<CausalGraph> {
        if other.nodes.len() != self.nodes.len() || other.edges.len() != self.edges.len() {
            return Err(GraphError::ShapeMismatch {
                message: format!(
                    "expected {} nodes and {} edges, got {} and {}",
                    self.nodes.len(),
                    self.edges.len(),
                    other.nodes.len(),
                    other.edges.len()
                ),
            });
        }

        let mut next = self.clone();
        for node in &mut next.nodes {
            let theirs = other.node(&node.id).ok_or_else(|| GraphError::ShapeMismatch {
                message: format!("node {} is missing", node.id),
            })?;
            node.enabled = theirs.enabled;
        }
        for edge in &mut next.edges {
            let theirs = other
                .edges
                .iter()
                .find(|e| e.id == edge.id && e.source == edge.source && e.target == edge.target)
                .or_else(|| other.edge(&edge.source, &edge.target))
                .ok_or_else(|| GraphError::ShapeMismatch {
                    message: format!("edge {} -> {} is missing", edge.source, edge.target),
                })?;
            edge.weight = clamp_weight(theirs.weight);
        }
        Ok(next)
    }

    /// Capture an immutable snapshot of the current state.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            taken_at: Utc::now(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Structural health report: dangling edges, isolated nodes, duplicate ids.
    pub fn diagnostics(&self) -> GraphDiagnostics {
        let mut seen = HashSet::new();
        let duplicate_node_ids = self
            .nodes
            .iter()
            .filter(|n| !seen.insert(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();

        let dangling_edges = self
            .edges
            .iter()
            .filter(|e| self.position(&e.source).is_none() || self.position(&e.target).is_none())
            .map(|e| e.id.clone())
            .collect();

        let referenced: HashSet<&str> = self
            .edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();
        let isolated_nodes = self
            .nodes
            .iter()
            .filter(|n| !referenced.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();

        GraphDiagnostics {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            dangling_edges,
            isolated_nodes,
            duplicate_node_ids,
        }
    }
}

/// Immutable capture of a graph at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub taken_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Rebuild a working graph from this snapshot.
    pub fn to_graph(&self) -> CausalGraph {
        CausalGraph::new(self.nodes.clone(), self.edges.clone())
    }
}

/// Output of [`CausalGraph::diagnostics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDiagnostics {
    pub node_count: usize,
    pub edge_count: usize,
    /// Edges whose source or target id is not defined.
    pub dangling_edges: Vec<String>,
    /// Nodes that no edge references.
    pub isolated_nodes: Vec<String>,
    pub duplicate_node_ids: Vec<String>,
}

impl GraphDiagnostics {
    /// True when every edge resolves and every node is connected.
    pub fn is_clean(&self) -> bool {
        self.dangling_edges.is_empty()
            && self.isolated_nodes.is_empty()
            && self.duplicate_node_ids.is_empty()
    }
}
