//! Flow-document wire format.
//!
//! Graph editors and the external policy service exchange graphs as
//! `{nodes: [{id, data: {...}}], edges: [{id, source, target, data: {weight}}]}`.
//! Missing fields fall back to the same defaults the service uses: weight
//! 0.5, enabled true, type intermediate, value 0.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use super::{CausalGraph, Edge, Node, NodeKind};
use crate::error::{GraphError, GraphResult};

/// Graph in flow-document form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

/// Node wrapper with its payload under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(default)]
    pub data: FlowNodeData,
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNodeData {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: NodeKind,
}

/// Edge wrapper with its payload under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub data: FlowEdgeData,
}

/// Edge payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdgeData {
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_kind() -> NodeKind {
    NodeKind::Intermediate
}

fn default_weight() -> f64 {
    0.5
}

impl Default for FlowNodeData {
    fn default() -> Self {
        Self {
            label: String::new(),
            value: 0.0,
            enabled: default_enabled(),
            kind: default_kind(),
        }
    }
}

impl Default for FlowEdgeData {
    fn default() -> Self {
        Self {
            weight: default_weight(),
        }
    }
}

impl From<&CausalGraph> for FlowGraph {
    fn from(graph: &CausalGraph) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|n| FlowNode {
                id: n.id.clone(),
                data: FlowNodeData {
                    label: n.label.clone(),
                    value: n.value,
                    enabled: n.enabled,
                    kind: n.kind,
                },
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .map(|e| FlowEdge {
                id: Some(e.id.clone()),
                source: e.source.clone(),
                target: e.target.clone(),
                data: FlowEdgeData { weight: e.weight },
            })
            .collect();
        FlowGraph { nodes, edges }
    }
}

impl From<FlowGraph> for CausalGraph {
    fn from(flow: FlowGraph) -> Self {
        let nodes = flow
            .nodes
            .into_iter()
            .map(|n| Node {
                label: if n.data.label.is_empty() {
                    n.id.clone()
                } else {
                    n.data.label
                },
                id: n.id,
                kind: n.data.kind,
                enabled: n.data.enabled,
                value: n.data.value,
            })
            .collect();
        let edges = flow
            .edges
            .into_iter()
            .map(|e| {
                let id = e
                    .id
                    .unwrap_or_else(|| format!("{}->{}", e.source, e.target));
                Edge::new(id, e.source, e.target, e.data.weight)
            })
            .collect();
        CausalGraph::new(nodes, edges)
    }
}

/// Load a flow-document graph from a JSON file.
pub fn load_graph_file(path: &Path) -> GraphResult<CausalGraph> {
    let raw = std::fs::read_to_string(path).map_err(|e| GraphError::Load {
        message: format!("{}: {}", path.display(), e),
    })?;
    let flow: FlowGraph = serde_json::from_str(&raw)?;
    let graph = CausalGraph::from(flow);

    let diag = graph.diagnostics();
    if !diag.dangling_edges.is_empty() {
        warn!(
            path = %path.display(),
            dangling = ?diag.dangling_edges,
            "Baseline graph has edges referencing undefined nodes"
        );
    }
    info!(
        path = %path.display(),
        nodes = diag.node_count,
        edges = diag.edge_count,
        "Baseline graph loaded"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flow_defaults() {
        let flow: FlowGraph = serde_json::from_value(json!({
            "nodes": [
                {"id": "a", "data": {"label": "A", "value": 80, "type": "sector"}},
                {"id": "b"}
            ],
            "edges": [
                {"source": "a", "target": "b"}
            ]
        }))
        .unwrap();

        let graph = CausalGraph::from(flow);
        let b = graph.node("b").unwrap();
        assert_eq!(b.kind, NodeKind::Intermediate);
        assert!(b.enabled);
        assert_eq!(b.label, "b");

        let edge = graph.edge("a", "b").unwrap();
        assert_eq!(edge.weight, 0.5);
        assert_eq!(edge.id, "a->b");
    }

    #[test]
    fn test_flow_conversion_preserves_graph() {
        let graph = crate::graph::baseline::baseline_graph();
        let flow = FlowGraph::from(&graph);
        assert_eq!(flow.nodes[0].data.kind, NodeKind::Sector);
        assert_eq!(CausalGraph::from(flow), graph);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_graph_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(GraphError::Load { .. })));
    }
}
