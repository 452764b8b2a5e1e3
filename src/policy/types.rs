use serde::{Deserialize, Serialize};

use crate::engine::{Impact, Policy};
use crate::graph::wire::FlowGraph;
use crate::graph::CausalGraph;

/// Compact view of the graph shared with the policy service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphContext {
    pub nodes: Vec<ContextNode>,
    pub edges: Vec<ContextEdge>,
}

/// Node as seen by the policy service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: String,
    pub enabled: bool,
    pub label: String,
}

/// Edge as seen by the policy service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

impl GraphContext {
    /// Capture the context of a graph.
    pub fn from_graph(graph: &CausalGraph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .iter()
                .map(|n| ContextNode {
                    id: n.id.clone(),
                    enabled: n.enabled,
                    label: n.label.clone(),
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|e| ContextEdge {
                    source: e.source.clone(),
                    target: e.target.clone(),
                    weight: e.weight,
                })
                .collect(),
        }
    }

    /// Whether a node with this id exists.
    pub fn has_node(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == node_id)
    }

    /// Whether an edge `source → target` exists.
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }
}

/// Request body for the generation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratePolicyRequest<'a> {
    pub research_query: &'a str,
    pub graph_context: &'a GraphContext,
}

/// Response body from the generation endpoint.
///
/// `policy` is optional here so a missing field surfaces as a malformed
/// response instead of a generic decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratePolicyResponse {
    #[serde(default)]
    pub policy: Option<Policy>,
    #[serde(default)]
    pub research_evidence: Vec<String>,
}

/// Request body for the application endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyPolicyRequest<'a> {
    pub policy: &'a Policy,
    pub graph_context: &'a GraphContext,
}

/// Response body from the application endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyPolicyResponse {
    #[serde(default)]
    pub snapshot: Option<RemoteSnapshot>,
}

/// Snapshot payload returned by the application endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSnapshot {
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub post_policy_graph: Option<FlowGraph>,
    #[serde(default)]
    pub impact: Option<Impact>,
}

/// Result of applying a policy, locally or remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedPolicy {
    pub snapshot_id: String,
    pub policy_id: String,
    pub post_policy_graph: CausalGraph,
    pub impact: Impact,
}

/// Snapshot id in the `snap-YYYYMMDD-HHMMSS-xxxxxxxx` form.
pub fn new_snapshot_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "snap-{}-{}",
        chrono::Utc::now().format("%Y%m%d-%H%M%S"),
        &uuid[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::baseline::baseline_graph;
    use serde_json::json;

    #[test]
    fn test_graph_context_from_graph() {
        let context = GraphContext::from_graph(&baseline_graph());
        assert_eq!(context.nodes.len(), 25);
        assert_eq!(context.edges.len(), 32);
        assert!(context.has_node("transport"));
        assert!(context.has_edge("transport", "vehicle-emissions"));
        assert!(!context.has_edge("vehicle-emissions", "transport"));
    }

    #[test]
    fn test_generate_request_serialization() {
        let context = GraphContext::from_graph(&baseline_graph());
        let request = GeneratePolicyRequest {
            research_query: "How did Beijing reduce transport emissions?",
            graph_context: &context,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["research_query"],
            "How did Beijing reduce transport emissions?"
        );
        assert_eq!(json["graph_context"]["edges"][0]["source"], "industries");
    }

    #[test]
    fn test_generate_response_without_policy() {
        let response: GeneratePolicyResponse =
            serde_json::from_value(json!({"status": "success"})).unwrap();
        assert!(response.policy.is_none());
    }

    #[test]
    fn test_snapshot_id_format() {
        let id = new_snapshot_id();
        assert!(id.starts_with("snap-"));
        assert_eq!(id.len(), "snap-20240101-000000-".len() + 8);
    }
}
