//! Policies, mutations and the mutation applier.
//!
//! A [`Policy`] carries an ordered list of [`Mutation`]s. Applying it is
//! best-effort: each mutation either lands or is skipped with a recorded
//! [`Condition`], and later mutations touching the same edge or node win.
//! The caller's graph is never modified; [`apply`] returns a new one.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::Condition;
use crate::graph::{clamp_weight, CausalGraph};
use crate::policy::GraphContext;

/// A single atomic edit to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    /// Lower the weight of the `source → target` edge.
    ReduceEdgeWeight {
        source: String,
        target: String,
        new_weight: f64,
        #[serde(default)]
        reason: String,
    },
    /// Raise the weight of the `source → target` edge.
    IncreaseEdgeWeight {
        source: String,
        target: String,
        new_weight: f64,
        #[serde(default)]
        reason: String,
    },
    /// Switch a node off.
    DisableNode {
        node_id: String,
        #[serde(default)]
        reason: String,
    },
    /// Switch a node back on.
    EnableNode {
        node_id: String,
        #[serde(default)]
        reason: String,
    },
}

impl Mutation {
    /// Stable snake_case name of the mutation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::ReduceEdgeWeight { .. } => "reduce_edge_weight",
            Mutation::IncreaseEdgeWeight { .. } => "increase_edge_weight",
            Mutation::DisableNode { .. } => "disable_node",
            Mutation::EnableNode { .. } => "enable_node",
        }
    }

    /// Why the policy author wants this mutation.
    pub fn reason(&self) -> &str {
        match self {
            Mutation::ReduceEdgeWeight { reason, .. }
            | Mutation::IncreaseEdgeWeight { reason, .. }
            | Mutation::DisableNode { reason, .. }
            | Mutation::EnableNode { reason, .. } => reason,
        }
    }
}

/// Policy author's own estimate of the effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedImpacts {
    #[serde(default)]
    pub co2_reduction_pct: f64,
    #[serde(default)]
    pub aqi_improvement_pct: f64,
    #[serde(default = "default_impact_confidence")]
    pub confidence: f64,
}

fn default_impact_confidence() -> f64 {
    0.7
}

impl Default for EstimatedImpacts {
    fn default() -> Self {
        Self {
            co2_reduction_pct: 0.0,
            aqi_improvement_pct: 0.0,
            confidence: default_impact_confidence(),
        }
    }
}

/// A side effect of implementing the policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOff {
    pub sector: String,
    /// positive | negative | neutral
    pub impact: String,
    /// mild | moderate | strong
    pub magnitude: String,
    pub description: String,
}

impl TradeOff {
    /// Trade-off described only in prose.
    pub fn general(description: impl Into<String>) -> Self {
        Self {
            sector: general_sector(),
            impact: neutral_impact(),
            magnitude: mild_magnitude(),
            description: description.into(),
        }
    }
}

#[derive(Deserialize)]
struct TradeOffFields {
    #[serde(default = "general_sector")]
    sector: String,
    #[serde(default = "neutral_impact")]
    impact: String,
    #[serde(default = "mild_magnitude")]
    magnitude: String,
    #[serde(default)]
    description: String,
}

// Generators sometimes emit bare strings instead of trade-off objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum TradeOffRepr {
    Text(String),
    Fields(TradeOffFields),
}

fn general_sector() -> String {
    "general".to_string()
}

fn neutral_impact() -> String {
    "neutral".to_string()
}

fn mild_magnitude() -> String {
    "mild".to_string()
}

impl<'de> Deserialize<'de> for TradeOff {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match TradeOffRepr::deserialize(deserializer)? {
            TradeOffRepr::Text(text) => TradeOff::general(text),
            TradeOffRepr::Fields(f) => TradeOff {
                sector: f.sector,
                impact: f.impact,
                magnitude: f.magnitude,
                description: f.description,
            },
        })
    }
}

/// Research evidence backing a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResearch {
    #[serde(default)]
    pub paper_ids: Vec<String>,
    #[serde(default)]
    pub key_quotes: Vec<String>,
    #[serde(default = "default_research_confidence")]
    pub confidence: f64,
}

fn default_research_confidence() -> f64 {
    0.8
}

impl Default for SourceResearch {
    fn default() -> Self {
        Self {
            paper_ids: Vec::new(),
            key_quotes: Vec::new(),
            confidence: default_research_confidence(),
        }
    }
}

/// A named, reasoned bundle of graph mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(rename = "policy_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub mutations: Vec<Mutation>,
    #[serde(default)]
    pub estimated_impacts: EstimatedImpacts,
    #[serde(default)]
    pub trade_offs: Vec<TradeOff>,
    #[serde(default)]
    pub source_research: SourceResearch,
}

impl Policy {
    /// Create a policy with no mutations.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            mutations: Vec::new(),
            estimated_impacts: EstimatedImpacts::default(),
            trade_offs: Vec::new(),
            source_research: SourceResearch::default(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a mutation.
    pub fn with_mutation(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// List mutations that would not land cleanly on a graph with this
    /// context. Application stays best-effort; this is for early warnings.
    pub fn check_against(&self, context: &GraphContext) -> Vec<String> {
        let mut issues = Vec::new();
        for (idx, mutation) in self.mutations.iter().enumerate() {
            match mutation {
                Mutation::ReduceEdgeWeight {
                    source,
                    target,
                    new_weight,
                    ..
                }
                | Mutation::IncreaseEdgeWeight {
                    source,
                    target,
                    new_weight,
                    ..
                } => {
                    if !context.has_edge(source, target) {
                        issues.push(format!("mutation {}: unknown edge {} -> {}", idx, source, target));
                    }
                    if !(0.0..=1.0).contains(new_weight) {
                        issues.push(format!(
                            "mutation {}: weight {} outside [0, 1] will be clamped",
                            idx, new_weight
                        ));
                    }
                }
                Mutation::DisableNode { node_id, .. } | Mutation::EnableNode { node_id, .. } => {
                    if !context.has_node(node_id) {
                        issues.push(format!("mutation {}: unknown node {}", idx, node_id));
                    }
                }
            }
        }
        issues
    }
}

/// Before/after record for one mutation that landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub before: MutationState,
    pub after: MutationState,
}

/// The piece of graph state a mutation touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MutationState {
    Edge {
        source: String,
        target: String,
        weight: f64,
    },
    Node {
        id: String,
        enabled: bool,
    },
}

/// Result of applying a policy.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// The mutated graph. Values are not re-propagated.
    pub graph: CausalGraph,
    /// Audit trail of mutations that landed, in order.
    pub applied: Vec<MutationRecord>,
    /// Mutations that were skipped.
    pub conditions: Vec<Condition>,
}

/// Apply every mutation of `policy` to a copy of `graph`.
pub fn apply(graph: &CausalGraph, policy: &Policy) -> ApplyOutcome {
    let mut next = graph.clone();
    let mut applied = Vec::with_capacity(policy.mutations.len());
    let mut conditions = Vec::new();

    for mutation in &policy.mutations {
        match apply_one(&mut next, mutation) {
            Ok(record) => {
                debug!(
                    policy = %policy.id,
                    mutation = mutation.kind(),
                    before = ?record.before,
                    after = ?record.after,
                    "Mutation applied"
                );
                applied.push(record);
            }
            Err(condition) => {
                warn!(
                    policy = %policy.id,
                    mutation = mutation.kind(),
                    condition = %condition,
                    "Mutation skipped"
                );
                conditions.push(condition);
            }
        }
    }

    ApplyOutcome {
        graph: next,
        applied,
        conditions,
    }
}

fn apply_one(graph: &mut CausalGraph, mutation: &Mutation) -> Result<MutationRecord, Condition> {
    match mutation {
        Mutation::ReduceEdgeWeight {
            source,
            target,
            new_weight,
            ..
        }
        | Mutation::IncreaseEdgeWeight {
            source,
            target,
            new_weight,
            ..
        } => {
            let edge = graph
                .edge_mut(source, target)
                .ok_or_else(|| Condition::EdgeNotFound {
                    source: source.clone(),
                    target: target.clone(),
                })?;
            let before = edge.weight;
            edge.weight = clamp_weight(*new_weight);
            Ok(MutationRecord {
                kind: mutation.kind().to_string(),
                before: MutationState::Edge {
                    source: source.clone(),
                    target: target.clone(),
                    weight: before,
                },
                after: MutationState::Edge {
                    source: source.clone(),
                    target: target.clone(),
                    weight: edge.weight,
                },
            })
        }
        Mutation::DisableNode { node_id, .. } | Mutation::EnableNode { node_id, .. } => {
            let enable = matches!(mutation, Mutation::EnableNode { .. });
            let node = graph
                .node_mut(node_id)
                .ok_or_else(|| Condition::NodeNotFound {
                    node_id: node_id.clone(),
                })?;
            let before = node.enabled;
            node.enabled = enable;
            Ok(MutationRecord {
                kind: mutation.kind().to_string(),
                before: MutationState::Node {
                    id: node_id.clone(),
                    enabled: before,
                },
                after: MutationState::Node {
                    id: node_id.clone(),
                    enabled: enable,
                },
            })
        }
    }
}
