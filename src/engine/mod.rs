//! Simulation engine: propagation, policy mutation and impact analysis.
//!
//! All three stages are synchronous, side-effect-free functions over an
//! explicit [`CausalGraph`](crate::graph::CausalGraph) value.

mod impact;
mod mutation;
mod propagation;

pub use impact::*;
pub use mutation::*;
pub use propagation::*;

use crate::config::SimulationConfig;
use crate::graph::CausalGraph;

/// Engine parameters bundled for callers that run the full pipeline.
#[derive(Debug, Clone)]
pub struct Simulator {
    rounds: usize,
    tracked: TrackedOutputs,
    top_n: usize,
}

/// Output of [`Simulator::evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Propagated post-policy graph.
    pub post_policy_graph: CausalGraph,
    pub impact: Impact,
    pub applied: Vec<MutationRecord>,
}

impl Simulator {
    /// Build a simulator from configuration.
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            rounds: config.rounds,
            tracked: TrackedOutputs {
                co2: config.co2_node.clone(),
                aqi: config.aqi_node.clone(),
            },
            top_n: config.cascade_top_n,
        }
    }

    /// Propagation rounds in use.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Tracked output ids in use.
    pub fn tracked(&self) -> &TrackedOutputs {
        &self.tracked
    }

    /// Propagate with the configured round count.
    pub fn propagate(&self, graph: &CausalGraph) -> CausalGraph {
        propagate_rounds(graph, self.rounds)
    }

    /// Apply `policy` to `baseline`, propagate both sides and diff them.
    ///
    /// Skipped mutations end up in `impact.conditions` next to any
    /// zero-baseline conditions.
    pub fn evaluate(&self, baseline: &CausalGraph, policy: &Policy) -> Evaluation {
        let before = self.propagate(baseline);
        let outcome = apply(baseline, policy);
        let after = self.propagate(&outcome.graph);

        let mut impact = analyze_top(&before, &after, &self.tracked, self.top_n);
        let mut conditions = outcome.conditions;
        conditions.append(&mut impact.conditions);
        impact.conditions = conditions;

        Evaluation {
            post_policy_graph: after,
            impact,
            applied: outcome.applied,
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(&SimulationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Condition;
    use crate::graph::baseline::baseline_graph;

    #[test]
    fn test_evaluate_merges_conditions() {
        let policy = Policy::new("p", "P")
            .with_mutation(Mutation::DisableNode {
                node_id: "transport".to_string(),
                reason: String::new(),
            })
            .with_mutation(Mutation::DisableNode {
                node_id: "ghost".to_string(),
                reason: String::new(),
            });

        let evaluation = Simulator::default().evaluate(&baseline_graph(), &policy);

        assert_eq!(evaluation.applied.len(), 1);
        assert_eq!(
            evaluation.impact.conditions[0],
            Condition::NodeNotFound {
                node_id: "ghost".to_string()
            }
        );
        assert_eq!(evaluation.impact.co2.post_policy, 0.0);
        assert!((evaluation.impact.co2.change_pct + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_simulator_respects_rounds() {
        let config = SimulationConfig {
            rounds: 1,
            ..SimulationConfig::default()
        };
        let graph = Simulator::new(&config).propagate(&baseline_graph());
        assert_eq!(graph.value_of("co2"), 0.0);
        assert!(graph.value_of("vehicle-emissions") > 0.0);
    }
}
