//! Scenario Orchestrator.
//!
//! Runs named scenarios through the policy generator and applier one at a
//! time and ranks the survivors. A failing scenario is logged and dropped;
//! the batch itself never fails.

mod presets;

pub use presets::{ScenarioPreset, ScenarioPresetRegistry};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{Impact, OutputImpact, Policy};
use crate::graph::CausalGraph;
use crate::policy::{GraphContext, PolicyApplier, PolicyGenerator};

/// A named scenario: one or more research queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub name: String,
    pub policy_queries: Vec<String>,
}

impl ScenarioRequest {
    pub fn new(name: impl Into<String>, policy_queries: Vec<String>) -> Self {
        Self {
            name: name.into(),
            policy_queries,
        }
    }
}

/// Impact of one successful scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    /// Id of the policy that was applied.
    pub policy_id: String,
    pub impact: Impact,
}

/// Scenario names with the largest absolute CO₂ and AQI change.
///
/// Sign is ignored, so the "best" scenario may be the one that worsens an
/// output the most.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub best_co2_reduction: Option<String>,
    pub best_aqi_improvement: Option<String>,
}

/// Output of [`ScenarioOrchestrator::compare`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub comparison: Vec<ScenarioResult>,
    pub ranking: Ranking,
}

/// Sequences scenarios through the policy collaborators.
#[derive(Clone)]
pub struct ScenarioOrchestrator {
    generator: Arc<dyn PolicyGenerator>,
    applier: Arc<dyn PolicyApplier>,
}

impl ScenarioOrchestrator {
    pub fn new(generator: Arc<dyn PolicyGenerator>, applier: Arc<dyn PolicyApplier>) -> Self {
        Self { generator, applier }
    }

    /// Run every scenario against `baseline`, in order.
    ///
    /// Only the first generated policy of a scenario is applied.
    pub async fn compare(&self, scenarios: &[ScenarioRequest], baseline: &CausalGraph) -> Comparison {
        let context = GraphContext::from_graph(baseline);
        let mut comparison = Vec::with_capacity(scenarios.len());

        for scenario in scenarios {
            if let Some(result) = self.run_scenario(scenario, &context, baseline).await {
                comparison.push(result);
            }
        }

        let ranking = rank(&comparison);
        info!(
            requested = scenarios.len(),
            succeeded = comparison.len(),
            best_co2 = ?ranking.best_co2_reduction,
            best_aqi = ?ranking.best_aqi_improvement,
            "Scenario comparison complete"
        );

        Comparison {
            comparison,
            ranking,
        }
    }

    /// Generate and apply one scenario.
    ///
    /// A query whose generation fails is skipped, not fatal: the scenario is
    /// dropped only when no query produced a policy. The first policy that
    /// was generated is the one applied.
    async fn run_scenario(
        &self,
        scenario: &ScenarioRequest,
        context: &GraphContext,
        baseline: &CausalGraph,
    ) -> Option<ScenarioResult> {
        let mut policies: Vec<Policy> = Vec::new();
        for query in &scenario.policy_queries {
            match self.generator.generate(query, context).await {
                Ok(policy) => policies.push(policy),
                Err(e) => {
                    warn!(
                        scenario = %scenario.name,
                        query = %query,
                        error = %e,
                        "Policy generation failed"
                    );
                }
            }
        }

        if policies.len() > 1 {
            info!(
                scenario = %scenario.name,
                ignored = policies.len() - 1,
                "Only the first generated policy is applied"
            );
        }

        let Some(policy) = policies.into_iter().next() else {
            warn!(scenario = %scenario.name, "No policy generated, scenario dropped");
            return None;
        };

        match self.applier.apply(&policy, baseline).await {
            Ok(applied) => Some(ScenarioResult {
                name: scenario.name.clone(),
                policy_id: policy.id,
                impact: applied.impact,
            }),
            Err(e) => {
                warn!(
                    scenario = %scenario.name,
                    policy = %policy.id,
                    error = %e,
                    "Policy application failed, scenario dropped"
                );
                None
            }
        }
    }
}

/// Pick the scenarios with the largest absolute CO₂ and AQI change.
/// The first scenario wins ties.
pub fn rank(results: &[ScenarioResult]) -> Ranking {
    Ranking {
        best_co2_reduction: largest_change(results, |impact| &impact.co2),
        best_aqi_improvement: largest_change(results, |impact| &impact.aqi),
    }
}

fn largest_change<F>(results: &[ScenarioResult], output: F) -> Option<String>
where
    F: Fn(&Impact) -> &OutputImpact,
{
    let mut best: Option<(&ScenarioResult, f64)> = None;
    for result in results {
        let magnitude = output(&result.impact).change_pct.abs();
        match best {
            Some((_, current)) if magnitude <= current => {}
            _ => best = Some((result, magnitude)),
        }
    }
    best.map(|(result, _)| result.name.clone())
}
