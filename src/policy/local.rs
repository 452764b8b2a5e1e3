use async_trait::async_trait;
use tracing::info;

use super::types::{new_snapshot_id, AppliedPolicy};
use super::PolicyApplier;
use crate::engine::{Policy, Simulator};
use crate::error::PolicyServiceResult;
use crate::graph::CausalGraph;

/// [`PolicyApplier`] backed by the embedded engine.
#[derive(Debug, Clone, Default)]
pub struct LocalApplier {
    simulator: Simulator,
}

impl LocalApplier {
    pub fn new(simulator: Simulator) -> Self {
        Self { simulator }
    }
}

#[async_trait]
impl PolicyApplier for LocalApplier {
    async fn apply(
        &self,
        policy: &Policy,
        baseline: &CausalGraph,
    ) -> PolicyServiceResult<AppliedPolicy> {
        let evaluation = self.simulator.evaluate(baseline, policy);

        info!(
            policy = %policy.id,
            applied = evaluation.applied.len(),
            skipped = evaluation.impact.conditions.len(),
            co2_change_pct = evaluation.impact.co2.change_pct,
            aqi_change_pct = evaluation.impact.aqi.change_pct,
            "Policy applied locally"
        );

        Ok(AppliedPolicy {
            snapshot_id: new_snapshot_id(),
            policy_id: policy.id.clone(),
            post_policy_graph: evaluation.post_policy_graph,
            impact: evaluation.impact,
        })
    }
}
