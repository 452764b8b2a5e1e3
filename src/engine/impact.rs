//! Impact analyzer.
//!
//! Diffs two propagated graphs: the tracked outputs (CO₂ and AQI) get an
//! absolute and a percentage change, and every derived node present in both
//! graphs is ranked by the magnitude of its percentage change.
//!
//! Both inputs must already be propagated; raw mutated graphs carry stale
//! values.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Condition;
use crate::graph::baseline::{AQI_NODE, CO2_NODE};
use crate::graph::CausalGraph;

/// Default length of [`CascadeAnalysis::most_affected_nodes`].
pub const DEFAULT_TOP_N: usize = 10;

/// Ids of the output nodes reported in an [`Impact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOutputs {
    pub co2: String,
    pub aqi: String,
}

impl Default for TrackedOutputs {
    fn default() -> Self {
        Self {
            co2: CO2_NODE.to_string(),
            aqi: AQI_NODE.to_string(),
        }
    }
}

/// Before/after comparison of one output node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputImpact {
    pub baseline: f64,
    pub post_policy: f64,
    pub change_pct: f64,
    pub change_absolute: f64,
}

/// Counts and mean over every compared node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeSummary {
    pub nodes_with_reduction: usize,
    pub nodes_with_increase: usize,
    pub avg_change_pct: f64,
}

/// Ranked per-node changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeAnalysis {
    /// `(node_id, change_pct)` ordered by `|change_pct|` descending.
    pub most_affected_nodes: Vec<(String, f64)>,
    pub summary: CascadeSummary,
}

/// Result of comparing a baseline graph with a post-policy graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub co2: OutputImpact,
    pub aqi: OutputImpact,
    pub cascade_analysis: CascadeAnalysis,
    /// Zero-baseline nodes whose percentage change was reported as 0.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Percentage change from `baseline` to `post`, `None` when the baseline is 0.
#[inline]
pub fn change_pct(baseline: f64, post: f64) -> Option<f64> {
    if baseline == 0.0 {
        None
    } else {
        Some((post - baseline) * 100.0 / baseline)
    }
}

/// Analyze with the default cascade length.
pub fn analyze(baseline: &CausalGraph, post: &CausalGraph, tracked: &TrackedOutputs) -> Impact {
    analyze_top(baseline, post, tracked, DEFAULT_TOP_N)
}

/// Diff two propagated graphs, keeping the `top_n` most affected nodes.
pub fn analyze_top(
    baseline: &CausalGraph,
    post: &CausalGraph,
    tracked: &TrackedOutputs,
    top_n: usize,
) -> Impact {
    let mut conditions = Vec::new();

    let co2 = output_impact(baseline, post, &tracked.co2, &mut conditions);
    let aqi = output_impact(baseline, post, &tracked.aqi, &mut conditions);

    let mut changes: Vec<(String, f64)> = Vec::new();
    for node in baseline.nodes().iter().filter(|n| n.kind.is_derived()) {
        let Some(after) = post.node(&node.id) else {
            continue;
        };
        let pct = match change_pct(node.value, after.value) {
            Some(pct) => pct,
            None => {
                record_undefined(&node.id, &mut conditions);
                0.0
            }
        };
        changes.push((node.id.clone(), pct));
    }

    let compared = changes.len();
    let nodes_with_reduction = changes.iter().filter(|(_, pct)| *pct < 0.0).count();
    let nodes_with_increase = changes.iter().filter(|(_, pct)| *pct > 0.0).count();
    let avg_change_pct = if compared == 0 {
        0.0
    } else {
        changes.iter().map(|(_, pct)| pct).sum::<f64>() / compared as f64
    };

    // Stable sort keeps definition order among equal magnitudes.
    changes.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    changes.truncate(top_n);

    debug!(
        co2_change_pct = co2.change_pct,
        aqi_change_pct = aqi.change_pct,
        compared,
        reductions = nodes_with_reduction,
        increases = nodes_with_increase,
        "Impact analyzed"
    );

    Impact {
        co2,
        aqi,
        cascade_analysis: CascadeAnalysis {
            most_affected_nodes: changes,
            summary: CascadeSummary {
                nodes_with_reduction,
                nodes_with_increase,
                avg_change_pct,
            },
        },
        conditions,
    }
}

fn output_impact(
    baseline: &CausalGraph,
    post: &CausalGraph,
    node_id: &str,
    conditions: &mut Vec<Condition>,
) -> OutputImpact {
    let before = baseline.value_of(node_id);
    let after = post.value_of(node_id);
    let change_pct = change_pct(before, after).unwrap_or_else(|| {
        record_undefined(node_id, conditions);
        0.0
    });
    OutputImpact {
        baseline: before,
        post_policy: after,
        change_pct,
        change_absolute: after - before,
    }
}

fn record_undefined(node_id: &str, conditions: &mut Vec<Condition>) {
    let condition = Condition::UndefinedChangePct {
        node_id: node_id.to_string(),
    };
    if !conditions.contains(&condition) {
        debug!(node_id, "Zero baseline, reporting change_pct as 0");
        conditions.push(condition);
    }
}
