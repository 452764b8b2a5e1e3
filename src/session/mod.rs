//! Interactive simulation session.
//!
//! A [`Session`] owns the current graph. Every change, whether a slider
//! move, a node toggle or a committed policy, replaces the graph with a new
//! propagated value and pushes the previous one onto a bounded undo history.
//! Hosts that share a session put it behind a single async mutex so toggles
//! and apply cycles never interleave.

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::engine::{Evaluation, Impact, Policy, Simulator};
use crate::error::{GraphResult, PolicyServiceError, PolicyServiceResult};
use crate::graph::baseline::baseline_graph;
use crate::graph::wire::load_graph_file;
use crate::graph::{CausalGraph, GraphSnapshot};
use crate::policy::{GraphContext, PolicyApplier, PolicyGenerator};

/// Where an interactive apply cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPhase {
    Idle,
    Generating,
    Applying,
    Displaying,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyPhase::Idle => "idle",
            ApplyPhase::Generating => "generating",
            ApplyPhase::Applying => "applying",
            ApplyPhase::Displaying => "displaying",
        };
        f.write_str(name)
    }
}

/// Result of a committed apply cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub snapshot_id: String,
    pub policy: Policy,
    pub impact: Impact,
}

/// Load the baseline named by configuration, or the compiled-in one.
pub fn load_baseline(config: &SimulationConfig) -> GraphResult<CausalGraph> {
    match &config.baseline_path {
        Some(path) => load_graph_file(path),
        None => Ok(baseline_graph()),
    }
}

/// Owned simulation state for one caller.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    baseline: CausalGraph,
    current: CausalGraph,
    history: VecDeque<CausalGraph>,
    history_limit: usize,
    phase: ApplyPhase,
    last_report: Option<CycleReport>,
    simulator: Simulator,
}

impl Session {
    /// Start a session from a baseline definition.
    pub fn new(baseline: CausalGraph, simulator: Simulator, history_limit: usize) -> Self {
        let baseline = simulator.propagate(&baseline);
        let id = uuid::Uuid::new_v4().to_string();
        info!(session_id = %id, nodes = baseline.nodes().len(), "Session started");
        Self {
            id,
            current: baseline.clone(),
            baseline,
            history: VecDeque::new(),
            history_limit,
            phase: ApplyPhase::Idle,
            last_report: None,
            simulator,
        }
    }

    /// Start a session from configuration.
    pub fn from_config(config: &SimulationConfig) -> GraphResult<Self> {
        let baseline = load_baseline(config)?;
        Ok(Self::new(baseline, Simulator::new(config), config.history_limit))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current, propagated graph.
    pub fn graph(&self) -> &CausalGraph {
        &self.current
    }

    /// The propagated baseline the session started from.
    pub fn baseline(&self) -> &CausalGraph {
        &self.baseline
    }

    pub fn phase(&self) -> ApplyPhase {
        self.phase
    }

    /// Report of the last committed apply cycle.
    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    /// Number of states `undo` can step back through.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Immutable capture of the current graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.current.snapshot()
    }

    /// Set a sector's activity level and re-propagate.
    pub fn set_sector_activity(&mut self, node_id: &str, value: f64) -> GraphResult<&CausalGraph> {
        let next = self.current.set_sector_activity(node_id, value)?;
        debug!(session_id = %self.id, node_id = %node_id, value, "Sector activity set");
        self.commit(next);
        Ok(&self.current)
    }

    /// Flip a node's enabled flag and re-propagate.
    pub fn toggle_node(&mut self, node_id: &str) -> GraphResult<&CausalGraph> {
        let next = self.current.toggle_node(node_id)?;
        debug!(session_id = %self.id, node_id = %node_id, "Node toggled");
        self.commit(next);
        Ok(&self.current)
    }

    /// Return to the baseline and forget history.
    pub fn reset(&mut self) {
        self.current = self.baseline.clone();
        self.history.clear();
        self.phase = ApplyPhase::Idle;
        self.last_report = None;
        info!(session_id = %self.id, "Session reset to baseline");
    }

    /// Step back up to `steps` states. Returns how many were undone.
    pub fn undo(&mut self, steps: usize) -> usize {
        let mut undone = 0;
        while undone < steps {
            match self.history.pop_back() {
                Some(previous) => {
                    self.current = previous;
                    undone += 1;
                }
                None => break,
            }
        }
        if undone > 0 {
            self.phase = ApplyPhase::Idle;
        }
        debug!(session_id = %self.id, requested = steps, undone, "Undo");
        undone
    }

    /// Evaluate a policy against the current graph without committing it.
    pub fn simulate(&self, policy: &Policy) -> Evaluation {
        self.simulator.evaluate(&self.current, policy)
    }

    /// Generate a policy for `research_query`, apply it and commit the result.
    ///
    /// The graph only changes if both steps succeed; on failure the session
    /// returns to [`ApplyPhase::Idle`] with the graph untouched. A returned
    /// post-policy graph whose nodes or edges differ from the current graph
    /// is a [`PolicyServiceError::MalformedResponse`].
    pub async fn run_apply_cycle(
        &mut self,
        research_query: &str,
        generator: &dyn PolicyGenerator,
        applier: &dyn PolicyApplier,
    ) -> PolicyServiceResult<&CycleReport> {
        self.phase = ApplyPhase::Generating;
        let context = GraphContext::from_graph(&self.current);
        let policy = match generator.generate(research_query, &context).await {
            Ok(policy) => policy,
            Err(e) => return Err(self.abort_cycle(e)),
        };

        self.phase = ApplyPhase::Applying;
        let applied = match applier.apply(&policy, &self.current).await {
            Ok(applied) => applied,
            Err(e) => return Err(self.abort_cycle(e)),
        };

        // Only flags and weights are taken from the applier; structure and
        // sector values stay the session's own.
        let next = match self.current.with_state_from(&applied.post_policy_graph) {
            Ok(next) => next,
            Err(e) => {
                return Err(self.abort_cycle(PolicyServiceError::MalformedResponse {
                    message: format!("post-policy graph rejected: {}", e),
                }))
            }
        };

        info!(
            session_id = %self.id,
            policy = %policy.id,
            snapshot_id = %applied.snapshot_id,
            co2_change_pct = applied.impact.co2.change_pct,
            "Policy committed"
        );
        self.commit(next);
        self.phase = ApplyPhase::Displaying;

        Ok(self.last_report.insert(CycleReport {
            snapshot_id: applied.snapshot_id,
            policy,
            impact: applied.impact,
        }))
    }

    fn abort_cycle(&mut self, error: PolicyServiceError) -> PolicyServiceError {
        warn!(
            session_id = %self.id,
            phase = %self.phase,
            error = %error,
            "Apply cycle failed, graph left unchanged"
        );
        self.phase = ApplyPhase::Idle;
        error
    }

    // Derived values of a committed graph may be stale, so every commit
    // propagates.
    fn commit(&mut self, next: CausalGraph) {
        let next = self.simulator.propagate(&next);
        let previous = std::mem::replace(&mut self.current, next);
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(previous);
    }
}
