use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::SharedState;
use crate::engine::{Impact, Policy};
use crate::error::{McpError, McpResult};
use crate::graph::{GraphDiagnostics, GraphSnapshot};
use crate::policy::GraphContext;
use crate::scenario::{ScenarioPreset, ScenarioRequest};
use crate::session::{ApplyPhase, Session};

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        // Graph tools
        "graph_state" => handle_graph_state(state).await,
        "graph_set_activity" => handle_set_activity(state, arguments).await,
        "graph_toggle_node" => handle_toggle_node(state, arguments).await,
        "graph_reset" => handle_reset(state).await,
        "graph_undo" => handle_undo(state, arguments).await,
        "graph_validate" => handle_validate(state).await,
        // Policy tools
        "policy_generate" => handle_policy_generate(state, arguments).await,
        "policy_simulate" => handle_policy_simulate(state, arguments).await,
        "policy_apply" => handle_policy_apply(state, arguments).await,
        // Scenario tools
        "scenario_presets" => handle_scenario_presets(state, arguments).await,
        "scenario_compare" => handle_scenario_compare(state, arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

/// Current session view returned by the graph tools.
#[derive(Debug, Serialize)]
pub struct GraphStateResponse {
    pub session_id: String,
    pub phase: ApplyPhase,
    pub history_len: usize,
    pub co2: f64,
    pub aqi: f64,
    pub snapshot: GraphSnapshot,
}

impl GraphStateResponse {
    /// View of `session`. Callers that just wrote to the session build this
    /// under the same lock guard.
    fn from_session(session: &Session) -> Self {
        let tracked = session.simulator().tracked();
        Self {
            session_id: session.id().to_string(),
            phase: session.phase(),
            history_len: session.history_len(),
            co2: session.graph().value_of(&tracked.co2),
            aqi: session.graph().value_of(&tracked.aqi),
            snapshot: session.snapshot(),
        }
    }
}

fn to_value<T: Serialize>(result: T) -> McpResult<Value> {
    serde_json::to_value(result).map_err(McpError::Json)
}

/// Handle graph_state tool call
async fn handle_graph_state(state: &SharedState) -> McpResult<Value> {
    let session = state.session.lock().await;
    to_value(GraphStateResponse::from_session(&session))
}

/// Handle graph_set_activity tool call
async fn handle_set_activity(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct SetActivityParams {
        node_id: String,
        value: f64,
    }

    let params: SetActivityParams = parse_arguments("graph_set_activity", arguments)?;
    let mut session = state.session.lock().await;
    session
        .set_sector_activity(&params.node_id, params.value)
        .map_err(execution_failed)?;
    to_value(GraphStateResponse::from_session(&session))
}

/// Handle graph_toggle_node tool call
async fn handle_toggle_node(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ToggleParams {
        node_id: String,
    }

    let params: ToggleParams = parse_arguments("graph_toggle_node", arguments)?;
    let mut session = state.session.lock().await;
    session
        .toggle_node(&params.node_id)
        .map_err(execution_failed)?;
    to_value(GraphStateResponse::from_session(&session))
}

/// Handle graph_reset tool call
async fn handle_reset(state: &SharedState) -> McpResult<Value> {
    let mut session = state.session.lock().await;
    session.reset();
    to_value(GraphStateResponse::from_session(&session))
}

/// Handle graph_undo tool call
async fn handle_undo(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct UndoParams {
        #[serde(default = "default_steps")]
        steps: usize,
    }

    fn default_steps() -> usize {
        1
    }

    let params: UndoParams = parse_optional_arguments("graph_undo", arguments)?;
    let mut session = state.session.lock().await;
    let undone = session.undo(params.steps);
    let graph = GraphStateResponse::from_session(&session);
    Ok(json!({ "undone": undone, "state": to_value(graph)? }))
}

/// Handle graph_validate tool call
async fn handle_validate(state: &SharedState) -> McpResult<Value> {
    let diagnostics: GraphDiagnostics = state.session.lock().await.graph().diagnostics();
    let clean = diagnostics.is_clean();
    Ok(json!({ "clean": clean, "diagnostics": to_value(diagnostics)? }))
}

#[derive(Deserialize)]
struct QueryParams {
    research_query: String,
}

/// Handle policy_generate tool call
async fn handle_policy_generate(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: QueryParams = parse_arguments("policy_generate", arguments)?;
    let context = {
        let session = state.session.lock().await;
        GraphContext::from_graph(session.graph())
    };

    let policy = state
        .generator
        .generate(&params.research_query, &context)
        .await
        .map_err(execution_failed)?;
    let issues = policy.check_against(&context);

    Ok(json!({ "policy": to_value(policy)?, "issues": issues }))
}

/// Response of policy_simulate.
#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub snapshot_id: String,
    pub policy: Policy,
    pub impact: Impact,
}

/// Handle policy_simulate tool call: apply without committing.
async fn handle_policy_simulate(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct SimulateParams {
        #[serde(default)]
        policy: Option<Policy>,
        #[serde(default)]
        research_query: Option<String>,
    }

    let params: SimulateParams = parse_arguments("policy_simulate", arguments)?;
    let graph = state.session.lock().await.graph().clone();

    let policy = match (params.policy, params.research_query) {
        (Some(policy), _) => policy,
        (None, Some(query)) => state
            .generator
            .generate(&query, &GraphContext::from_graph(&graph))
            .await
            .map_err(execution_failed)?,
        (None, None) => {
            return Err(McpError::InvalidParameters {
                tool_name: "policy_simulate".to_string(),
                message: "Either policy or research_query is required".to_string(),
            })
        }
    };

    let applied = state
        .applier
        .apply(&policy, &graph)
        .await
        .map_err(execution_failed)?;

    to_value(SimulateResponse {
        snapshot_id: applied.snapshot_id,
        policy,
        impact: applied.impact,
    })
}

/// Handle policy_apply tool call: the full generate/apply/commit cycle.
async fn handle_policy_apply(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: QueryParams = parse_arguments("policy_apply", arguments)?;

    let mut session = state.session.lock().await;
    let report = session
        .run_apply_cycle(
            &params.research_query,
            state.generator.as_ref(),
            state.applier.as_ref(),
        )
        .await
        .map_err(execution_failed)?
        .clone();
    let graph = GraphStateResponse::from_session(&session);
    Ok(json!({ "report": to_value(report)?, "state": to_value(graph)? }))
}

/// Handle scenario_presets tool call
async fn handle_scenario_presets(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct PresetListParams {
        #[serde(default)]
        tag: Option<String>,
    }

    let params: PresetListParams = parse_optional_arguments("scenario_presets", arguments)?;
    let presets: Vec<ScenarioPreset> = state.preset_registry.list(params.tag.as_deref());
    Ok(json!({ "count": presets.len(), "presets": to_value(presets)? }))
}

/// Handle scenario_compare tool call
async fn handle_scenario_compare(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct CompareParams {
        #[serde(default)]
        scenarios: Vec<ScenarioRequest>,
        #[serde(default)]
        preset_ids: Vec<String>,
    }

    let params: CompareParams = parse_arguments("scenario_compare", arguments)?;

    let mut scenarios = params.scenarios;
    for id in &params.preset_ids {
        let preset = state
            .preset_registry
            .get(id)
            .ok_or_else(|| McpError::InvalidParameters {
                tool_name: "scenario_compare".to_string(),
                message: format!("Unknown preset: {}", id),
            })?;
        scenarios.push(preset.to_request());
    }

    if scenarios.is_empty() {
        return Err(McpError::InvalidParameters {
            tool_name: "scenario_compare".to_string(),
            message: "Missing scenarios".to_string(),
        });
    }

    let graph = state.session.lock().await.graph().clone();
    let comparison = state.orchestrator.compare(&scenarios, &graph).await;
    to_value(comparison)
}

fn execution_failed<E: std::fmt::Display>(e: E) -> McpError {
    McpError::ExecutionFailed {
        message: e.to_string(),
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Like [`parse_arguments`] but treats missing arguments as `{}`.
fn parse_optional_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    parse_arguments(tool_name, Some(arguments.unwrap_or_else(|| json!({}))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::AppState;
    use std::sync::Arc;

    fn state() -> SharedState {
        Arc::new(AppState::from_config(Config::default()).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = handle_tool_call(&state(), "graph_explode", None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownTool { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_report_their_own_write() {
        let state = state();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    handle_tool_call(
                        &state,
                        "graph_toggle_node",
                        Some(json!({"node_id": "transport"})),
                    )
                    .await
                    .unwrap()
                })
            })
            .collect();

        let mut seen = Vec::new();
        for task in tasks {
            let response = task.await.unwrap();
            let history_len = response["history_len"].as_u64().unwrap();
            let co2 = response["co2"].as_f64().unwrap();
            // An odd number of toggles leaves transport disabled.
            if history_len % 2 == 1 {
                assert_eq!(co2, 0.0, "after toggle {}", history_len);
            } else {
                assert!(co2 > 18.0, "after toggle {}", history_len);
            }
            seen.push(history_len);
        }

        seen.sort_unstable();
        assert_eq!(seen, (1..=16).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_toggle_then_undo() {
        let state = state();
        let toggled = handle_tool_call(
            &state,
            "graph_toggle_node",
            Some(json!({"node_id": "transport"})),
        )
        .await
        .unwrap();
        assert_eq!(toggled["history_len"], 1);

        let undone = handle_tool_call(&state, "graph_undo", None).await.unwrap();
        assert_eq!(undone["undone"], 1);
        assert_eq!(undone["state"]["history_len"], 0);
    }

    #[tokio::test]
    async fn test_set_activity_rejects_output_node() {
        let err = handle_tool_call(
            &state(),
            "graph_set_activity",
            Some(json!({"node_id": "co2", "value": 10})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_arguments() {
        let err = handle_tool_call(&state(), "policy_apply", None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn test_policy_apply_commits() {
        let state = state();
        let result = handle_tool_call(
            &state,
            "policy_apply",
            Some(json!({"research_query": "vehicle restrictions"})),
        )
        .await
        .unwrap();

        assert_eq!(result["report"]["policy"]["policy_id"], "keyword-transport");
        assert_eq!(result["state"]["phase"], "displaying");
        assert_eq!(result["state"]["co2"], 0.0);
    }

    #[tokio::test]
    async fn test_policy_apply_failure_keeps_graph() {
        let state = state();
        let err = handle_tool_call(
            &state,
            "policy_apply",
            Some(json!({"research_query": "tree planting"})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::ExecutionFailed { .. }));

        let session = state.session.lock().await;
        assert_eq!(session.phase(), ApplyPhase::Idle);
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn test_policy_simulate_does_not_commit() {
        let state = state();
        let result = handle_tool_call(
            &state,
            "policy_simulate",
            Some(json!({"research_query": "coal"})),
        )
        .await
        .unwrap();
        assert!(result["impact"]["co2"]["change_pct"].as_f64().unwrap() < 0.0);
        assert_eq!(state.session.lock().await.history_len(), 0);
    }

    #[tokio::test]
    async fn test_scenario_compare_with_presets() {
        let result = handle_tool_call(
            &state(),
            "scenario_compare",
            Some(json!({"preset_ids": ["transport-restriction", "coal-phase-down"]})),
        )
        .await
        .unwrap();

        assert_eq!(result["comparison"].as_array().unwrap().len(), 2);
        assert_eq!(result["ranking"]["best_co2_reduction"], "Transport restriction");
    }

    #[tokio::test]
    async fn test_scenario_compare_requires_scenarios() {
        let err = handle_tool_call(&state(), "scenario_compare", Some(json!({})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing scenarios"));
    }
}
