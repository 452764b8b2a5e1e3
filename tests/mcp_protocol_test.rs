//! Integration tests for MCP protocol handling
//!
//! Drives a full stdio session against the offline keyword/local backends
//! and checks that each step sees the graph left by the previous one.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::BufReader;

use causal_policy_sim::{AppState, Config, McpServer};

/// Verify JSON-RPC 2.0 response structure
fn assert_valid_jsonrpc_response(response: &Value) {
    assert_eq!(response["jsonrpc"], "2.0", "Invalid JSON-RPC version");
    assert!(
        response.get("result").is_some() || response.get("error").is_some(),
        "Response must have result or error"
    );
}

fn call(id: u64, name: &str, arguments: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
    .to_string()
}

/// Feed `requests` through one server and return the decoded responses.
async fn run_session(requests: &[String]) -> Vec<Value> {
    let state = AppState::from_config(Config::default()).expect("default config");
    let server = McpServer::new(Arc::new(state));

    let input = requests.join("\n") + "\n";
    let mut output = Vec::new();
    server
        .serve(BufReader::new(input.as_bytes()), &mut output)
        .await
        .expect("serve");

    String::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response json"))
        .collect()
}

/// Decode the JSON payload carried in a tool result's text content.
fn tool_payload(response: &Value) -> Value {
    assert!(
        response["result"].get("isError").is_none(),
        "unexpected tool error: {}",
        response
    );
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).expect("tool payload json")
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_then_notification_then_list() {
        let responses = run_session(&[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            }})
            .to_string(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}).to_string(),
        ])
        .await;

        // The notification produces no response.
        assert_eq!(responses.len(), 2);
        responses.iter().for_each(assert_valid_jsonrpc_response);

        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "causal-policy-sim");
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_blank_lines_are_ignored() {
        let responses = run_session(&[
            String::new(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}).to_string(),
            "   ".to_string(),
        ])
        .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 7);
    }
}

#[cfg(test)]
mod session_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_toggle_apply_undo_flow() {
        let responses = run_session(&[
            call(1, "graph_toggle_node", json!({"node_id": "transport"})),
            call(2, "graph_undo", json!({})),
            call(3, "policy_apply", json!({"research_query": "coal power generation"})),
            call(4, "graph_state", json!({})),
            call(5, "graph_reset", json!({})),
        ])
        .await;
        assert_eq!(responses.len(), 5);

        let toggled = tool_payload(&responses[0]);
        assert_eq!(toggled["co2"], 0.0);
        assert_eq!(toggled["history_len"], 1);

        let undone = tool_payload(&responses[1]);
        assert_eq!(undone["undone"], 1);
        assert!((undone["state"]["co2"].as_f64().unwrap() - 18.914).abs() < 1e-9);

        let applied = tool_payload(&responses[2]);
        assert_eq!(applied["report"]["policy"]["policy_id"], "keyword-power");
        assert_eq!(applied["state"]["phase"], "displaying");
        assert!((applied["state"]["co2"].as_f64().unwrap() - 18.326).abs() < 1e-9);

        let state = tool_payload(&responses[3]);
        assert_eq!(state["history_len"], 1);

        let reset = tool_payload(&responses[4]);
        assert_eq!(reset["history_len"], 0);
        assert_eq!(reset["phase"], "idle");
        assert!((reset["co2"].as_f64().unwrap() - 18.914).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_simulate_does_not_commit() {
        let responses = run_session(&[
            call(
                1,
                "policy_simulate",
                json!({"policy": {
                    "policy_id": "ev",
                    "name": "Electric buses",
                    "mutations": [{
                        "type": "reduce_edge_weight",
                        "source": "transport",
                        "target": "vehicle-emissions",
                        "new_weight": 0.35
                    }]
                }}),
            ),
            call(2, "graph_state", json!({})),
        ])
        .await;

        let simulated = tool_payload(&responses[0]);
        assert_eq!(simulated["policy"]["policy_id"], "ev");
        assert!((simulated["impact"]["co2"]["post_policy"].as_f64().unwrap() - 10.339).abs() < 1e-9);

        let state = tool_payload(&responses[1]);
        assert_eq!(state["history_len"], 0);
        assert!((state["co2"].as_f64().unwrap() - 18.914).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_compare_builtin_presets() {
        let responses = run_session(&[call(
            1,
            "scenario_compare",
            json!({"preset_ids": ["coal-phase-down", "transport-restriction"]}),
        )])
        .await;

        let comparison = tool_payload(&responses[0]);
        let names: Vec<&str> = comparison["comparison"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Coal phase-down", "Transport restriction"]);
        assert_eq!(comparison["ranking"]["best_co2_reduction"], "Transport restriction");
    }

    #[tokio::test]
    async fn test_unknown_preset_is_tool_error() {
        let responses = run_session(&[call(
            1,
            "scenario_compare",
            json!({"preset_ids": ["tidal-power"]}),
        )])
        .await;

        assert_eq!(responses[0]["result"]["isError"], true);
        assert!(responses[0]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("tidal-power"));
    }
}
