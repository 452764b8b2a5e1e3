//! Unit tests for MCP protocol implementation.
//!
//! Tests JSON-RPC 2.0 request/response handling, tool definitions,
//! and the line-delimited serve loop.

use super::*;
use crate::config::Config;
use crate::server::AppState;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn server() -> McpServer {
    McpServer::new(Arc::new(AppState::from_config(Config::default()).unwrap()))
}

async fn roundtrip(input: &str) -> Vec<Value> {
    let mut output = Vec::new();
    server()
        .serve(BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// ============================================================================
// JsonRpcResponse tests
// ============================================================================

#[test]
fn test_jsonrpc_response_success_with_id() {
    let response = JsonRpcResponse::success(Some(json!(1)), json!({"result": "ok"}));

    assert_eq!(response.jsonrpc, "2.0");
    assert_eq!(response.id, json!(1));
    assert!(response.error.is_none());
    assert_eq!(response.result.unwrap()["result"], "ok");
}

#[test]
fn test_jsonrpc_response_error_without_id() {
    let response = JsonRpcResponse::error(None, codes::PARSE_ERROR, "Parse error");

    assert_eq!(response.id, Value::Null);
    assert_eq!(response.error.unwrap().code, -32700);
}

#[test]
fn test_jsonrpc_response_serialization() {
    let response = JsonRpcResponse::success(Some(json!(1)), json!({"test": true}));
    let serialized = serde_json::to_string(&response).unwrap();

    assert!(serialized.contains("\"jsonrpc\":\"2.0\""));
    assert!(serialized.contains("\"id\":1"));
    // Error should be omitted when None
    assert!(!serialized.contains("\"error\""));
}

#[test]
fn test_jsonrpc_notification_no_id() {
    let json_str = r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;
    let request: JsonRpcRequest = serde_json::from_str(json_str).unwrap();

    assert!(request.id.is_none());
    assert_eq!(request.method, "initialized");
}

#[test]
fn test_tool_call_params_without_arguments() {
    let params: ToolCallParams = serde_json::from_value(json!({"name": "graph_state"})).unwrap();
    assert_eq!(params.name, "graph_state");
    assert!(params.arguments.is_none());
}

// ============================================================================
// Tool definition tests
// ============================================================================

#[test]
fn test_all_tools_count() {
    assert_eq!(all_tools().len(), 11);
}

#[test]
fn test_tool_names_are_unique() {
    let tools = all_tools();
    let names: HashSet<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names.len(), tools.len());
}

#[test]
fn test_all_tools_have_object_schemas() {
    for tool in all_tools() {
        assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
        assert_eq!(
            tool.input_schema["additionalProperties"], false,
            "{}",
            tool.name
        );
        assert!(!tool.description.is_empty());
    }
}

#[test]
fn test_set_activity_tool_bounds() {
    let tool = get_set_activity_tool();
    let value = &tool.input_schema["properties"]["value"];
    assert_eq!(value["minimum"], 0);
    assert_eq!(value["maximum"], 100);
    assert_eq!(tool.input_schema["required"], json!(["node_id", "value"]));
}

#[test]
fn test_tool_serialization_format() {
    let serialized = serde_json::to_value(get_policy_apply_tool()).unwrap();
    assert!(serialized.get("inputSchema").is_some());
    assert!(serialized.get("input_schema").is_none());
}

#[test]
fn test_tool_call_result_text() {
    let serialized = serde_json::to_value(ToolCallResult::text("{}")).unwrap();
    assert_eq!(serialized["content"][0]["type"], "text");
    assert!(serialized.get("isError").is_none());
}

#[test]
fn test_tool_call_result_failure() {
    let serialized = serde_json::to_value(ToolCallResult::failure("Error: boom")).unwrap();
    assert_eq!(serialized["isError"], true);
    assert_eq!(serialized["content"][0]["text"], "Error: boom");
}

// ============================================================================
// Serve loop tests
// ============================================================================

#[tokio::test]
async fn test_initialize_and_list() {
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        "\n",
    );
    let responses = roundtrip(input).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(
        responses[0]["result"]["serverInfo"]["name"],
        env!("CARGO_PKG_NAME")
    );
    assert_eq!(responses[1]["id"], 2);
    assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 11);
}

#[tokio::test]
async fn test_parse_error_and_unknown_method() {
    let input = "not json\n\n{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"graph/explode\"}\n";
    let responses = roundtrip(input).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["error"]["code"], -32700);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[1]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_tools_call_missing_params() {
    let responses = roundtrip("{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"tools/call\"}\n").await;
    assert_eq!(responses[0]["error"]["code"], codes::INVALID_PARAMS);
}

#[tokio::test]
async fn test_tools_call_graph_state() {
    let input = r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"graph_state"}}"#;
    let responses = roundtrip(&format!("{}\n", input)).await;

    let result = &responses[0]["result"];
    assert!(result.get("isError").is_none());
    let text = result["content"][0]["text"].as_str().unwrap();
    let state: Value = serde_json::from_str(text).unwrap();
    assert_eq!(state["phase"], "idle");
    assert_eq!(state["snapshot"]["nodes"].as_array().unwrap().len(), 25);
}

#[tokio::test]
async fn test_tools_call_error_is_flagged() {
    let input = r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"graph_toggle_node","arguments":{"node_id":"ghost"}}}"#;
    let responses = roundtrip(&format!("{}\n", input)).await;

    let result = &responses[0]["result"];
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("ghost"));
}

#[tokio::test]
async fn test_ping() {
    let responses = roundtrip("{\"jsonrpc\":\"2.0\",\"id\":\"p\",\"method\":\"ping\"}\n").await;
    assert_eq!(responses[0]["result"], json!({}));
}
