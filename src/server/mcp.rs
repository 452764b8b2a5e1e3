//! Line-delimited JSON-RPC 2.0 over stdio, speaking the MCP tool dialect.
//!
//! Each input line is one request; each request with an id gets exactly one
//! response line. Graph and policy tools are dispatched to
//! [`handle_tool_call`](super::handle_tool_call).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// MCP protocol revision advertised in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Standard JSON-RPC error codes.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Incoming JSON-RPC message. A missing `id` marks a notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outgoing JSON-RPC message; exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Echoed request id, `null` when the request could not be parsed.
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Name and version reported to clients.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub tools: ToolCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// The tool list is fixed for the lifetime of the process.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Payload of the `initialize` response.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Capabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// A tool entry in `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON Schema of the `arguments` object.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// `params` of a `tools/call` request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// One content block of a tool result. Only text blocks are produced.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Result of a `tools/call`. Tool failures are reported here with
/// `isError: true`, not as JSON-RPC errors.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResult {
    /// Successful result carrying `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text: text.into(),
            }],
            is_error: None,
        }
    }

    /// Failed result carrying `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(message)
        }
    }
}

impl JsonRpcResponse {
    /// Response carrying `result`.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Response carrying an error object.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Serialize `result` into a success response, or an internal error if
    /// that fails.
    fn from_serializable<T: Serialize>(id: Option<Value>, result: T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => {
                error!(error = %e, "Failed to serialize result");
                Self::error(id, codes::INTERNAL_ERROR, format!("Internal error: {}", e))
            }
        }
    }
}

/// MCP Server running over stdio.
///
/// Handles JSON-RPC 2.0 messages, one per line, and writes one response
/// line per request. Notifications get no response.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve stdin/stdout until the client closes stdin.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Listening on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve line-delimited JSON-RPC from `reader` until EOF.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        while reader.read_line(&mut line).await? > 0 {
            let message = line.trim();
            if !message.is_empty() {
                if let Some(response) = self.respond(message).await {
                    let encoded = serde_json::to_string(&response)?;
                    debug!(response = %encoded, "Sending response");
                    writer.write_all(encoded.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
            }
            line.clear();
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Decode one input line and produce its response, if any.
    async fn respond(&self, message: &str) -> Option<JsonRpcResponse> {
        debug!(request = %message, "Received request");
        match serde_json::from_str::<JsonRpcRequest>(message) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                error!(error = %e, "Failed to parse request");
                Some(JsonRpcResponse::error(
                    None,
                    codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    /// Handle a single JSON-RPC request.
    /// Returns None for notifications (requests without id).
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" | "notifications/initialized" => {
                debug!("Client finished initialization");
                None
            }
            "notifications/cancelled" => {
                debug!("Cancellation ignored; tool calls run to completion");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(self.handle_tool_call(request.id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(request.id, json!({}))),
            method => {
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        codes::METHOD_NOT_FOUND,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!(protocol = PROTOCOL_VERSION, "Client initializing");

        JsonRpcResponse::from_serializable(
            id,
            InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: Capabilities {
                    tools: ToolCapabilities {
                        list_changed: false,
                    },
                },
                server_info: ServerInfo {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            },
        )
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = all_tools();
        debug!(count = tools.len(), "Listing tools");
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    /// Handle tools/call request
    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "Missing params");
        };
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                )
            }
        };

        info!(tool = %params.name, "Tool call");

        let result = match handle_tool_call(&self.state, &params.name, params.arguments).await {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(text) => ToolCallResult::text(text),
                Err(e) => {
                    error!(tool = %params.name, error = %e, "Failed to render tool result");
                    ToolCallResult::failure(format!("Error: could not render result: {}", e))
                }
            },
            Err(e) => {
                debug!(tool = %params.name, error = %e, "Tool call failed");
                ToolCallResult::failure(format!("Error: {}", e))
            }
        };

        JsonRpcResponse::from_serializable(id, result)
    }
}

/// Every tool the server exposes, in listing order.
pub fn all_tools() -> Vec<Tool> {
    vec![
        get_graph_state_tool(),
        get_set_activity_tool(),
        get_toggle_node_tool(),
        get_reset_tool(),
        get_undo_tool(),
        get_validate_tool(),
        get_policy_generate_tool(),
        get_policy_simulate_tool(),
        get_policy_apply_tool(),
        get_scenario_presets_tool(),
        get_scenario_compare_tool(),
    ]
}

fn no_arguments_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

fn get_graph_state_tool() -> Tool {
    Tool {
        name: "graph_state".to_string(),
        description: "Current propagated graph with tracked CO2 and AQI values, apply phase and undo depth.".to_string(),
        input_schema: no_arguments_schema(),
    }
}

fn get_set_activity_tool() -> Tool {
    Tool {
        name: "graph_set_activity".to_string(),
        description: "Set a sector node's activity level (0-100) and re-propagate.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "node_id": {
                    "type": "string",
                    "description": "Sector node id (e.g. transport)"
                },
                "value": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": 100,
                    "description": "Activity level"
                }
            },
            "required": ["node_id", "value"],
            "additionalProperties": false
        }),
    }
}

fn get_toggle_node_tool() -> Tool {
    Tool {
        name: "graph_toggle_node".to_string(),
        description: "Flip a node between enabled and disabled and re-propagate.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "node_id": {
                    "type": "string",
                    "description": "Node id to toggle"
                }
            },
            "required": ["node_id"],
            "additionalProperties": false
        }),
    }
}

fn get_reset_tool() -> Tool {
    Tool {
        name: "graph_reset".to_string(),
        description: "Reset the graph to the baseline and clear undo history.".to_string(),
        input_schema: no_arguments_schema(),
    }
}

fn get_undo_tool() -> Tool {
    Tool {
        name: "graph_undo".to_string(),
        description: "Step back through previous graph states.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "steps": {
                    "type": "integer",
                    "minimum": 1,
                    "default": 1,
                    "description": "Number of states to undo"
                }
            },
            "additionalProperties": false
        }),
    }
}

fn get_validate_tool() -> Tool {
    Tool {
        name: "graph_validate".to_string(),
        description: "Report dangling edges, isolated nodes and duplicate ids in the current graph.".to_string(),
        input_schema: no_arguments_schema(),
    }
}

fn get_policy_generate_tool() -> Tool {
    Tool {
        name: "policy_generate".to_string(),
        description: "Generate a policy for a research query against the current graph without applying it.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "research_query": {
                    "type": "string",
                    "description": "Research question the policy should address"
                }
            },
            "required": ["research_query"],
            "additionalProperties": false
        }),
    }
}

fn get_policy_simulate_tool() -> Tool {
    Tool {
        name: "policy_simulate".to_string(),
        description: "Apply a policy to the current graph and report CO2/AQI impact without committing the result.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "policy": {
                    "type": "object",
                    "description": "Policy JSON (policy_id, name, mutations, ...)"
                },
                "research_query": {
                    "type": "string",
                    "description": "Generate the policy from this query when no policy is given"
                }
            },
            "additionalProperties": false
        }),
    }
}

fn get_policy_apply_tool() -> Tool {
    Tool {
        name: "policy_apply".to_string(),
        description: "Generate a policy, apply it and commit the post-policy graph. The graph is unchanged if either step fails.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "research_query": {
                    "type": "string",
                    "description": "Research question the policy should address"
                }
            },
            "required": ["research_query"],
            "additionalProperties": false
        }),
    }
}

fn get_scenario_presets_tool() -> Tool {
    Tool {
        name: "scenario_presets".to_string(),
        description: "List scenario presets, optionally filtered by tag.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "tag": {
                    "type": "string",
                    "description": "Only presets carrying this tag"
                }
            },
            "additionalProperties": false
        }),
    }
}

fn get_scenario_compare_tool() -> Tool {
    Tool {
        name: "scenario_compare".to_string(),
        description: "Run scenarios against the current graph and rank them by CO2 and AQI change. Failed scenarios are dropped.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "scenarios": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "policy_queries": {
                                "type": "array",
                                "items": { "type": "string" },
                                "minItems": 1
                            }
                        },
                        "required": ["name", "policy_queries"]
                    }
                },
                "preset_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Preset ids appended after explicit scenarios"
                }
            },
            "additionalProperties": false
        }),
    }
}
