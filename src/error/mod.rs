use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Policy service error: {0}")]
    PolicyService(#[from] PolicyServiceError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),
}

/// Errors raised by the graph mutators and baseline loading
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("Node {node_id} is not a sector node")]
    NotASector { node_id: String },

    #[error("Activity level {value} for {node_id} is outside 0-100")]
    ActivityOutOfRange { node_id: String, value: f64 },

    #[error("Failed to load graph: {message}")]
    Load { message: String },

    #[error("Graph shape mismatch: {message}")]
    ShapeMismatch { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the external policy generation / application collaborator
#[derive(Debug, Error)]
pub enum PolicyServiceError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Policy service unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PolicyServiceError {
    /// Whether this error belongs to the transport/non-success class.
    ///
    /// Everything except [`PolicyServiceError::MalformedResponse`] is a
    /// network-class failure.
    pub fn is_network(&self) -> bool {
        !matches!(self, PolicyServiceError::MalformedResponse { .. })
    }

    /// Whether the client may retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            PolicyServiceError::MalformedResponse { .. } => false,
            PolicyServiceError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => true,
        }
    }
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// A non-fatal condition recorded while applying a policy or diffing graphs.
///
/// These never abort an operation. The offending mutation is skipped, or the
/// percentage change degrades to zero, and the condition is handed back to
/// the caller alongside the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// A reweight mutation named an edge that does not exist.
    EdgeNotFound { source: String, target: String },
    /// An enable/disable mutation named a node that does not exist.
    NodeNotFound { node_id: String },
    /// The baseline value was zero, so the percentage change is reported as 0.
    UndefinedChangePct { node_id: String },
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::EdgeNotFound { source, target } => {
                write!(f, "edge not found: {} -> {}", source, target)
            }
            Condition::NodeNotFound { node_id } => write!(f, "node not found: {}", node_id),
            Condition::UndefinedChangePct { node_id } => {
                write!(f, "undefined change pct (zero baseline): {}", node_id)
            }
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for policy service operations
pub type PolicyServiceResult<T> = Result<T, PolicyServiceError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
