// SPDX-License-Identifier: MIT

//! Typed error handling for waypoint-rs
//!
//! Errors are split by layer: model calls, node execution, graph
//! construction/execution, and a top-level `WaypointError` that wraps them.

use thiserror::Error;

/// Top-level error type for waypoint-rs
#[derive(Debug, Error)]
pub enum WaypointError {
    /// API errors from external services (weather, places, exchange rates)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Tool not found in the registry
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow construction or execution errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Model/LLM errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Node execution errors
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Graph construction and execution errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No entry point was set, or it names an unknown node
    #[error("Workflow has no valid entry point")]
    MissingEntry,

    /// An edge or entry references a node that was never added
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Two nodes share an id
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// A node has more than one outgoing edge definition
    #[error("Node '{0}' has more than one outgoing edge")]
    ConflictingEdges(String),

    /// Cycle detected while validating the graph
    #[error("Circular dependency detected: {0:?}")]
    CircularDependency(Vec<String>),

    /// Node kind in a workflow file is not known to the factory
    #[error("Unknown node kind '{kind}' for node '{node}'")]
    UnknownNodeKind { node: String, kind: String },

    /// Node parameters failed to deserialize or are inconsistent
    #[error("Invalid parameters for node '{node}': {message}")]
    InvalidParams { node: String, message: String },

    /// A `when` expression could not be parsed
    #[error("Invalid condition '{expr}': {message}")]
    InvalidCondition { expr: String, message: String },

    /// Router produced no key, or a key without a branch, and had no fallback
    #[error("Node '{node}' could not route (key: {key:?})")]
    Unroutable { node: String, key: Option<String> },

    /// A node with the `halt` policy failed
    #[error("Node '{node}' failed: {message}")]
    NodeFailed { node: String, message: String },

    /// Step guard tripped
    #[error("Workflow exceeded {0} steps")]
    MaxStepsExceeded(usize),

    /// Workflow file not found
    #[error("Workflow file not found: {0}")]
    FileNotFound(String),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider name not recognised
    #[error("Unsupported model provider: {0}")]
    UnsupportedProvider(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Non-success HTTP status from the provider
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a single node while it runs
#[derive(Debug, Error)]
pub enum NodeError {
    /// A state field the node needs is absent
    #[error("Missing state field: {0}")]
    MissingField(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Tool execution failed
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// Node could not interpret its input or a collaborator's output
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// The output node already wrote an artifact for this run
    #[error("Artifact already persisted at {0}")]
    AlreadyPersisted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WaypointError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool not found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl NodeError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<&str> for WaypointError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for WaypointError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

/// Crate-wide result alias
pub type Result<T, E = WaypointError> = std::result::Result<T, E>;
