// SPDX-License-Identifier: MIT

//! YAML schema types for workflow definitions
//!
//! A definition lists typed nodes and the edges between them; the
//! `WorkflowBuilder` turns it into a `CompiledGraph`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::waypoint::workflow::node::OnError;
use crate::waypoint::workflow::state::StateSchema;

/// Top-level workflow definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Id of the first node
    pub entry: String,
    /// Reducers, types and defaults of state keys
    #[serde(default)]
    pub state: Option<StateSchema>,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    pub max_steps: Option<usize>,
}

/// One node: its kind picks the implementation, `params` configure it
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeDefinition {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub on_error: OnError,
}

/// Outgoing edge of `from`: either a direct `to` or a conditional `route`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: Option<String>,
    pub route: Option<RouteDefinition>,
}

/// Conditional edge.
///
/// With `on`, the branch key is the value of that state field. With
/// `when`, the first rule whose condition holds picks its `to` node.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RouteDefinition {
    pub on: Option<String>,
    /// branch key -> node id
    #[serde(default)]
    pub branches: BTreeMap<String, String>,
    #[serde(default)]
    pub when: Vec<WhenRule>,
    /// Node used when no branch matches
    pub default: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WhenRule {
    pub when: String,
    pub to: String,
}

impl WorkflowDefinition {
    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
