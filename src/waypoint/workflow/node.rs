// SPDX-License-Identifier: MIT

//! The unit of work in a workflow graph

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adk::error::NodeError;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState};

/// A graph node.
///
/// Nodes read the current state and return the writes they want applied.
/// They never hold on to the state, so a failing node leaves it untouched.
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError>;
}

/// What the executor does when a node returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Record `{node, error}` in `errors` and follow the node's edge
    #[default]
    Continue,
    /// Abort the run with `WorkflowError::NodeFailed`
    Halt,
}

/// Node backed by a synchronous closure
pub struct FnNode<F> {
    name: String,
    func: F,
}

impl<F> FnNode<F>
where
    F: Fn(&WorkflowState) -> Result<StateUpdate, NodeError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Node for FnNode<F>
where
    F: Fn(&WorkflowState) -> Result<StateUpdate, NodeError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        (self.func)(state)
    }
}
