//! Graph edge, routing and event types

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::adk::error::WorkflowError;
use crate::waypoint::workflow::condition::{self, Expression};
use crate::waypoint::workflow::state::WorkflowState;

/// Virtual terminal node. An edge to `END` finishes the run.
pub const END: &str = "__end__";

/// Picks a branch key from the state
pub trait RouteSelector: Send + Sync {
    fn select(&self, state: &WorkflowState) -> Option<String>;

    /// Short label used in logs and diagrams
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<F> RouteSelector for F
where
    F: Fn(&WorkflowState) -> Option<String> + Send + Sync,
{
    fn select(&self, state: &WorkflowState) -> Option<String> {
        self(state)
    }
}

/// Branch key is the (trimmed, lower-cased) string value of a state field
#[derive(Debug, Clone)]
pub struct FieldSelector {
    field: String,
}

impl FieldSelector {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl RouteSelector for FieldSelector {
    fn select(&self, state: &WorkflowState) -> Option<String> {
        state.get_str(&self.field).map(|s| s.to_lowercase())
    }

    fn describe(&self) -> String {
        self.field.clone()
    }
}

/// Ordered `when` rules; the first that holds names the branch
#[derive(Debug, Clone)]
pub struct ConditionSelector {
    rules: Vec<(Expression, String)>,
}

impl ConditionSelector {
    /// Parse `(expression, branch key)` pairs
    pub fn new<I, S, K>(rules: I) -> Result<Self, WorkflowError>
    where
        I: IntoIterator<Item = (S, K)>,
        S: AsRef<str>,
        K: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(expr, key)| Ok((condition::parse(expr.as_ref())?, key.into())))
            .collect::<Result<Vec<_>, WorkflowError>>()?;
        Ok(Self { rules })
    }
}

impl RouteSelector for ConditionSelector {
    fn select(&self, state: &WorkflowState) -> Option<String> {
        self.rules
            .iter()
            .find(|(expr, _)| condition::evaluate(expr, state))
            .map(|(_, key)| key.clone())
    }

    fn describe(&self) -> String {
        "when".to_string()
    }
}

/// A conditional edge: branch key to target node
#[derive(Clone)]
pub struct Route {
    pub selector: Arc<dyn RouteSelector>,
    pub branches: BTreeMap<String, String>,
    pub fallback: Option<String>,
}

/// Result of resolving a route against a state
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub key: Option<String>,
    pub target: String,
    pub used_fallback: bool,
}

impl Route {
    pub fn new(selector: impl RouteSelector + 'static) -> Self {
        Self {
            selector: Arc::new(selector),
            branches: BTreeMap::new(),
            fallback: None,
        }
    }

    pub fn branch(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.branches.insert(key.into(), target.into());
        self
    }

    pub fn fallback(mut self, target: impl Into<String>) -> Self {
        self.fallback = Some(target.into());
        self
    }

    /// Select the target for this state; `Err` carries the unmatched key
    pub fn resolve(&self, state: &WorkflowState) -> Result<RouteDecision, Option<String>> {
        let key = self.selector.select(state);
        if let Some(target) = key.as_ref().and_then(|k| self.branches.get(k)) {
            return Ok(RouteDecision {
                key,
                target: target.clone(),
                used_fallback: false,
            });
        }
        match &self.fallback {
            Some(target) => Ok(RouteDecision {
                key,
                target: target.clone(),
                used_fallback: true,
            }),
            None => Err(key),
        }
    }

    /// Every node this route can lead to
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.branches
            .values()
            .chain(self.fallback.iter())
            .map(String::as_str)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("selector", &self.selector.describe())
            .field("branches", &self.branches)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Outgoing edge of a node
#[derive(Debug, Clone)]
pub enum Edge {
    Direct(String),
    Conditional(Route),
}

impl Edge {
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(target) => vec![target.as_str()],
            Edge::Conditional(route) => route.targets().collect(),
        }
    }
}

/// Progress notifications emitted by streaming runs
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Started {
        run_id: Uuid,
        workflow: String,
    },
    NodeStarted {
        node: String,
        step: usize,
    },
    NodeCompleted {
        node: String,
        keys: Vec<String>,
        elapsed_ms: u64,
    },
    NodeFailed {
        node: String,
        error: String,
        halted: bool,
    },
    Routed {
        from: String,
        key: Option<String>,
        to: String,
    },
    Finished {
        run_id: Uuid,
        trail: Vec<String>,
        artifact_path: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl WorkflowEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Started { .. } => "started",
            WorkflowEvent::NodeStarted { .. } => "node_started",
            WorkflowEvent::NodeCompleted { .. } => "node_completed",
            WorkflowEvent::NodeFailed { .. } => "node_failed",
            WorkflowEvent::Routed { .. } => "routed",
            WorkflowEvent::Finished { .. } => "finished",
            WorkflowEvent::Failed { .. } => "failed",
        }
    }
}
