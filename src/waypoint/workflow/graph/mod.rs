// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! Nodes run one at a time starting from the entry point. After each node
//! the executor follows its outgoing edge: a direct edge, a conditional
//! route, or none (end of run).

pub mod builder;
pub mod executor;
pub mod types;

pub use builder::{GraphBuilder, DEFAULT_MAX_STEPS};
pub use executor::{CompiledGraph, CompiledNode, RunOutcome};
pub use types::{
    ConditionSelector, Edge, FieldSelector, Route, RouteDecision, RouteSelector, WorkflowEvent,
    END,
};
