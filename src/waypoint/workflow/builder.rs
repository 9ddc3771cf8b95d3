// SPDX-License-Identifier: MIT

//! Workflow builder - orchestrates workflow construction
//!
//! Turns a `WorkflowDefinition` into a validated `CompiledGraph`: nodes come
//! from the `NodeFactory`, edges and routes are translated to the graph
//! builder, and `GraphBuilder::compile` does the structural checks.

use std::path::Path;

use crate::adk::error::{Result, WorkflowError};
use crate::waypoint::workflow::graph::{
    CompiledGraph, ConditionSelector, FieldSelector, GraphBuilder, Route,
};
use crate::waypoint::workflow::loader::WorkflowLoader;
use crate::waypoint::workflow::node_factory::{NodeFactory, NodeServices};
use crate::waypoint::workflow::types::{EdgeDefinition, RouteDefinition, WorkflowDefinition};

/// High-level builder for constructing workflows from YAML definitions
pub struct WorkflowBuilder {
    loader: WorkflowLoader,
    factory: NodeFactory,
}

impl WorkflowBuilder {
    pub fn new(services: NodeServices) -> Self {
        Self {
            loader: WorkflowLoader::new(),
            factory: NodeFactory::new(services),
        }
    }

    /// Build a workflow from a YAML file path
    pub fn build_file<P: AsRef<Path>>(&self, path: P) -> Result<CompiledGraph> {
        let def = self.loader.load_workflow(path)?;
        Ok(self.build(&def)?)
    }

    /// Build a workflow from YAML text
    pub fn build_yaml(&self, yaml: &str) -> Result<CompiledGraph> {
        let def = WorkflowLoader::parse_yaml(yaml)?;
        Ok(self.build(&def)?)
    }

    /// Build a workflow from a parsed definition
    pub fn build(
        &self,
        def: &WorkflowDefinition,
    ) -> std::result::Result<CompiledGraph, WorkflowError> {
        let mut graph = GraphBuilder::new(def.name.clone())
            .description(def.description.clone())
            .set_entry_point(def.entry.clone());

        if let Some(schema) = &def.state {
            graph = graph.with_schema(schema.clone());
        }
        if let Some(max_steps) = def.max_steps {
            graph = graph.max_steps(max_steps);
        }

        for node_def in &def.nodes {
            let node = self.factory.build(node_def)?;
            graph = graph.add_node_with_policy(node_def.id.clone(), node, node_def.on_error);
        }

        for edge in &def.edges {
            graph = match (&edge.to, &edge.route) {
                (Some(to), None) => graph.add_edge(edge.from.clone(), to.clone()),
                (None, Some(route)) => {
                    graph.add_conditional_edges(edge.from.clone(), build_route(edge, route)?)
                }
                _ => {
                    return Err(WorkflowError::InvalidParams {
                        node: edge.from.clone(),
                        message: "edge needs exactly one of 'to' or 'route'".to_string(),
                    })
                }
            };
        }

        let compiled = graph.compile()?;
        log::info!(
            "Built workflow '{}' with {} nodes",
            compiled.name(),
            compiled.node_ids().len()
        );
        Ok(compiled)
    }
}

fn build_route(
    edge: &EdgeDefinition,
    def: &RouteDefinition,
) -> std::result::Result<Route, WorkflowError> {
    let mut route = match (&def.on, def.when.is_empty()) {
        (Some(field), true) => Route::new(FieldSelector::new(field.clone())),
        (None, false) => {
            let selector = ConditionSelector::new(
                def.when.iter().map(|rule| (rule.when.as_str(), rule.to.clone())),
            )?;
            let mut route = Route::new(selector);
            for rule in &def.when {
                route = route.branch(rule.to.clone(), rule.to.clone());
            }
            route
        }
        _ => {
            return Err(WorkflowError::InvalidParams {
                node: edge.from.clone(),
                message: "route needs exactly one of 'on' or 'when'".to_string(),
            })
        }
    };

    for (key, target) in &def.branches {
        route = route.branch(key.trim().to_lowercase(), target.clone());
    }
    if let Some(default) = &def.default {
        route = route.fallback(default.clone());
    }
    Ok(route)
}
