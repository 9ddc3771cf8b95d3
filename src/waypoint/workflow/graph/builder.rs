// SPDX-License-Identifier: MIT

//! Graph construction and validation

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::executor::{CompiledGraph, CompiledNode};
use super::types::{Edge, Route, END};
use crate::adk::error::WorkflowError;
use crate::waypoint::workflow::node::{Node, OnError};
use crate::waypoint::workflow::state::StateSchema;

/// Default guard on node executions per run
pub const DEFAULT_MAX_STEPS: usize = 64;

/// Collects nodes and edges, then validates them into a `CompiledGraph`.
///
/// ```ignore
/// let graph = GraphBuilder::new("demo")
///     .add_node("extract", extract)
///     .add_node("summarize", summarize)
///     .add_edge("extract", "summarize")
///     .set_entry_point("extract")
///     .compile()?;
/// ```
pub struct GraphBuilder {
    name: String,
    description: String,
    schema: StateSchema,
    nodes: Vec<(String, CompiledNode)>,
    edges: Vec<(String, Edge)>,
    entry: Option<String>,
    /// Explicit step limit; otherwise the larger of the default and the node count
    max_steps: Option<usize>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            schema: StateSchema::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            entry: None,
            max_steps: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps.max(1));
        self
    }

    pub fn add_node(self, id: impl Into<String>, node: impl Node + 'static) -> Self {
        self.add_node_with_policy(id, Arc::new(node), OnError::default())
    }

    pub fn add_node_with_policy(
        mut self,
        id: impl Into<String>,
        node: Arc<dyn Node>,
        on_error: OnError,
    ) -> Self {
        self.nodes.push((id.into(), CompiledNode { node, on_error }));
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), Edge::Direct(to.into())));
        self
    }

    pub fn add_conditional_edges(mut self, from: impl Into<String>, route: Route) -> Self {
        self.edges.push((from.into(), Edge::Conditional(route)));
        self
    }

    pub fn set_entry_point(mut self, id: impl Into<String>) -> Self {
        self.entry = Some(id.into());
        self
    }

    /// Validate and freeze the graph
    pub fn compile(self) -> Result<CompiledGraph, WorkflowError> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut nodes = HashMap::with_capacity(self.nodes.len());
        for (id, node) in self.nodes {
            if id == END || id.trim().is_empty() {
                return Err(WorkflowError::InvalidParams {
                    node: id,
                    message: "reserved or empty node id".to_string(),
                });
            }
            if nodes.contains_key(&id) {
                return Err(WorkflowError::DuplicateNode(id));
            }
            order.push(id.clone());
            nodes.insert(id, node);
        }

        let entry = self.entry.ok_or(WorkflowError::MissingEntry)?;
        if !nodes.contains_key(&entry) {
            return Err(WorkflowError::UnknownNode(entry));
        }

        let mut edges: HashMap<String, Edge> = HashMap::new();
        for (from, edge) in self.edges {
            if !nodes.contains_key(&from) {
                return Err(WorkflowError::UnknownNode(from));
            }
            if let Edge::Conditional(route) = &edge {
                if route.branches.is_empty() && route.fallback.is_none() {
                    return Err(WorkflowError::InvalidParams {
                        node: from,
                        message: "route has no branches".to_string(),
                    });
                }
            }
            if let Some(target) = edge
                .targets()
                .into_iter()
                .find(|t| *t != END && !nodes.contains_key(*t))
            {
                return Err(WorkflowError::UnknownNode(target.to_string()));
            }
            if edges.contains_key(&from) {
                return Err(WorkflowError::ConflictingEdges(from));
            }
            edges.insert(from, edge);
        }

        if let Some(cycle) = find_cycle(&order, &edges) {
            return Err(WorkflowError::CircularDependency(cycle));
        }

        let reachable = reachable_from(&entry, &edges);
        for id in order.iter().filter(|id| !reachable.contains(id.as_str())) {
            log::warn!("Node '{}' in graph '{}' is unreachable", id, self.name);
        }

        log::debug!(
            "Compiled graph '{}' with {} nodes and {} edges",
            self.name,
            order.len(),
            edges.len()
        );

        let max_steps = self
            .max_steps
            .unwrap_or_else(|| DEFAULT_MAX_STEPS.max(order.len()));
        Ok(CompiledGraph::new(
            self.name,
            self.description,
            self.schema,
            nodes,
            order,
            edges,
            entry,
            max_steps,
        ))
    }
}

/// Depth-first search for a back edge; returns the cycle path if any
fn find_cycle(order: &[String], edges: &HashMap<String, Edge>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        id: &'a str,
        edges: &'a HashMap<String, Edge>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|p| *p == id).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(id.to_string());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(id, Mark::Visiting);
        path.push(id);
        if let Some(edge) = edges.get(id) {
            for target in edge.targets() {
                if target == END {
                    continue;
                }
                if let Some(cycle) = visit(target, edges, marks, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        marks.insert(id, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    for id in order {
        let mut path = Vec::new();
        if let Some(cycle) = visit(id, edges, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}

fn reachable_from<'a>(entry: &'a str, edges: &'a HashMap<String, Edge>) -> HashSet<&'a str> {
    let mut seen = HashSet::from([entry]);
    let mut queue = VecDeque::from([entry]);
    while let Some(id) = queue.pop_front() {
        if let Some(edge) = edges.get(id) {
            for target in edge.targets() {
                if target != END && seen.insert(target) {
                    queue.push_back(target);
                }
            }
        }
    }
    seen
}
