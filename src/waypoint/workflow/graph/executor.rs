//! Graph workflow executor

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{Edge, WorkflowEvent, END};
use crate::adk::error::WorkflowError;
use crate::waypoint::workflow::artifact::FinalArtifact;
use crate::waypoint::workflow::node::{Node, OnError};
use crate::waypoint::workflow::state::{StateSchema, StateUpdate, WorkflowState};

/// Node plus its failure policy
pub struct CompiledNode {
    pub node: Arc<dyn Node>,
    pub on_error: OnError,
}

/// Result of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub workflow: String,
    pub state: WorkflowState,
    /// Nodes in execution order
    pub trail: Vec<String>,
    pub elapsed_ms: u64,
}

impl RunOutcome {
    pub fn artifact(&self) -> FinalArtifact {
        FinalArtifact::from_state(&self.state)
    }
}

/// A validated, immutable graph. Build one with `GraphBuilder`.
pub struct CompiledGraph {
    name: String,
    description: String,
    schema: StateSchema,
    nodes: HashMap<String, CompiledNode>,
    order: Vec<String>,
    edges: HashMap<String, Edge>,
    entry: String,
    max_steps: usize,
}

impl CompiledGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        description: String,
        schema: StateSchema,
        nodes: HashMap<String, CompiledNode>,
        order: Vec<String>,
        edges: HashMap<String, Edge>,
        entry: String,
        max_steps: usize,
    ) -> Self {
        Self {
            name,
            description,
            schema,
            nodes,
            order,
            edges,
            entry,
            max_steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Fresh state seeded with `query` and the schema defaults
    pub fn initial_state(&self, query: &str) -> WorkflowState {
        WorkflowState::with_query(&self.schema, query)
    }

    /// Run the graph for a query
    pub async fn invoke(&self, query: &str) -> Result<RunOutcome, WorkflowError> {
        self.invoke_state(self.initial_state(query)).await
    }

    /// Run the graph from a prepared state
    pub async fn invoke_state(&self, state: WorkflowState) -> Result<RunOutcome, WorkflowError> {
        self.execute(state, None).await
    }

    /// Run the graph, publishing progress events on `events`.
    ///
    /// A dropped receiver does not stop the run.
    pub async fn invoke_stream(
        &self,
        state: WorkflowState,
        events: mpsc::Sender<WorkflowEvent>,
    ) -> Result<RunOutcome, WorkflowError> {
        self.execute(state, Some(&events)).await
    }

    async fn execute(
        &self,
        state: WorkflowState,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<RunOutcome, WorkflowError> {
        let run_id = Uuid::new_v4();
        emit(
            events,
            WorkflowEvent::Started {
                run_id,
                workflow: self.name.clone(),
            },
        )
        .await;

        match self.run_loop(run_id, state, events).await {
            Ok(outcome) => {
                emit(
                    events,
                    WorkflowEvent::Finished {
                        run_id,
                        trail: outcome.trail.clone(),
                        artifact_path: outcome.artifact().path,
                    },
                )
                .await;
                Ok(outcome)
            }
            Err(e) => {
                log::error!("Run {} of '{}' failed: {}", run_id, self.name, e);
                emit(
                    events,
                    WorkflowEvent::Failed {
                        error: e.to_string(),
                    },
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_loop(
        &self,
        run_id: Uuid,
        mut state: WorkflowState,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<RunOutcome, WorkflowError> {
        let started = Instant::now();
        let mut trail: Vec<String> = Vec::new();
        let mut current = self.entry.clone();

        log::info!("Run {} of '{}' started", run_id, self.name);

        while current != END {
            if trail.len() >= self.max_steps {
                return Err(WorkflowError::MaxStepsExceeded(self.max_steps));
            }

            let compiled = self
                .nodes
                .get(&current)
                .ok_or_else(|| WorkflowError::UnknownNode(current.clone()))?;

            emit(
                events,
                WorkflowEvent::NodeStarted {
                    node: current.clone(),
                    step: trail.len() + 1,
                },
            )
            .await;
            log::info!("Executing node: {}", current);

            let node_started = Instant::now();
            match compiled.node.run(&state).await {
                Ok(update) => {
                    let keys = state.apply(update);
                    log::info!("Node {} completed, wrote {:?}", current, keys);
                    emit(
                        events,
                        WorkflowEvent::NodeCompleted {
                            node: current.clone(),
                            keys,
                            elapsed_ms: node_started.elapsed().as_millis() as u64,
                        },
                    )
                    .await;
                }
                Err(e) => {
                    let halted = compiled.on_error == OnError::Halt;
                    emit(
                        events,
                        WorkflowEvent::NodeFailed {
                            node: current.clone(),
                            error: e.to_string(),
                            halted,
                        },
                    )
                    .await;
                    if halted {
                        return Err(WorkflowError::NodeFailed {
                            node: current,
                            message: e.to_string(),
                        });
                    }
                    log::warn!("Node {} failed, continuing: {}", current, e);
                    state.apply(StateUpdate::new().error(&current, e.to_string()));
                }
            }

            trail.push(current.clone());
            current = self.next_node(&current, &state, events).await?;
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Run {} of '{}' finished in {} ms: {}",
            run_id,
            self.name,
            elapsed_ms,
            trail.join(" -> ")
        );

        Ok(RunOutcome {
            run_id,
            workflow: self.name.clone(),
            state,
            trail,
            elapsed_ms,
        })
    }

    async fn next_node(
        &self,
        from: &str,
        state: &WorkflowState,
        events: Option<&mpsc::Sender<WorkflowEvent>>,
    ) -> Result<String, WorkflowError> {
        match self.edges.get(from) {
            None => Ok(END.to_string()),
            Some(Edge::Direct(target)) => Ok(target.clone()),
            Some(Edge::Conditional(route)) => {
                let decision = route.resolve(state).map_err(|key| WorkflowError::Unroutable {
                    node: from.to_string(),
                    key,
                })?;
                if decision.used_fallback {
                    log::warn!(
                        "Node {} routed {:?} to fallback '{}'",
                        from,
                        decision.key,
                        decision.target
                    );
                } else {
                    log::info!(
                        "Node {} routed {:?} to '{}'",
                        from,
                        decision.key,
                        decision.target
                    );
                }
                emit(
                    events,
                    WorkflowEvent::Routed {
                        from: from.to_string(),
                        key: decision.key,
                        to: decision.target.clone(),
                    },
                )
                .await;
                Ok(decision.target)
            }
        }
    }

    /// Render the graph as a Mermaid flowchart
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        out.push_str("    __start__([start])\n");
        out.push_str("    __end__([end])\n");
        out.push_str(&format!("    __start__ --> {}\n", self.entry));

        for id in &self.order {
            match self.edges.get(id) {
                None => out.push_str(&format!("    {} --> {}\n", id, END)),
                Some(Edge::Direct(target)) => {
                    out.push_str(&format!("    {} --> {}\n", id, target))
                }
                Some(Edge::Conditional(route)) => {
                    for (key, target) in &route.branches {
                        out.push_str(&format!("    {} -. {} .-> {}\n", id, key, target));
                    }
                    if let Some(target) = &route.fallback {
                        out.push_str(&format!("    {} -. otherwise .-> {}\n", id, target));
                    }
                }
            }
        }
        out
    }
}

async fn emit(events: Option<&mpsc::Sender<WorkflowEvent>>, event: WorkflowEvent) {
    if let Some(tx) = events {
        if tx.send(event).await.is_err() {
            log::debug!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::NodeError;
    use crate::waypoint::workflow::graph::builder::GraphBuilder;
    use crate::waypoint::workflow::graph::types::{FieldSelector, Route};
    use crate::waypoint::workflow::node::FnNode;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a fixed key and counts its invocations
    struct MarkNode {
        name: String,
        key: String,
        value: serde_json::Value,
        calls: Arc<AtomicUsize>,
    }

    impl MarkNode {
        fn new(name: &str, key: &str, value: serde_json::Value) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name: name.to_string(),
                    key: key.to_string(),
                    value,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Node for MarkNode {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _state: &WorkflowState) -> Result<StateUpdate, NodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(StateUpdate::new()
                .set(self.key.clone(), self.value.clone())
                .message(format!("{} ran", self.name)))
        }
    }

    struct FailingNode;

    #[async_trait]
    impl Node for FailingNode {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&self, _state: &WorkflowState) -> Result<StateUpdate, NodeError> {
            Err(NodeError::tool("weather_forecast", "connection refused"))
        }
    }

    fn routed_graph(fallback: Option<&str>) -> CompiledGraph {
        let (classify, _) = MarkNode::new("classify", "classified", json!(true));
        let (travel, _) = MarkNode::new("travel", "weather", json!("sunny"));
        let (medical, _) = MarkNode::new("medical", "research", json!("notes"));
        let (general, _) = MarkNode::new("general", "research", json!("general notes"));
        let (summary, _) = MarkNode::new("summarize", "summary", json!("done"));

        let mut route = Route::new(FieldSelector::new("topic"))
            .branch("travel", "travel")
            .branch("medical", "medical");
        if let Some(target) = fallback {
            route = route.fallback(target);
        }

        GraphBuilder::new("routed")
            .add_node("classify", classify)
            .add_node("travel", travel)
            .add_node("medical", medical)
            .add_node("general", general)
            .add_node("summarize", summary)
            .add_conditional_edges("classify", route)
            .add_edge("travel", "summarize")
            .add_edge("medical", "summarize")
            .add_edge("general", "summarize")
            .add_edge("summarize", END)
            .set_entry_point("classify")
            .compile()
            .unwrap()
    }

    fn state_with_topic(graph: &CompiledGraph, topic: &str) -> WorkflowState {
        let mut state = graph.initial_state("query");
        state.update("topic", json!(topic));
        state
    }

    #[tokio::test]
    async fn test_linear_execution() {
        let (a, a_calls) = MarkNode::new("a", "x", json!(1));
        let (b, b_calls) = MarkNode::new("b", "y", json!(2));
        let graph = GraphBuilder::new("linear")
            .add_node("a", a)
            .add_node("b", b)
            .add_edge("a", "b")
            .set_entry_point("a")
            .compile()
            .unwrap();

        let outcome = graph.invoke("hello").await.unwrap();
        assert_eq!(outcome.trail, vec!["a", "b"]);
        assert_eq!(outcome.state.query(), Some("hello"));
        assert_eq!(outcome.state.get("y"), Some(&json!(2)));
        assert_eq!(outcome.state.messages(), vec!["a ran", "b ran"]);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_route_takes_exactly_one_branch() {
        let graph = routed_graph(None);

        let outcome = graph
            .invoke_state(state_with_topic(&graph, "Medical"))
            .await
            .unwrap();
        assert_eq!(outcome.trail, vec!["classify", "medical", "summarize"]);
        assert!(outcome.state.get("weather").is_none());

        let outcome = graph
            .invoke_state(state_with_topic(&graph, "travel"))
            .await
            .unwrap();
        assert_eq!(outcome.trail, vec!["classify", "travel", "summarize"]);
        assert!(outcome.state.get("research").is_none());
    }

    #[tokio::test]
    async fn test_unroutable_without_fallback() {
        let graph = routed_graph(None);
        let err = graph
            .invoke_state(state_with_topic(&graph, "cooking"))
            .await
            .unwrap_err();
        match err {
            WorkflowError::Unroutable { node, key } => {
                assert_eq!(node, "classify");
                assert_eq!(key.as_deref(), Some("cooking"));
            }
            other => panic!("expected Unroutable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unroutable_uses_fallback() {
        let graph = routed_graph(Some("general"));
        let outcome = graph.invoke("no topic here").await.unwrap();
        assert_eq!(outcome.trail, vec!["classify", "general", "summarize"]);
    }

    #[tokio::test]
    async fn test_continue_policy_records_error() {
        let (after, after_calls) = MarkNode::new("after", "after", json!(true));
        let graph = GraphBuilder::new("g")
            .add_node("fail", FailingNode)
            .add_node("after", after)
            .add_edge("fail", "after")
            .set_entry_point("fail")
            .compile()
            .unwrap();

        let outcome = graph.invoke("q").await.unwrap();
        assert_eq!(outcome.trail, vec!["fail", "after"]);
        assert_eq!(after_calls.load(Ordering::SeqCst), 1);
        let errors = outcome.state.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["node"], "fail");
        assert!(errors[0]["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_halt_policy_aborts() {
        let (after, after_calls) = MarkNode::new("after", "after", json!(true));
        let graph = GraphBuilder::new("g")
            .add_node_with_policy("fail", Arc::new(FailingNode), OnError::Halt)
            .add_node("after", after)
            .add_edge("fail", "after")
            .set_entry_point("fail")
            .compile()
            .unwrap();

        let err = graph.invoke("q").await.unwrap_err();
        assert!(matches!(err, WorkflowError::NodeFailed { ref node, .. } if node == "fail"));
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_state_grows_monotonically() {
        let check = FnNode::new("check", |state: &WorkflowState| {
            Ok(StateUpdate::new().set(format!("seen_{}", state.len()), json!(state.len())))
        });
        let check2 = FnNode::new("check2", |state: &WorkflowState| {
            Ok(StateUpdate::new().set(format!("seen_{}", state.len()), json!(state.len())))
        });
        let graph = GraphBuilder::new("g")
            .add_node("one", check)
            .add_node("two", check2)
            .add_edge("one", "two")
            .set_entry_point("one")
            .compile()
            .unwrap();

        let outcome = graph.invoke("q").await.unwrap();
        let keys: Vec<_> = outcome.state.keys().cloned().collect();
        assert!(keys.contains(&"query".to_string()));
        assert!(keys.contains(&"seen_1".to_string()));
        assert!(keys.contains(&"seen_2".to_string()));
    }

    #[tokio::test]
    async fn test_max_steps_guard() {
        let (a, _) = MarkNode::new("a", "x", json!(1));
        let (b, _) = MarkNode::new("b", "y", json!(2));
        let graph = GraphBuilder::new("g")
            .add_node("a", a)
            .add_node("b", b)
            .add_edge("a", "b")
            .set_entry_point("a")
            .max_steps(1)
            .compile()
            .unwrap();

        let err = graph.invoke("q").await.unwrap_err();
        assert!(matches!(err, WorkflowError::MaxStepsExceeded(1)));
    }

    #[tokio::test]
    async fn test_stream_events() {
        let graph = routed_graph(None);
        let (tx, mut rx) = mpsc::channel(32);
        let outcome = graph
            .invoke_stream(state_with_topic(&graph, "travel"), tx)
            .await
            .unwrap();

        let mut names = Vec::new();
        while let Some(event) = rx.recv().await {
            names.push(event.name());
        }
        assert_eq!(names.first(), Some(&"started"));
        assert_eq!(names.last(), Some(&"finished"));
        assert_eq!(names.iter().filter(|n| **n == "node_completed").count(), 3);
        assert_eq!(names.iter().filter(|n| **n == "routed").count(), 1);
        assert_eq!(outcome.trail.len(), 3);
    }

    #[test]
    fn test_mermaid_rendering() {
        let graph = routed_graph(Some("general"));
        let mermaid = graph.to_mermaid();
        assert!(mermaid.starts_with("graph TD\n"));
        assert!(mermaid.contains("__start__ --> classify"));
        assert!(mermaid.contains("classify -. travel .-> travel"));
        assert!(mermaid.contains("classify -. otherwise .-> general"));
        assert!(mermaid.contains("summarize --> __end__"));
    }
}
