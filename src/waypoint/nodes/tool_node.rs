// SPDX-License-Identifier: MIT

//! Generic node that calls a registered tool

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::adk::error::NodeError;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::registry::ToolRegistry;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState};

/// Builds tool arguments from state, runs the tool and stores (part of) its result.
///
/// With a `fallback`, failures and empty results write the fallback value
/// and record the problem in `errors` instead of failing the node.
pub struct ToolNode {
    name: String,
    registry: ToolRegistry,
    tool: String,
    /// argument name -> state path
    args: BTreeMap<String, String>,
    /// argument name -> literal value
    static_args: Map<String, Value>,
    extract: Option<String>,
    output_key: String,
    fallback: Option<Value>,
}

impl ToolNode {
    pub fn new(
        name: impl Into<String>,
        registry: ToolRegistry,
        tool: impl Into<String>,
        output_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            registry,
            tool: tool.into(),
            args: BTreeMap::new(),
            static_args: Map::new(),
            extract: None,
            output_key: output_key.into(),
            fallback: None,
        }
    }

    pub fn arg(mut self, name: impl Into<String>, state_path: impl Into<String>) -> Self {
        self.args.insert(name.into(), state_path.into());
        self
    }

    pub fn static_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.static_args.insert(name.into(), value);
        self
    }

    /// Dot path into the tool result to store instead of the whole result
    pub fn extract(mut self, path: Option<String>) -> Self {
        self.extract = path.filter(|p| !p.is_empty());
        self
    }

    pub fn fallback(mut self, value: Option<Value>) -> Self {
        self.fallback = value;
        self
    }

    fn build_input(&self, state: &WorkflowState) -> Result<Value, NodeError> {
        let mut input = self.static_args.clone();
        for (arg, path) in &self.args {
            match state.get_path(path) {
                Some(value) if !is_empty(value) => {
                    input.insert(arg.clone(), value.clone());
                }
                _ => return Err(NodeError::MissingField(path.clone())),
            }
        }
        Ok(Value::Object(input))
    }

    async fn call(&self, state: &WorkflowState) -> Result<Value, NodeError> {
        let input = self.build_input(state)?;
        let tool = self
            .registry
            .require(&self.tool)
            .await
            .map_err(|e| NodeError::tool(&self.tool, e.to_string()))?;

        log::info!("Node {} calling tool {}", self.name, self.tool);
        let result = tool
            .execute(input)
            .await
            .map_err(|e| NodeError::tool(&self.tool, e.to_string()))?;

        let value = match &self.extract {
            Some(path) => lookup(&result, path).cloned().unwrap_or(Value::Null),
            None => result,
        };

        if is_empty(&value) {
            return Err(NodeError::InvalidOutput(format!(
                "tool {} returned no data",
                self.tool
            )));
        }
        Ok(value)
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, part| match current {
        Value::Array(items) => items.get(part.parse::<usize>().ok()?),
        other => other.get(part),
    })
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl Node for ToolNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        match self.call(state).await {
            Ok(value) => Ok(StateUpdate::new().set(self.output_key.clone(), value)),
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    log::warn!("Node {} using fallback: {}", self.name, e);
                    Ok(StateUpdate::new()
                        .set(self.output_key.clone(), fallback.clone())
                        .error(&self.name, e.to_string()))
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::nodes::testing::StaticTool;
    use serde_json::json;
    use std::sync::Arc;

    async fn registry_with(tool: StaticTool) -> (ToolRegistry, Arc<StaticTool>) {
        let registry = ToolRegistry::new();
        let tool = Arc::new(tool);
        registry.register(tool.clone()).await;
        (registry, tool)
    }

    fn city_state() -> WorkflowState {
        let mut state = WorkflowState::empty();
        state.update("city", json!("Tokyo"));
        state
    }

    #[tokio::test]
    async fn test_maps_args_and_extracts() {
        let (registry, tool) = registry_with(StaticTool::ok(
            "weather_forecast",
            json!({"city": "Tokyo", "forecast": "sunny"}),
        ))
        .await;

        let node = ToolNode::new("weather", registry, "weather_forecast", "weather")
            .arg("city", "city")
            .static_arg("units", json!("metric"))
            .extract(Some("forecast".to_string()));

        let update = node.run(&city_state()).await.unwrap();
        assert_eq!(update.get("weather"), Some(&json!("sunny")));
        assert_eq!(
            tool.calls.lock().unwrap()[0],
            json!({"city": "Tokyo", "units": "metric"})
        );
    }

    #[tokio::test]
    async fn test_fallback_on_failure() {
        let (registry, _) = registry_with(StaticTool::err("weather_forecast", "timeout")).await;
        let node = ToolNode::new("weather", registry, "weather_forecast", "weather")
            .arg("city", "city")
            .fallback(Some(json!("Weather data unavailable.")));

        let update = node.run(&city_state()).await.unwrap();
        assert_eq!(update.get("weather"), Some(&json!("Weather data unavailable.")));
        let error = update.get("errors").unwrap();
        assert_eq!(error["node"], "weather");
        assert!(error["error"].as_str().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn test_fallback_on_empty_result() {
        let (registry, _) =
            registry_with(StaticTool::ok("places_search", json!({"places": []}))).await;
        let node = ToolNode::new("attractions", registry, "places_search", "attractions")
            .arg("city", "city")
            .extract(Some("places".to_string()))
            .fallback(Some(json!(["No attractions found."])));

        let update = node.run(&city_state()).await.unwrap();
        assert_eq!(update.get("attractions"), Some(&json!(["No attractions found."])));
    }

    #[tokio::test]
    async fn test_missing_arg_without_fallback() {
        let (registry, tool) = registry_with(StaticTool::ok("places_search", json!({}))).await;
        let node = ToolNode::new("attractions", registry, "places_search", "attractions")
            .arg("city", "city");

        let err = node.run(&WorkflowState::empty()).await.unwrap_err();
        assert!(matches!(err, NodeError::MissingField(f) if f == "city"));
        assert!(tool.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_tool() {
        let node = ToolNode::new("weather", ToolRegistry::new(), "weather_forecast", "weather");
        let err = node.run(&WorkflowState::empty()).await.unwrap_err();
        assert!(matches!(err, NodeError::Tool { .. }));
    }

    #[test]
    fn test_lookup() {
        let value = json!({"a": {"b": [10, 20]}});
        assert_eq!(lookup(&value, "a.b.1"), Some(&json!(20)));
        assert_eq!(lookup(&value, "a.c"), None);
    }
}
