// SPDX-License-Identifier: MIT

use crate::adk::error::WaypointError;
use crate::adk::tool::Tool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type ToolMap = BTreeMap<String, Arc<dyn Tool>>;

/// Tools available to tool and currency nodes, keyed by tool name.
///
/// Clones share the same map, so tools registered after a workflow is
/// built are still visible to its nodes.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<RwLock<ToolMap>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `tool`, replacing any tool of the same name
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.inner.write().await.insert(name.clone(), tool).is_some() {
            log::debug!("Tool '{}' replaced", name);
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.inner.read().await.get(name).cloned()
    }

    pub async fn require(&self, name: &str) -> Result<Arc<dyn Tool>, WaypointError> {
        self.get(name)
            .await
            .ok_or_else(|| WaypointError::tool_not_found(name))
    }

    pub async fn names(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::nodes::testing::StaticTool;
    use serde_json::json;

    fn tool(name: &str) -> Arc<dyn Tool> {
        Arc::new(StaticTool::ok(name, json!({})))
    }

    #[tokio::test]
    async fn test_lookup_by_name() {
        let registry = ToolRegistry::new();
        registry.register(tool("weather_forecast")).await;

        assert_eq!(
            registry.get("weather_forecast").await.unwrap().name(),
            "weather_forecast"
        );
        assert!(registry.get("weather").await.is_none());
        match registry.require("places_search").await {
            Err(WaypointError::ToolNotFound { name }) => assert_eq!(name, "places_search"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected missing tool"),
        }
    }

    #[tokio::test]
    async fn test_clones_share_tools() {
        let registry = ToolRegistry::new();
        let shared = registry.clone();
        shared.register(tool("places_search")).await;
        shared.register(tool("exchange_rate")).await;
        registry.register(tool("exchange_rate")).await;

        assert_eq!(registry.names().await, vec!["exchange_rate", "places_search"]);
    }
}
