// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::adk::error::NodeError;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::registry::ToolRegistry;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState};

pub const DEFAULT_TRIP_CURRENCY: &str = "USD";

/// Converts `hotel_cost` from the trip currency into the home currency.
///
/// On failure `exchange_rate` is written as null, the error is recorded
/// and `total_cost` stays absent.
pub struct CurrencyNode {
    name: String,
    registry: ToolRegistry,
    tool: String,
    home_currency: String,
}

impl CurrencyNode {
    pub fn new(name: impl Into<String>, registry: ToolRegistry, home_currency: &str) -> Self {
        Self {
            name: name.into(),
            registry,
            tool: "exchange_rate".to_string(),
            home_currency: home_currency.trim().to_uppercase(),
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    async fn fetch_rate(&self, base: &str) -> Result<f64, NodeError> {
        if base == self.home_currency {
            return Ok(1.0);
        }
        let tool = self
            .registry
            .require(&self.tool)
            .await
            .map_err(|e| NodeError::tool(&self.tool, e.to_string()))?;
        let result = tool
            .execute(json!({ "base": base, "target": self.home_currency }))
            .await
            .map_err(|e| NodeError::tool(&self.tool, e.to_string()))?;
        result
            .get("rate")
            .and_then(Value::as_f64)
            .filter(|r| *r > 0.0)
            .ok_or_else(|| NodeError::InvalidOutput(format!("no usable rate in {}", result)))
    }
}

#[async_trait]
impl Node for CurrencyNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let base = state
            .get_str("currency")
            .unwrap_or(DEFAULT_TRIP_CURRENCY)
            .to_uppercase();
        let update = StateUpdate::new().set("home_currency", json!(self.home_currency));

        match self.fetch_rate(&base).await {
            Ok(rate) => {
                let mut update = update.set("exchange_rate", json!(rate));
                match state.get_f64("hotel_cost") {
                    Some(hotel_cost) => {
                        let total = hotel_cost * rate;
                        update = update.set("total_cost", json!(total)).message(format!(
                            "Converted {:.2} {} to {:.2} {}",
                            hotel_cost, base, total, self.home_currency
                        ));
                    }
                    None => {
                        update = update.error(&self.name, "hotel_cost missing, total not computed");
                    }
                }
                Ok(update)
            }
            Err(e) => {
                log::error!("Node {}: currency conversion failed: {}", self.name, e);
                Ok(update
                    .set("exchange_rate", Value::Null)
                    .error(&self.name, format!("Currency conversion failed: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::nodes::testing::StaticTool;
    use std::sync::Arc;

    fn trip_state(currency: Option<&str>) -> WorkflowState {
        let mut state = WorkflowState::empty();
        state.update("hotel_cost", json!(500.0));
        if let Some(c) = currency {
            state.update("currency", json!(c));
        }
        state
    }

    async fn node_with(tool: StaticTool) -> (CurrencyNode, Arc<StaticTool>) {
        let registry = ToolRegistry::new();
        let tool = Arc::new(tool);
        registry.register(tool.clone()).await;
        (CurrencyNode::new("currency", registry, "inr"), tool)
    }

    #[tokio::test]
    async fn test_converts_total() {
        let (node, tool) =
            node_with(StaticTool::ok("exchange_rate", json!({"rate": 83.0}))).await;

        let update = node.run(&trip_state(None)).await.unwrap();
        assert_eq!(update.get("exchange_rate"), Some(&json!(83.0)));
        assert_eq!(update.get("total_cost"), Some(&json!(41500.0)));
        assert_eq!(update.get("home_currency"), Some(&json!("INR")));
        assert_eq!(
            tool.calls.lock().unwrap()[0],
            json!({"base": "USD", "target": "INR"})
        );
    }

    #[tokio::test]
    async fn test_failure_writes_null_rate() {
        let (node, _) = node_with(StaticTool::err("exchange_rate", "invalid-key")).await;

        let update = node.run(&trip_state(Some("eur"))).await.unwrap();
        assert_eq!(update.get("exchange_rate"), Some(&Value::Null));
        assert!(update.get("total_cost").is_none());
        assert!(update.get("errors").unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("invalid-key"));
    }

    #[tokio::test]
    async fn test_same_currency_skips_lookup() {
        let (node, tool) = node_with(StaticTool::err("exchange_rate", "unused")).await;
        let update = node.run(&trip_state(Some("INR"))).await.unwrap();
        assert_eq!(update.get("exchange_rate"), Some(&json!(1.0)));
        assert_eq!(update.get("total_cost"), Some(&json!(500.0)));
        assert!(tool.calls.lock().unwrap().is_empty());
    }
}
