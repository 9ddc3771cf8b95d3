// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::adk::error::NodeError;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState};

pub const NO_ITINERARY: &str = "Itinerary could not be generated due to missing attraction data.";
const NO_ATTRACTIONS: &str = "No attractions found.";

/// One `Day n: Visit <place>` line per attraction
pub struct ItineraryNode {
    name: String,
    source: String,
    max_days: Option<usize>,
}

impl ItineraryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: "attractions".to_string(),
            max_days: None,
        }
    }

    pub fn source(mut self, path: impl Into<String>) -> Self {
        self.source = path.into();
        self
    }

    pub fn max_days(mut self, days: Option<usize>) -> Self {
        self.max_days = days.filter(|d| *d > 0);
        self
    }
}

#[async_trait]
impl Node for ItineraryNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let places: Vec<String> = state
            .get_string_list(&self.source)
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty() && p != NO_ATTRACTIONS)
            .take(self.max_days.unwrap_or(usize::MAX))
            .collect();

        if places.is_empty() {
            log::warn!("Node {}: no attractions to plan from", self.name);
            return Ok(StateUpdate::new().set("itinerary", Value::String(NO_ITINERARY.to_string())));
        }

        let itinerary = places
            .iter()
            .enumerate()
            .map(|(i, place)| format!("Day {}: Visit {}", i + 1, place))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(StateUpdate::new()
            .set("itinerary", Value::String(itinerary))
            .message(format!("Itinerary planned for {} days", places.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_attractions(value: Value) -> WorkflowState {
        let mut state = WorkflowState::empty();
        state.update("attractions", value);
        state
    }

    #[tokio::test]
    async fn test_day_lines() {
        let node = ItineraryNode::new("itinerary");
        let update = node
            .run(&with_attractions(json!(["Senso-ji", "Meiji Shrine", "Tokyo Tower"])))
            .await
            .unwrap();
        assert_eq!(
            update.get("itinerary"),
            Some(&json!(
                "Day 1: Visit Senso-ji\nDay 2: Visit Meiji Shrine\nDay 3: Visit Tokyo Tower"
            ))
        );
    }

    #[tokio::test]
    async fn test_fallback_when_no_attractions() {
        let node = ItineraryNode::new("itinerary");
        for state in [
            WorkflowState::empty(),
            with_attractions(json!(["No attractions found."])),
            with_attractions(json!([])),
        ] {
            let update = node.run(&state).await.unwrap();
            assert_eq!(update.get("itinerary"), Some(&json!(NO_ITINERARY)));
        }
    }

    #[tokio::test]
    async fn test_max_days() {
        let node = ItineraryNode::new("itinerary").max_days(Some(1));
        let update = node.run(&with_attractions(json!(["A", "B"]))).await.unwrap();
        assert_eq!(update.get("itinerary"), Some(&json!("Day 1: Visit A")));
    }
}
