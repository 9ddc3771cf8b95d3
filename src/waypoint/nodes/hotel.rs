// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use crate::adk::error::NodeError;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState};

/// Hotel cost as nightly rate times the number of nights.
///
/// Nights come from `start_date`/`end_date` when both parse as
/// `YYYY-MM-DD` and the span is positive, otherwise the default.
pub struct HotelEstimateNode {
    name: String,
    nightly_rate: f64,
    default_nights: u32,
}

impl HotelEstimateNode {
    pub fn new(name: impl Into<String>, nightly_rate: f64, default_nights: u32) -> Self {
        Self {
            name: name.into(),
            nightly_rate,
            default_nights: default_nights.max(1),
        }
    }

    pub fn nights(&self, state: &WorkflowState) -> u32 {
        let parse = |key: &str| {
            state
                .get_str(key)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        match (parse("start_date"), parse("end_date")) {
            (Some(start), Some(end)) => {
                let days = (end - start).num_days();
                if days > 0 {
                    u32::try_from(days).unwrap_or(self.default_nights)
                } else {
                    log::warn!(
                        "Node {}: end date is not after start date, using {} nights",
                        self.name,
                        self.default_nights
                    );
                    self.default_nights
                }
            }
            _ => self.default_nights,
        }
    }
}

#[async_trait]
impl Node for HotelEstimateNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let nights = self.nights(state);
        let cost = self.nightly_rate * f64::from(nights);
        log::info!("Node {} estimated {:.2} for {} nights", self.name, cost, nights);

        Ok(StateUpdate::new()
            .set("nights", json!(nights))
            .set("hotel_cost", json!(cost))
            .message(format!(
                "Estimated hotel cost: {:.2} for {} nights",
                cost, nights
            )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(start: &str, end: &str) -> WorkflowState {
        let mut state = WorkflowState::empty();
        state.update("start_date", json!(start));
        state.update("end_date", json!(end));
        state
    }

    #[tokio::test]
    async fn test_default_is_five_nights_at_100() {
        let node = HotelEstimateNode::new("hotel", 100.0, 5);
        let update = node.run(&WorkflowState::empty()).await.unwrap();
        assert_eq!(update.get("hotel_cost"), Some(&json!(500.0)));
        assert_eq!(update.get("nights"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_nights_from_dates() {
        let node = HotelEstimateNode::new("hotel", 120.0, 5);
        let update = node.run(&dated("2025-07-15", "2025-07-20")).await.unwrap();
        assert_eq!(update.get("nights"), Some(&json!(5)));
        assert_eq!(update.get("hotel_cost"), Some(&json!(600.0)));

        assert_eq!(node.nights(&dated("2025-07-01", "2025-07-03")), 2);
    }

    #[test]
    fn test_bad_or_reversed_dates_use_default() {
        let node = HotelEstimateNode::new("hotel", 100.0, 4);
        assert_eq!(node.nights(&dated("2025-07-20", "2025-07-15")), 4);
        assert_eq!(node.nights(&dated("2025-07-20", "2025-07-20")), 4);
        assert_eq!(node.nights(&dated("July 1", "July 5")), 4);
    }
}
