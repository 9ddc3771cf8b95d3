// SPDX-License-Identifier: MIT

//! Aggregation node: one model call over a template rendered from state

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::adk::agent::{Agent, LlmAgent};
use crate::adk::error::NodeError;
use crate::adk::model::Model;
use crate::waypoint::nodes::display_value;
use crate::waypoint::workflow::artifact::SUMMARY_KEY;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState};

pub const SUMMARY_FALLBACK: &str = "Summary generation failed. Please try again.";

pub const TRAVEL_TEMPLATE: &str =
    "Create a concise travel summary for a trip to {city} in {month}.\n\
Weather: {weather}\n\
Top attractions: {attractions}\n\
Hotel cost: {hotel_cost} {currency} for {nights} nights\n\
Total cost in {home_currency}: {total_cost}\n\
Itinerary:\n{itinerary}";

pub const RESEARCH_TEMPLATE: &str = "Create a short summary from: {research}";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)\}").expect("valid placeholder regex"));

/// Fill `{path}` placeholders from state; absent values render as `N/A`
pub fn render_template(template: &str, state: &WorkflowState) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            state
                .get_path(&caps[1])
                .map(display_value)
                .unwrap_or_else(|| "N/A".to_string())
        })
        .into_owned()
}

pub struct SummaryNode {
    name: String,
    agent: LlmAgent,
    template: String,
    /// State field whose value picks an entry of `templates`
    select_by: Option<String>,
    templates: HashMap<String, String>,
    fallback: Option<String>,
    output_key: String,
}

impl SummaryNode {
    pub fn new(
        name: impl Into<String>,
        model: Arc<dyn Model>,
        template: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            agent: LlmAgent::new(
                name.clone(),
                "You write short, factual summaries for end users.",
                model,
            ),
            name,
            template: template.into(),
            select_by: None,
            templates: HashMap::new(),
            fallback: Some(SUMMARY_FALLBACK.to_string()),
            output_key: SUMMARY_KEY.to_string(),
        }
    }

    pub fn select_by(mut self, field: impl Into<String>) -> Self {
        self.select_by = Some(field.into());
        self
    }

    pub fn template_for(mut self, key: &str, template: impl Into<String>) -> Self {
        self.templates.insert(key.trim().to_lowercase(), template.into());
        self
    }

    /// Text written when the model call fails; `None` fails the node instead
    pub fn fallback(mut self, text: Option<String>) -> Self {
        self.fallback = text;
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    fn template(&self, state: &WorkflowState) -> &str {
        self.select_by
            .as_deref()
            .and_then(|field| state.get_str(field))
            .and_then(|key| self.templates.get(&key.to_lowercase()))
            .map(String::as_str)
            .unwrap_or(&self.template)
    }
}

#[async_trait]
impl Node for SummaryNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let prompt = render_template(self.template(state), state);
        log::debug!("Node {} prompt: {}", self.name, prompt);

        match self.agent.run(prompt).await {
            Ok(summary) => Ok(StateUpdate::new()
                .set(self.output_key.clone(), Value::String(summary.clone()))
                .message(format!("[Summary] {}", summary))),
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    log::error!("Node {}: summary generation failed: {}", self.name, e);
                    Ok(StateUpdate::new()
                        .set(self.output_key.clone(), Value::String(fallback.clone()))
                        .error(&self.name, e.to_string()))
                }
                None => Err(e.into()),
            },
        }
    }
}
