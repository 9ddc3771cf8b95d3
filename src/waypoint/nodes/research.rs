// SPDX-License-Identifier: MIT

//! Domain research worker

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::adk::agent::{Agent, LlmAgent};
use crate::adk::error::NodeError;
use crate::adk::model::Model;
use crate::adk::text;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState, QUERY_KEY};

pub const RESEARCH_KEY: &str = "research";

/// Asks the model to research the query within one domain.
///
/// Writes `research` and `research_domain` and appends
/// `[<Domain> Research] <text>` to `messages`.
pub struct ResearchNode {
    name: String,
    domain: String,
    agent: LlmAgent,
}

impl ResearchNode {
    pub fn new(name: impl Into<String>, model: Arc<dyn Model>, domain: &str) -> Self {
        let name = name.into();
        let domain = domain.trim().to_lowercase();
        let instruction = format!(
            "You are a {} research specialist. Answer factually and concisely.",
            domain
        );
        Self {
            agent: LlmAgent::new(name.clone(), instruction, model),
            name,
            domain,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.agent.instruction = instruction.into();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn label(&self) -> String {
        let mut chars = self.domain.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => "General".to_string(),
        }
    }
}

#[async_trait]
impl Node for ResearchNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let query = state
            .get_str(QUERY_KEY)
            .ok_or_else(|| NodeError::MissingField(QUERY_KEY.to_string()))?;

        let prompt = format!("Research this {} topic: {}", self.domain, query);
        let answer = self.agent.run(prompt).await?;
        log::info!(
            "Node {} researched '{}': {}",
            self.name,
            text::preview(query, 60),
            text::preview(&answer, 80)
        );

        Ok(StateUpdate::new()
            .set(RESEARCH_KEY, Value::String(answer.clone()))
            .set("research_domain", Value::String(self.domain.clone()))
            .message(format!("[{} Research] {}", self.label(), answer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::nodes::testing::ScriptedModel;
    use crate::waypoint::workflow::state::StateSchema;
    use serde_json::json;

    #[tokio::test]
    async fn test_medical_research() {
        let model = Arc::new(ScriptedModel::new(vec![
            "<think>recall trials</think>GLP-1 agonists are widely used.",
        ]));
        let node = ResearchNode::new("medical_research", model.clone(), "Medical");
        let state = WorkflowState::with_query(&StateSchema::default(), "diabetes treatment");

        let update = node.run(&state).await.unwrap();
        assert_eq!(
            model.last_prompt().as_deref(),
            Some("Research this medical topic: diabetes treatment")
        );
        assert_eq!(
            update.get(RESEARCH_KEY),
            Some(&json!("GLP-1 agonists are widely used."))
        );
        assert_eq!(update.get("research_domain"), Some(&json!("medical")));
        assert_eq!(
            update.get("messages"),
            Some(&json!("[Medical Research] GLP-1 agonists are widely used."))
        );
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let node = ResearchNode::new("r", Arc::new(ScriptedModel::failing("down")), "financial");
        let state = WorkflowState::with_query(&StateSchema::default(), "bonds");
        let err = node.run(&state).await.unwrap_err();
        assert!(matches!(err, NodeError::Model(_)));
    }

    #[tokio::test]
    async fn test_requires_query() {
        let node = ResearchNode::new("r", Arc::new(ScriptedModel::new(vec![])), "general");
        assert!(matches!(
            node.run(&WorkflowState::empty()).await.unwrap_err(),
            NodeError::MissingField(_)
        ));
    }
}
