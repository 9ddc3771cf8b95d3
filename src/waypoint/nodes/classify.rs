// SPDX-License-Identifier: MIT

//! Supervisor node: assigns the request a topic for routing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::adk::agent::{Agent, LlmAgent};
use crate::adk::error::NodeError;
use crate::adk::model::Model;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState, QUERY_KEY};

pub const TOPIC_KEY: &str = "topic";

/// A topic and the words that indicate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRule {
    pub topic: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TopicRule {
    pub fn new(topic: &str, keywords: &[&str]) -> Self {
        Self {
            topic: topic.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
    }
}

/// How the topic is decided
pub enum ClassifyMode {
    /// First rule with a keyword in the text wins
    Keywords,
    /// One model call constrained to the rule topics
    Model(LlmAgent),
}

pub struct ClassifyNode {
    name: String,
    mode: ClassifyMode,
    rules: Vec<TopicRule>,
    default_topic: Option<String>,
    source: String,
    output_key: String,
    keep_existing: bool,
}

impl ClassifyNode {
    pub fn keywords(name: impl Into<String>, rules: Vec<TopicRule>) -> Self {
        Self {
            name: name.into(),
            mode: ClassifyMode::Keywords,
            rules,
            default_topic: None,
            source: QUERY_KEY.to_string(),
            output_key: TOPIC_KEY.to_string(),
            keep_existing: false,
        }
    }

    pub fn model(name: impl Into<String>, model: Arc<dyn Model>, rules: Vec<TopicRule>) -> Self {
        let name = name.into();
        let mut node = Self::keywords(name.clone(), rules);
        node.mode = ClassifyMode::Model(LlmAgent::new(name, node.instruction(), model));
        node
    }

    /// Research topics of the hierarchical agent plus travel
    pub fn default_rules() -> Vec<TopicRule> {
        vec![
            TopicRule::new(
                "travel",
                &["trip", "travel", "vacation", "holiday", "itinerary", "hotel", "flight", "visit"],
            ),
            TopicRule::new("medical", &["health", "disease", "treatment"]),
            TopicRule::new("financial", &["stock", "finance", "market"]),
        ]
    }

    /// Topic used when nothing matches
    pub fn with_default(mut self, topic: Option<String>) -> Self {
        self.default_topic = topic.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        if let ClassifyMode::Model(agent) = &mut self.mode {
            agent.instruction = Self::instruction_for(&self.rules, self.default_topic.as_deref());
        }
        self
    }

    /// Keep a topic already in state when it is one of the known topics
    pub fn keep_existing(mut self, keep: bool) -> Self {
        self.keep_existing = keep;
        self
    }

    /// State path classified (default `query`)
    pub fn source(mut self, path: impl Into<String>) -> Self {
        self.source = path.into();
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Every topic this node can produce
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.rules.iter().map(|r| r.topic.to_lowercase()).collect();
        if let Some(default) = &self.default_topic {
            if !topics.contains(default) {
                topics.push(default.clone());
            }
        }
        topics
    }

    fn instruction(&self) -> String {
        Self::instruction_for(&self.rules, self.default_topic.as_deref())
    }

    fn instruction_for(rules: &[TopicRule], default_topic: Option<&str>) -> String {
        let mut lines = vec![
            "You are a supervisor that classifies a user request into exactly one topic."
                .to_string(),
            "Answer with the topic name only. Valid topics:".to_string(),
        ];
        for rule in rules {
            if rule.keywords.is_empty() {
                lines.push(format!("- {}", rule.topic));
            } else {
                lines.push(format!("- {} (e.g. {})", rule.topic, rule.keywords.join(", ")));
            }
        }
        if let Some(default) = default_topic {
            lines.push(format!("- {} (anything else)", default));
        }
        lines.join("\n")
    }

    fn classify_keywords(&self, text: &str) -> Option<String> {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&text))
            .map(|rule| rule.topic.to_lowercase())
    }
}

/// Lenient match of a model answer against the allowed topics:
/// exact, then word by word, then substring.
pub fn parse_topic(answer: &str, topics: &[String]) -> Option<String> {
    let trimmed = answer.trim().to_lowercase();

    if topics.iter().any(|t| *t == trimmed) {
        return Some(trimmed);
    }

    for word in trimmed.split(|c: char| c.is_whitespace() || c == ':' || c == ',' || c == '.') {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
        if let Some(topic) = topics.iter().find(|t| t.as_str() == word) {
            return Some(topic.clone());
        }
    }

    topics.iter().find(|t| trimmed.contains(t.as_str())).cloned()
}

#[async_trait]
impl Node for ClassifyNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let topics = self.topics();

        let existing = state
            .get_str(&self.output_key)
            .map(str::to_lowercase)
            .filter(|t| self.keep_existing && topics.contains(t));

        let topic = match existing {
            Some(topic) => {
                log::info!("Node {} keeping extracted topic '{}'", self.name, topic);
                Some(topic)
            }
            None => {
                let text = state
                    .get_str(&self.source)
                    .ok_or_else(|| NodeError::MissingField(self.source.clone()))?;
                let found = match &self.mode {
                    ClassifyMode::Keywords => self.classify_keywords(text),
                    ClassifyMode::Model(agent) => {
                        let answer = agent.run(text.to_string()).await?;
                        let parsed = parse_topic(&answer, &topics);
                        if parsed.is_none() {
                            log::warn!(
                                "Node {} could not parse topic from '{}'",
                                self.name,
                                answer
                            );
                        }
                        parsed
                    }
                };
                found.or_else(|| self.default_topic.clone())
            }
        };

        match topic {
            Some(topic) => {
                log::info!("Node {} classified topic as '{}'", self.name, topic);
                Ok(StateUpdate::new()
                    .set(self.output_key.clone(), Value::String(topic.clone()))
                    .message(format!("Topic classified as: {}", topic)))
            }
            None => {
                log::warn!("Node {} found no topic", self.name);
                Ok(StateUpdate::new().message("Topic could not be classified"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::nodes::testing::ScriptedModel;
    use crate::waypoint::workflow::state::StateSchema;
    use serde_json::json;

    fn query_state(query: &str) -> WorkflowState {
        WorkflowState::with_query(&StateSchema::default(), query)
    }

    fn research_rules() -> Vec<TopicRule> {
        vec![
            TopicRule::new("medical", &["health", "disease", "treatment"]),
            TopicRule::new("financial", &["stock", "finance", "market"]),
        ]
    }

    #[tokio::test]
    async fn test_keyword_classification() {
        let node = ClassifyNode::keywords("supervisor", research_rules())
            .with_default(Some("general".to_string()));

        let update = node
            .run(&query_state("What are the latest treatments for type 2 diabetes?"))
            .await
            .unwrap();
        assert_eq!(update.get(TOPIC_KEY), Some(&json!("medical")));
        assert_eq!(
            update.get("messages"),
            Some(&json!("Topic classified as: medical"))
        );

        let update = node.run(&query_state("How is the Stock Market doing?")).await.unwrap();
        assert_eq!(update.get(TOPIC_KEY), Some(&json!("financial")));

        let update = node.run(&query_state("History of jazz")).await.unwrap();
        assert_eq!(update.get(TOPIC_KEY), Some(&json!("general")));
    }

    #[tokio::test]
    async fn test_no_match_without_default_writes_no_topic() {
        let node = ClassifyNode::keywords("supervisor", research_rules());
        let update = node.run(&query_state("History of jazz")).await.unwrap();
        assert!(update.get(TOPIC_KEY).is_none());
    }

    #[tokio::test]
    async fn test_keep_existing_topic() {
        let mut state = query_state("Plan my trip to Tokyo in July");
        state.update(TOPIC_KEY, json!("Travel"));

        let node =
            ClassifyNode::keywords("router", ClassifyNode::default_rules()).keep_existing(true);
        let update = node.run(&state).await.unwrap();
        assert_eq!(update.get(TOPIC_KEY), Some(&json!("travel")));

        state.update(TOPIC_KEY, json!("astrology"));
        let update = node.run(&state).await.unwrap();
        assert_eq!(update.get(TOPIC_KEY), Some(&json!("travel")));
    }

    #[tokio::test]
    async fn test_model_classification() {
        let model = Arc::new(ScriptedModel::new(vec!["<think>hmm</think>Topic: Financial."]));
        let node = ClassifyNode::model("supervisor", model.clone(), research_rules());

        let update = node.run(&query_state("Should I buy bonds?")).await.unwrap();
        assert_eq!(update.get(TOPIC_KEY), Some(&json!("financial")));
        assert_eq!(model.last_prompt().as_deref(), Some("Should I buy bonds?"));
    }

    #[tokio::test]
    async fn test_missing_source() {
        let node = ClassifyNode::keywords("supervisor", research_rules());
        let err = node.run(&WorkflowState::empty()).await.unwrap_err();
        assert!(matches!(err, NodeError::MissingField(_)));
    }

    #[test]
    fn test_parse_topic() {
        let topics = vec!["medical".to_string(), "financial".to_string(), "general".to_string()];
        assert_eq!(parse_topic("medical", &topics).as_deref(), Some("medical"));
        assert_eq!(parse_topic("  GENERAL ", &topics).as_deref(), Some("general"));
        assert_eq!(
            parse_topic("The topic is: financial.", &topics).as_deref(),
            Some("financial")
        );
        assert_eq!(
            parse_topic("biomedical research", &topics).as_deref(),
            Some("medical")
        );
        assert_eq!(parse_topic("sports", &topics), None);
    }

    #[test]
    fn test_topics_include_default() {
        let node = ClassifyNode::keywords("s", research_rules())
            .with_default(Some("General".to_string()));
        assert_eq!(node.topics(), vec!["medical", "financial", "general"]);
    }
}
