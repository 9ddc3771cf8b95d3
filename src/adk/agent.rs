// SPDX-License-Identifier: MIT

//! Agent module - prompt-in, text-out model wrappers
//!
//! Nodes that need a model call hold an `Agent` rather than a raw `Model`,
//! so instructions and generation settings travel with it.

use crate::adk::error::ModelError;
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::adk::text;
use async_trait::async_trait;
use std::sync::Arc;

/// Core agent trait
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent name
    fn name(&self) -> &str;

    /// Run the agent with the given input and return its text answer
    async fn run(&self, input: String) -> Result<String, ModelError>;
}

/// Single-turn LLM agent: system instruction + user input, one model call
pub struct LlmAgent {
    pub name: String,
    pub instruction: String,
    pub model: Arc<dyn Model>,
    pub config: Option<GenerationConfig>,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        model: Arc<dyn Model>,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            model,
            config: None,
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: String) -> Result<String, ModelError> {
        let mut history = Vec::with_capacity(2);
        if !self.instruction.is_empty() {
            history.push(Content::system(self.instruction.clone()));
        }
        history.push(Content::user(input));

        log::info!(
            "Agent {} calling model {}",
            self.name,
            self.model.model_name()
        );
        let response = self
            .model
            .generate_content(&history, self.config.as_ref())
            .await?;

        let answer = text::strip_think_tags(&response.text());
        if answer.is_empty() {
            log::warn!("Agent {} received an empty answer", self.name);
            return Err(ModelError::InvalidResponse("empty answer".to_string()));
        }

        log::info!(
            "Agent {} returning text response (length: {}, preview: '{}')",
            self.name,
            answer.len(),
            text::preview(&answer, 100)
        );
        Ok(answer)
    }
}
