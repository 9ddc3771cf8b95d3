// SPDX-License-Identifier: MIT

//! Model module - defines LLM model trait and implementations
//!
//! This module provides the core Model trait and shared types.
//! Model implementations are in their own submodules:
//! - [openai] - OpenAI-compatible chat completions (OpenAI, Groq)
//! - [gemini] - Google's Gemini API

pub mod gemini;
pub mod openai;

use crate::adk::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// Ask the provider for a JSON object instead of free text
    #[serde(default)]
    pub json_output: bool,
}

impl GenerationConfig {
    pub fn json() -> Self {
        Self {
            json_output: true,
            ..Self::default()
        }
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Model,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// Parts of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// Reasoning content returned separately by thinking models
    Thinking(String),
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenated text parts, thinking parts excluded
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Thinking(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    /// Model identifier sent to the provider
    fn model_name(&self) -> &str;

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError>;
}

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Groq,
    Gemini,
}

impl Provider {
    /// Infer the provider from the model name prefix
    pub fn infer_from_model(model_name: &str) -> Self {
        let name = model_name.to_lowercase();
        if name.starts_with("gemini") || name.starts_with("models/gemini") {
            Provider::Gemini
        } else if name.starts_with("gpt") || name.starts_with("o1") || name.starts_with("o3") {
            Provider::OpenAI
        } else if name.starts_with("deepseek-r1-distill")
            || name.starts_with("llama")
            || name.starts_with("mixtral")
            || name.starts_with("qwen")
        {
            Provider::Groq
        } else {
            Provider::Gemini
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Groq => "deepseek-r1-distill-llama-70b",
            Provider::Gemini => "gemini-1.5-flash",
        }
    }
}

impl FromStr for Provider {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "groq" => Ok(Provider::Groq),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(ModelError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAI => write!(f, "OpenAI"),
            Provider::Groq => write!(f, "Groq"),
            Provider::Gemini => write!(f, "Gemini"),
        }
    }
}
