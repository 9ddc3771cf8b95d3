// SPDX-License-Identifier: MIT

//! OpenAI-compatible chat completions
//!
//! Used for OpenAI itself and for Groq, which serves the same API under a
//! different base URL.

use super::{Content, GenerationConfig, Model, Part, Provider, Role};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat-completions model for any OpenAI-compatible endpoint
pub struct OpenAIModel {
    client: Client,
    provider: Provider,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    pub fn new(
        client: Client,
        provider: Provider,
        model_name: String,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, ModelError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ModelError::ApiKeyMissing(provider.to_string()))?;
        let base_url = base_url.unwrap_or_else(|| match provider {
            Provider::Groq => GROQ_BASE_URL.to_string(),
            _ => OPENAI_BASE_URL.to_string(),
        });

        Ok(Self {
            client,
            provider,
            api_key,
            model_name,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert internal Content to an OpenAI message
    fn content_to_message(content: &Content) -> serde_json::Value {
        let role = match content.role {
            Role::System => "system",
            Role::User => "user",
            Role::Model => "assistant",
        };
        json!({
            "role": role,
            "content": content.text()
        })
    }

    fn build_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> =
            history.iter().map(Self::content_to_message).collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
            if cfg.json_output {
                body["response_format"] = json!({ "type": "json_object" });
            }
        }

        body
    }

    /// Parse a chat-completions response into Content
    fn parse_response(response: &serde_json::Value) -> Result<Content, ModelError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let message = &choice["message"];
        let mut parts = Vec::new();

        // Groq reasoning models return their chain of thought separately
        if let Some(reasoning) = message["reasoning"].as_str() {
            if !reasoning.is_empty() {
                parts.push(Part::Thinking(reasoning.to_string()));
            }
        }

        if let Some(content) = message["content"].as_str() {
            if !content.is_empty() {
                parts.push(Part::Text(content.to_string()));
            }
        }

        if parts.is_empty() {
            return Err(ModelError::InvalidResponse(format!(
                "empty message: {}",
                message
            )));
        }

        Ok(Content {
            role: Role::Model,
            parts,
        })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(history, config);

        log::debug!(
            "{} request body: {}",
            self.provider,
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let message = resp.text().await?;
            return Err(ModelError::Api {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("{} response: {}", self.provider, resp_json);

        Self::parse_response(&resp_json)
    }
}
