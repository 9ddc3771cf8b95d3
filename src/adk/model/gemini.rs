// SPDX-License-Identifier: MIT

//! Gemini Model - Google's Gemini API implementation

use super::{Content, GenerationConfig, Model, Part, Role};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(
        client: Client,
        model_name: String,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, ModelError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ModelError::ApiKeyMissing("Gemini".to_string()))?;
        let base_url = base_url.unwrap_or_else(|| GEMINI_BASE_URL.to_string());
        Ok(Self {
            client,
            api_key,
            model_name,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn build_body(history: &[Content], config: Option<&GenerationConfig>) -> serde_json::Value {
        // System messages go to systemInstruction, the rest become contents
        let system_text: Vec<String> = history
            .iter()
            .filter(|c| c.role == Role::System)
            .map(|c| c.text())
            .collect();

        let contents: Vec<serde_json::Value> = history
            .iter()
            .filter(|c| c.role != Role::System)
            .map(|c| {
                let role = match c.role {
                    Role::Model => "model",
                    _ => "user",
                };
                json!({ "role": role, "parts": [{ "text": c.text() }] })
            })
            .collect();

        let mut body = json!({ "contents": contents });

        if !system_text.is_empty() {
            body["systemInstruction"] = json!({
                "parts": [{ "text": system_text.join("\n\n") }]
            });
        }

        if let Some(cfg) = config {
            let mut generation = serde_json::Map::new();
            if let Some(temp) = cfg.temperature {
                generation.insert("temperature".to_string(), json!(temp));
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                generation.insert("maxOutputTokens".to_string(), json!(max_tokens));
            }
            if let Some(top_p) = cfg.top_p {
                generation.insert("topP".to_string(), json!(top_p));
            }
            if cfg.json_output {
                generation.insert(
                    "responseMimeType".to_string(),
                    json!("application/json"),
                );
            }
            if !generation.is_empty() {
                body["generationConfig"] = serde_json::Value::Object(generation);
            }
        }

        body
    }

    fn parse_response(resp_json: &serde_json::Value) -> Result<Content, ModelError> {
        let candidate = resp_json["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("no candidates in response".to_string()))?;

        if let Some(finish_reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
            log::debug!("Gemini finish reason: {}", finish_reason);
            if finish_reason == "SAFETY" {
                return Err(ModelError::InvalidResponse(
                    "response blocked by safety filters".to_string(),
                ));
            }
        }

        let parts_json = candidate["content"]["parts"].as_array().ok_or_else(|| {
            ModelError::InvalidResponse(format!("no parts in candidate: {}", candidate))
        })?;

        let parts: Vec<Part> = parts_json
            .iter()
            .filter_map(|p| {
                let text = p["text"].as_str()?.to_string();
                if p["thought"].as_bool() == Some(true) {
                    Some(Part::Thinking(text))
                } else {
                    Some(Part::Text(text))
                }
            })
            .collect();

        Ok(Content {
            role: Role::Model,
            parts,
        })
    }
}

#[async_trait]
impl Model for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model_name
        );
        let body = Self::build_body(history, config);

        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited {
                retry_after_secs: None,
            });
        }
        if !status.is_success() {
            let message = resp.text().await?;
            return Err(ModelError::Api {
                provider: "Gemini".to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Gemini response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
