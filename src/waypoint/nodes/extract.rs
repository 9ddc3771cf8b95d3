// SPDX-License-Identifier: MIT

//! Structured field extraction from the request query

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::adk::agent::{Agent, LlmAgent};
use crate::adk::error::NodeError;
use crate::adk::model::{GenerationConfig, Model};
use crate::adk::text;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState, QUERY_KEY};

/// State key holding every field the extractor found
pub const EXTRACTED_KEY: &str = "extracted";

/// Trip details for the travel planner
#[allow(dead_code)]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct TripInfo {
    /// Destination city, e.g. "Tokyo"
    city: Option<String>,
    /// Month of travel when no exact dates are given, e.g. "July"
    month: Option<String>,
    /// Trip start date as YYYY-MM-DD
    start_date: Option<String>,
    /// Trip end date as YYYY-MM-DD
    end_date: Option<String>,
    /// Preferred ISO currency code, e.g. "USD"
    currency: Option<String>,
}

/// General request details used by the unified assistant
#[allow(dead_code)]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct RequestInfo {
    /// One of: travel, medical, financial, general
    topic: Option<String>,
    /// Destination city when the request is about a trip
    city: Option<String>,
    /// Month of travel, e.g. "July"
    month: Option<String>,
    /// Start date as YYYY-MM-DD
    start_date: Option<String>,
    /// End date as YYYY-MM-DD
    end_date: Option<String>,
    /// Preferred ISO currency code
    currency: Option<String>,
}

/// Product details mentioned in a shopping query
#[allow(dead_code)]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct ProductInfo {
    /// Unique identifier for the product (product number)
    product_id: Option<String>,
    /// The name of the product
    product_name: Option<String>,
    /// Brief description or key features of the product
    description: Option<String>,
    /// Price of the product in USD
    tentative_price_in_usd: Option<String>,
    /// Product category such as electronics, clothing, etc.
    category: Option<String>,
    /// Average customer rating (0 to 5)
    rating: Option<f64>,
}

/// Which field set an extraction node asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSchema {
    #[default]
    Trip,
    Request,
    Product,
}

impl ExtractionSchema {
    /// JSON schema of the field set
    pub fn json_schema(&self) -> Value {
        let schema = match self {
            ExtractionSchema::Trip => schema_for!(TripInfo),
            ExtractionSchema::Request => schema_for!(RequestInfo),
            ExtractionSchema::Product => schema_for!(ProductInfo),
        };
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }

    /// Field names, sorted
    pub fn fields(&self) -> Vec<String> {
        self.json_schema()
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// One model call that turns the query into state fields.
///
/// Absent, null and blank fields are skipped so later nodes (or the
/// fill-missing node) can detect them.
pub struct ExtractNode {
    name: String,
    agent: LlmAgent,
    fields: Vec<String>,
    uppercase: Vec<String>,
}

impl ExtractNode {
    pub fn new(name: impl Into<String>, model: Arc<dyn Model>, schema: ExtractionSchema) -> Self {
        let name = name.into();
        let instruction = format!(
            "You are an information extraction assistant. Extract the fields described by this \
             JSON schema from the user query. Return only a JSON object with exactly these keys; \
             use null for anything the query does not mention. Dates must be YYYY-MM-DD.\n\n{}",
            schema.json_schema()
        );
        Self {
            agent: LlmAgent::new(name.clone(), instruction, model)
                .with_config(GenerationConfig::json()),
            name,
            fields: schema.fields(),
            uppercase: vec!["currency".to_string()],
        }
    }

    /// Restrict extraction to a subset of the schema's fields
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        if !fields.is_empty() {
            self.fields = fields;
        }
        self
    }

    /// Fields whose string values are upper-cased (currency codes)
    pub fn with_uppercase(mut self, fields: Vec<String>) -> Self {
        self.uppercase = fields;
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn normalize(&self, field: &str, value: &Value) -> Option<Value> {
        match value {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) if s.trim().eq_ignore_ascii_case("null") => None,
            Value::String(s) if self.uppercase.iter().any(|f| f == field) => {
                Some(Value::String(s.trim().to_uppercase()))
            }
            Value::String(s) => Some(Value::String(s.trim().to_string())),
            other => Some(other.clone()),
        }
    }
}

#[async_trait]
impl Node for ExtractNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let query = state
            .query()
            .ok_or_else(|| NodeError::MissingField(QUERY_KEY.to_string()))?;

        let answer = self.agent.run(format!("Query: \"{}\"", query)).await?;
        let object = text::extract_json_object(&answer).ok_or_else(|| {
            NodeError::InvalidOutput(format!(
                "expected a JSON object, got '{}'",
                text::preview(&answer, 80)
            ))
        })?;

        let mut update = StateUpdate::new();
        let mut extracted = Map::new();
        for field in &self.fields {
            if let Some(value) = object.get(field).and_then(|v| self.normalize(field, v)) {
                update.push(field.clone(), value.clone());
                extracted.insert(field.clone(), value);
            }
        }

        let found: Vec<&str> = extracted.keys().map(String::as_str).collect();
        log::info!("Node {} extracted {:?}", self.name, found);
        let message = if found.is_empty() {
            "Extracted no fields".to_string()
        } else {
            format!("Extracted fields: {}", found.join(", "))
        };

        Ok(update.set(EXTRACTED_KEY, Value::Object(extracted)).message(message))
    }
}
