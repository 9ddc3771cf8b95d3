// SPDX-License-Identifier: MIT

//! Built-in node implementations
//!
//! Each node reads what it needs from the state and returns a
//! `StateUpdate`; none of them touch the state directly.

pub mod classify;
pub mod currency;
pub mod extract;
pub mod hotel;
pub mod itinerary;
pub mod missing;
pub mod output;
pub mod research;
pub mod summary;
pub mod tool_node;

pub use classify::{ClassifyMode, ClassifyNode, TopicRule};
pub use currency::CurrencyNode;
pub use extract::{ExtractNode, ExtractionSchema};
pub use hotel::HotelEstimateNode;
pub use itinerary::ItineraryNode;
pub use missing::{FieldPrompter, FillMissingNode, NoPrompter, PresetPrompter, StdinPrompter};
pub use output::PersistNode;
pub use research::ResearchNode;
pub use summary::SummaryNode;
pub use tool_node::ToolNode;

use serde_json::Value;

/// Render a state value as prompt or message text
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) if s.trim().is_empty() => "N/A".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() != 0.0 => format!("{:.2}", f),
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Array(items) if items.is_empty() => "N/A".to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::adk::error::{ModelError, WaypointError};
    use crate::adk::model::{Content, GenerationConfig, Model};
    use crate::adk::tool::Tool;

    /// Replies with queued answers in order and records each user prompt
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate_content(
            &self,
            history: &[Content],
            _config: Option<&GenerationConfig>,
        ) -> Result<Content, ModelError> {
            if let Some(last) = history.last() {
                self.prompts.lock().unwrap().push(last.text());
            }
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(Content::model(text)),
                Some(Err(message)) => Err(ModelError::Api {
                    provider: "scripted".to_string(),
                    status: 500,
                    message,
                }),
                None => Err(ModelError::InvalidResponse("script exhausted".to_string())),
            }
        }
    }

    /// Returns a fixed result and records its inputs
    pub struct StaticTool {
        name: String,
        result: Result<Value, String>,
        pub calls: Mutex<Vec<Value>>,
    }

    impl StaticTool {
        pub fn ok(name: &str, result: Value) -> Self {
            Self {
                name: name.to_string(),
                result: Ok(result),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn err(name: &str, message: &str) -> Self {
            Self {
                name: name.to_string(),
                result: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "static test tool"
        }

        fn schema(&self) -> &Value {
            static SCHEMA: once_cell::sync::Lazy<Value> =
                once_cell::sync::Lazy::new(|| json!({"type": "object"}));
            &SCHEMA
        }

        async fn execute(&self, input: Value) -> Result<Value, WaypointError> {
            self.calls.lock().unwrap().push(input);
            self.result
                .clone()
                .map_err(|message| WaypointError::api(self.name.clone(), message))
        }
    }
}
