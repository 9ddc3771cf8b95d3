// SPDX-License-Identifier: MIT

//! Asking for fields extraction could not find

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::adk::error::NodeError;
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState};

/// Source of values for missing fields
#[async_trait]
pub trait FieldPrompter: Send + Sync {
    /// Value for `field`, or `None` when the user supplies nothing
    async fn prompt(&self, field: &str, label: &str) -> Option<String>;
}

type LineSource = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;

/// Asks on the terminal.
///
/// One reader is kept for the whole run so piped answers are consumed
/// line by line across prompts.
pub struct StdinPrompter {
    lines: Mutex<LineSource>,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    /// Read answers from any line source instead of stdin
    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

async fn show_label(label: &str) -> std::io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(format!("{}: ", label).as_bytes()).await?;
    stderr.flush().await
}

#[async_trait]
impl FieldPrompter for StdinPrompter {
    async fn prompt(&self, field: &str, label: &str) -> Option<String> {
        let mut lines = self.lines.lock().await;
        if let Err(e) = show_label(label).await {
            log::warn!("Could not show prompt for {}: {}", field, e);
        }

        match lines.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()).filter(|s| !s.is_empty()),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Could not read {} from stdin: {}", field, e);
                None
            }
        }
    }
}

/// Values given up front (CLI flags, HTTP request), with an optional fallback
#[derive(Default)]
pub struct PresetPrompter {
    values: HashMap<String, String>,
    fallback: Option<Arc<dyn FieldPrompter>>,
}

impl PresetPrompter {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self {
            values,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FieldPrompter>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[async_trait]
impl FieldPrompter for PresetPrompter {
    async fn prompt(&self, field: &str, label: &str) -> Option<String> {
        if let Some(value) = self.values.get(field).filter(|v| !v.trim().is_empty()) {
            return Some(value.trim().to_string());
        }
        match &self.fallback {
            Some(fallback) => fallback.prompt(field, label).await,
            None => None,
        }
    }
}

/// Never supplies anything
pub struct NoPrompter;

#[async_trait]
impl FieldPrompter for NoPrompter {
    async fn prompt(&self, _field: &str, _label: &str) -> Option<String> {
        None
    }
}

/// Fills absent fields from a `FieldPrompter`
pub struct FillMissingNode {
    name: String,
    /// `(field, label)` pairs
    fields: Vec<(String, String)>,
    prompter: Arc<dyn FieldPrompter>,
    required: bool,
}

impl FillMissingNode {
    pub fn new(
        name: impl Into<String>,
        fields: Vec<(String, String)>,
        prompter: Arc<dyn FieldPrompter>,
    ) -> Self {
        Self {
            name: name.into(),
            fields,
            prompter,
            required: false,
        }
    }

    /// Fail with `MissingField` when a field is still absent afterwards
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

#[async_trait]
impl Node for FillMissingNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        let mut update = StateUpdate::new();
        let mut filled = Vec::new();
        let mut still_missing = Vec::new();

        for (field, label) in &self.fields {
            if state.has(field) {
                continue;
            }
            match self.prompter.prompt(field, label).await {
                Some(value) => {
                    update.push(field.clone(), Value::String(value));
                    filled.push(field.as_str());
                }
                None => still_missing.push(field.as_str()),
            }
        }

        if !still_missing.is_empty() {
            log::warn!("Node {} could not fill {:?}", self.name, still_missing);
            if self.required {
                return Err(NodeError::MissingField(still_missing.join(", ")));
            }
        }

        if !filled.is_empty() {
            update = update.message(format!("Filled missing fields: {}", filled.join(", ")));
        }
        Ok(update)
    }
}
