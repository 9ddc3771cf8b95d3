// SPDX-License-Identifier: MIT

use crate::adk::error::WaypointError;
use async_trait::async_trait;
use serde_json::Value;

/// An external data source callable with JSON arguments.
///
/// Specialist nodes wrap tools so the HTTP plumbing (weather, places,
/// exchange rates) stays swappable in tests.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given input and return the result
    async fn execute(&self, input: Value) -> Result<Value, WaypointError>;
}

/// Read a required string argument from tool input
pub fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, WaypointError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| WaypointError::other(format!("missing required argument '{}'", key)))
}
