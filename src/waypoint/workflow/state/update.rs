// SPDX-License-Identifier: MIT

//! Node output: an ordered list of state writes

use serde_json::{json, Value};

use super::store::{ERRORS_KEY, MESSAGES_KEY};

/// Writes a node wants applied to the workflow state.
///
/// The executor applies them in order through the state's reducers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    writes: Vec<(String, Value)>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style write
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.writes.push((key.into(), value));
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.writes.push((key.into(), value));
    }

    /// Append a line to `messages`
    pub fn message(self, text: impl Into<String>) -> Self {
        self.set(MESSAGES_KEY, Value::String(text.into()))
    }

    /// Record a degraded result in `errors` without failing the node
    pub fn error(self, node: &str, message: impl Into<String>) -> Self {
        self.set(
            ERRORS_KEY,
            json!({ "node": node, "error": message.into() }),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Keys touched by this update, in write order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.writes.iter().map(|(k, _)| k.as_str())
    }

    /// Value of the last write to `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.writes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl IntoIterator for StateUpdate {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}
