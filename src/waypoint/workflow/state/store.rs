// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use super::schema::{FieldType, ReducerType, StateSchema};
use super::update::StateUpdate;

/// The raw request text
pub const QUERY_KEY: &str = "query";
/// Running log of node messages (append)
pub const MESSAGES_KEY: &str = "messages";
/// Recorded node failures (append)
pub const ERRORS_KEY: &str = "errors";

/// Accumulating workflow state.
///
/// Writes go through per-key reducers and no write removes a key, so the
/// key set only ever grows during a run.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    fields: BTreeMap<String, Value>,
    reducers: HashMap<String, ReducerType>,
    types: HashMap<String, FieldType>,
}

impl WorkflowState {
    /// Create a new WorkflowState from a schema, applying defaults
    pub fn new(schema: &StateSchema) -> Self {
        let mut state = Self::empty();

        for (name, def) in &schema.fields {
            if let Some(default) = &def.default {
                state.fields.insert(name.clone(), default.clone());
            }
            state.reducers.insert(name.clone(), def.reducer);
            state.types.insert(name.clone(), def.field_type.clone());
        }

        state.reserve_keys();
        state
    }

    /// Create a state with no fields; only the reserved keys have reducers
    pub fn empty() -> Self {
        let mut state = Self {
            fields: BTreeMap::new(),
            reducers: HashMap::new(),
            types: HashMap::new(),
        };
        state.reserve_keys();
        state
    }

    /// `query` is write-once and the logs are append-only, whatever a schema says
    fn reserve_keys(&mut self) {
        for (key, reducer, field_type) in [
            (QUERY_KEY, ReducerType::First, FieldType::String),
            (MESSAGES_KEY, ReducerType::Append, FieldType::Array),
            (ERRORS_KEY, ReducerType::Append, FieldType::Array),
        ] {
            if let Some(declared) = self.reducers.insert(key.to_string(), reducer) {
                if declared != reducer {
                    log::warn!(
                        "Ignoring reducer {:?} declared for reserved key '{}'",
                        declared,
                        key
                    );
                }
            }
            self.types.insert(key.to_string(), field_type);
        }
    }

    /// Seed a state with the request query
    pub fn with_query(schema: &StateSchema, query: &str) -> Self {
        let mut state = Self::new(schema);
        state.update(QUERY_KEY, Value::String(query.to_string()));
        state
    }

    /// Update a field using the appropriate reducer.
    ///
    /// Returns `false` when the value was rejected by the declared type.
    pub fn update(&mut self, key: &str, value: Value) -> bool {
        if let Some(field_type) = self.types.get(key) {
            if !field_type.accepts(&value) {
                log::warn!(
                    "Rejected write to '{}': expected {:?}, got {}",
                    key,
                    field_type,
                    value
                );
                return false;
            }
        }

        let reducer = self
            .reducers
            .get(key)
            .copied()
            .unwrap_or(ReducerType::Overwrite);

        match reducer {
            ReducerType::Overwrite => {
                self.fields.insert(key.to_string(), value);
            }
            ReducerType::Append => {
                let slot = self
                    .fields
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Array(vec![]));
                if !slot.is_array() {
                    let previous = slot.take();
                    *slot = Value::Array(if previous.is_null() {
                        vec![]
                    } else {
                        vec![previous]
                    });
                }
                if let Value::Array(items) = slot {
                    match value {
                        Value::Array(new_items) => items.extend(new_items),
                        other => items.push(other),
                    }
                }
            }
            ReducerType::Max | ReducerType::Min => {
                let Some(new) = value.as_f64() else {
                    return false;
                };
                let current = self.fields.get(key).and_then(|v| v.as_f64());
                let replace = match (reducer, current) {
                    (_, None) => true,
                    (ReducerType::Max, Some(cur)) => new > cur,
                    (_, Some(cur)) => new < cur,
                };
                if replace {
                    self.fields.insert(key.to_string(), value);
                }
            }
            ReducerType::Merge => {
                let slot = self
                    .fields
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                match (slot, value) {
                    (Value::Object(current), Value::Object(incoming)) => {
                        for (k, v) in incoming {
                            current.insert(k, v);
                        }
                    }
                    (slot, other) if slot.is_null() => *slot = other,
                    _ => return false,
                }
            }
            ReducerType::First => {
                let occupied = self.fields.get(key).is_some_and(|v| !v.is_null());
                if occupied || value.is_null() {
                    return false;
                }
                self.fields.insert(key.to_string(), value);
            }
        }
        true
    }

    /// Apply every write of an update; returns the keys that were written
    pub fn apply(&mut self, update: StateUpdate) -> Vec<String> {
        let mut written = Vec::new();
        for (key, value) in update {
            if key == QUERY_KEY && self.fields.contains_key(QUERY_KEY) {
                log::warn!("Dropped write to '{}': the request is immutable", QUERY_KEY);
                continue;
            }
            if self.update(&key, value) && !written.contains(&key) {
                written.push(key);
            }
        }
        written
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested field value using dot notation (e.g., "extracted.city")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    /// Non-empty string value at `path`, trimmed
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Numeric value at `path`
    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get_path(path).and_then(|v| v.as_f64())
    }

    /// String items of an array at `path`; a lone string counts as one item
    pub fn get_string_list(&self, path: &str) -> Vec<String> {
        match self.get_path(path) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
            _ => vec![],
        }
    }

    /// Whether `path` holds a meaningful value (not null, not a blank string)
    pub fn has(&self, path: &str) -> bool {
        match self.get_path(path) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// The request query
    pub fn query(&self) -> Option<&str> {
        self.get_str(QUERY_KEY)
    }

    /// Messages appended so far
    pub fn messages(&self) -> Vec<String> {
        self.get_string_list(MESSAGES_KEY)
    }

    /// Recorded node errors
    pub fn errors(&self) -> &[Value] {
        match self.fields.get(ERRORS_KEY) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// All field names, sorted
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for WorkflowState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
