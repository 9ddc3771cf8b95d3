// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Schema declaring the reducers and defaults of workflow state keys
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StateSchema {
    #[serde(flatten)]
    pub fields: HashMap<String, StateFieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateFieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub reducer: ReducerType,
    pub default: Option<Value>,
}

/// Supported field types
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// No type check
    Any,
}

impl FieldType {
    /// Whether `value` fits this type; `null` always fits
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (FieldType::Any, _) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            // append reducers accept single items as well as arrays
            (FieldType::Array, _) => true,
            (FieldType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Replace the value (default)
    #[default]
    Overwrite,
    /// Append to array
    Append,
    /// Keep maximum value
    Max,
    /// Keep minimum value
    Min,
    /// Shallow merge objects
    Merge,
    /// Keep the first non-null value written
    First,
}

impl StateSchema {
    /// Add or replace a field definition
    pub fn field(mut self, name: &str, field_type: FieldType, reducer: ReducerType) -> Self {
        self.fields.insert(
            name.to_string(),
            StateFieldDef {
                field_type,
                reducer,
                default: None,
            },
        );
        self
    }
}
