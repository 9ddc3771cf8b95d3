// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateSchema` - declares reducers, types and defaults of state keys
//! - `WorkflowState` - runtime state storage with reducer support
//! - `StateUpdate` - the writes a node hands back to the executor

mod schema;
mod store;
mod update;

pub use schema::{FieldType, ReducerType, StateFieldDef, StateSchema};
pub use store::{WorkflowState, ERRORS_KEY, MESSAGES_KEY, QUERY_KEY};
pub use update::StateUpdate;
