// SPDX-License-Identifier: MIT

//! Workflow definitions bundled with the binary

use crate::adk::error::{Result, WorkflowError};
use crate::waypoint::workflow::loader::WorkflowLoader;
use crate::waypoint::workflow::types::WorkflowDefinition;

pub const TRAVEL_PLANNER: &str = "travel_planner";
pub const RESEARCH_AGENT: &str = "research_agent";
pub const ASSISTANT: &str = "assistant";

const PRESETS: &[(&str, &str)] = &[
    (
        TRAVEL_PLANNER,
        include_str!("../../../workflows/travel_planner.yaml"),
    ),
    (
        RESEARCH_AGENT,
        include_str!("../../../workflows/research_agent.yaml"),
    ),
    (ASSISTANT, include_str!("../../../workflows/assistant.yaml")),
];

/// Names of the bundled workflows
pub fn names() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}

/// YAML source of a bundled workflow
pub fn source(name: &str) -> Option<&'static str> {
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, yaml)| *yaml)
}

/// Parsed definition of a bundled workflow
pub fn definition(name: &str) -> Result<WorkflowDefinition> {
    let yaml = source(name).ok_or_else(|| WorkflowError::FileNotFound(name.to_string()))?;
    WorkflowLoader::parse_yaml(yaml)
}
