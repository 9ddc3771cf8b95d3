//! Workflow loader - YAML file loading and parsing
//!
//! This module handles loading workflow definitions from YAML files.

use super::types::WorkflowDefinition;
use crate::adk::error::{Result, WaypointError, WorkflowError};
use std::fs;
use std::path::{Path, PathBuf};

/// Loads workflow definitions from YAML files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(WorkflowError::FileNotFound(path.display().to_string()).into());
        }
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition> {
        let def: WorkflowDefinition = serde_yaml::from_str(content)?;
        if def.nodes.is_empty() {
            return Err(WaypointError::config(format!(
                "workflow '{}' declares no nodes",
                def.name
            )));
        }
        Ok(def)
    }

    /// `.yaml`/`.yml` files in `dir`, sorted; a missing directory is empty
    pub fn list_workflows<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(vec![]);
        }
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::workflow::node::OnError;

    #[test]
    fn test_parse_routed_workflow() {
        let yaml = r#"
name: research_agent
description: "Supervisor with research workers"
entry: supervisor

nodes:
  - id: supervisor
    kind: classify
    params:
      default: general
  - id: medical_research
    kind: research
    params: { domain: medical }
  - id: general_research
    kind: research
    params: { domain: general }
    on_error: halt

edges:
  - from: supervisor
    route:
      on: topic
      branches:
        medical: medical_research
      default: general_research
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(def.name, "research_agent");
        assert_eq!(def.entry, "supervisor");
        assert_eq!(def.nodes.len(), 3);
        assert_eq!(def.node("general_research").unwrap().on_error, OnError::Halt);
        assert_eq!(def.nodes[1].params["domain"], "medical");
        assert_eq!(def.edges.len(), 1);
        assert!(def.state.is_none());
    }

    #[test]
    fn test_parse_state_and_when_rules() {
        let yaml = r#"
name: gated
entry: a
state:
  attempts:
    type: number
    reducer: max
nodes:
  - id: a
    kind: hotel_estimate
  - id: b
    kind: itinerary
edges:
  - from: a
    route:
      when:
        - when: "hotel_cost > 100"
          to: b
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        let state = def.state.unwrap();
        assert!(state.fields.contains_key("attempts"));
        let route = def.edges[0].route.as_ref().unwrap();
        assert_eq!(route.when[0].to, "b");
    }

    #[test]
    fn test_missing_file() {
        let err = WorkflowLoader::new()
            .load_workflow("does/not/exist.yaml")
            .unwrap_err();
        assert!(matches!(
            err,
            WaypointError::Workflow(WorkflowError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let yaml = r#"
name:
  - invalid structure
"#;
        assert!(WorkflowLoader::parse_yaml(yaml).is_err());
        assert!(WorkflowLoader::parse_yaml("name: x\nentry: a\nnodes: []").is_err());
    }

    #[test]
    fn test_list_workflows() {
        let dir = std::env::temp_dir().join(format!("waypoint-loader-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b.yaml"), "").unwrap();
        fs::write(dir.join("a.yml"), "").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();

        let files = WorkflowLoader::new().list_workflows(&dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml", "b.yaml"]);

        fs::remove_dir_all(&dir).unwrap();
        assert!(WorkflowLoader::new().list_workflows(&dir).unwrap().is_empty());
    }
}
