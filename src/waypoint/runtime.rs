// SPDX-License-Identifier: MIT

//! Process-wide collaborators shared by the CLI and the HTTP server

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adk::error::{ModelError, Result, WorkflowError};
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::waypoint::config::Config;
use crate::waypoint::nodes::{FieldPrompter, NoPrompter};
use crate::waypoint::tools;
use crate::waypoint::workflow::graph::CompiledGraph;
use crate::waypoint::workflow::types::WorkflowDefinition;
use crate::waypoint::workflow::{
    create_model, presets, NodeServices, ToolRegistry, WorkflowBuilder, WorkflowLoader,
};

/// Config, HTTP client, tools and model, created once per process.
///
/// Workflows are looked up by id: a `<id>.yaml` file in the workflows
/// directory wins over a bundled preset of the same name.
pub struct Runtime {
    config: Arc<Config>,
    tools: ToolRegistry,
    model: Option<Arc<dyn Model>>,
}

impl Runtime {
    /// Register the configured tools and create the model.
    ///
    /// A model that cannot be created (unknown provider, missing key) is
    /// logged; workflows using model-backed nodes then fail to build.
    pub async fn new(
        config: Config,
        provider: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<Self> {
        let client = config.http_client()?;
        let registry = ToolRegistry::new();
        tools::register_builtin_tools(&registry, &config, &client).await;

        let model = match create_model(&config, client, provider, model_name) {
            Ok(model) => {
                log::info!("Using model {}", model.model_name());
                Some(model)
            }
            Err(e) => {
                log::warn!("No model available: {}", e);
                None
            }
        };

        Ok(Self::with_parts(config, registry, model))
    }

    /// Assemble from prepared parts
    pub fn with_parts(config: Config, tools: ToolRegistry, model: Option<Arc<dyn Model>>) -> Self {
        Self {
            config: Arc::new(config),
            tools,
            model,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn services(&self, prompter: Arc<dyn FieldPrompter>) -> NodeServices {
        NodeServices::new(self.config.clone(), self.model.clone(), self.tools.clone())
            .with_prompter(prompter)
    }

    fn workflow_file(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return None;
        }
        ["yaml", "yml"]
            .iter()
            .map(|ext| self.config.workflows_dir.join(format!("{}.{}", id, ext)))
            .find(|p| p.is_file())
    }

    /// Ids of bundled and on-disk workflows, sorted
    pub fn workflow_ids(&self) -> Vec<String> {
        let mut ids: BTreeSet<String> = presets::names().into_iter().map(str::to_string).collect();
        match WorkflowLoader::new().list_workflows(&self.config.workflows_dir) {
            Ok(files) => ids.extend(
                files
                    .iter()
                    .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
                    .map(str::to_string),
            ),
            Err(e) => log::warn!("Could not list workflows: {}", e),
        }
        ids.into_iter().collect()
    }

    /// Definition of workflow `id`
    pub fn definition(&self, id: &str) -> Result<WorkflowDefinition> {
        match self.workflow_file(id) {
            Some(path) => WorkflowLoader::new().load_workflow(path),
            None if presets::source(id).is_some() => presets::definition(id),
            None => Err(WorkflowError::FileNotFound(id.to_string()).into()),
        }
    }

    /// Build workflow `id` with the given prompter for missing fields
    pub fn build(&self, id: &str, prompter: Arc<dyn FieldPrompter>) -> Result<CompiledGraph> {
        let def = self.definition(id)?;
        Ok(WorkflowBuilder::new(self.services(prompter)).build(&def)?)
    }

    /// Mermaid diagram of workflow `id` (or of the file at `path`).
    ///
    /// Builds without needing a configured model.
    pub fn diagram(&self, id: &str, path: Option<&std::path::Path>) -> Result<String> {
        let mut services = self.services(Arc::new(NoPrompter));
        if services.model.is_none() {
            services.model = Some(Arc::new(OfflineModel));
        }
        let builder = WorkflowBuilder::new(services);
        let graph = match path {
            Some(path) => builder.build_file(path)?,
            None => builder.build(&self.definition(id)?)?,
        };
        Ok(graph.to_mermaid())
    }

    /// Build a workflow from an arbitrary file path
    pub fn build_file(
        &self,
        path: &std::path::Path,
        prompter: Arc<dyn FieldPrompter>,
    ) -> Result<CompiledGraph> {
        WorkflowBuilder::new(self.services(prompter)).build_file(path)
    }
}

/// Stand-in for diagrams when no provider is configured; never called
struct OfflineModel;

#[async_trait]
impl Model for OfflineModel {
    fn model_name(&self) -> &str {
        "offline"
    }

    async fn generate_content(
        &self,
        _history: &[Content],
        _config: Option<&GenerationConfig>,
    ) -> std::result::Result<Content, ModelError> {
        Err(ModelError::ApiKeyMissing("offline".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::WaypointError;

    fn runtime(workflows_dir: PathBuf) -> Runtime {
        let config = Config {
            workflows_dir,
            ..Config::default()
        };
        Runtime::with_parts(config, ToolRegistry::new(), None)
    }

    #[test]
    fn test_file_overrides_preset() {
        let dir = std::env::temp_dir().join(format!("waypoint-rt-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("research_agent.yaml"),
            "name: local_research\nentry: a\nnodes:\n  - { id: a, kind: itinerary }\n",
        )
        .unwrap();

        let rt = runtime(dir.clone());
        assert_eq!(rt.definition("research_agent").unwrap().name, "local_research");
        assert_eq!(rt.definition("assistant").unwrap().name, "assistant");
        assert_eq!(
            rt.workflow_ids(),
            vec!["assistant", "research_agent", "travel_planner"]
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unknown_and_unsafe_ids() {
        let rt = runtime(PathBuf::from("does-not-exist"));
        for id in ["nope", "../secrets", ".hidden"] {
            assert!(matches!(
                rt.definition(id),
                Err(WaypointError::Workflow(WorkflowError::FileNotFound(_)))
            ));
        }
    }

    #[test]
    fn test_model_nodes_fail_without_model() {
        let rt = runtime(PathBuf::from("does-not-exist"));
        assert!(!rt.has_model());
        let err = rt.build("research_agent", Arc::new(NoPrompter)).err().unwrap();
        assert!(err.to_string().contains("needs a model"));

        let mermaid = rt.diagram("research_agent", None).unwrap();
        assert!(mermaid.contains("supervisor -. medical .-> medical_research"));
    }
}
