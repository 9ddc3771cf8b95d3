// SPDX-License-Identifier: MIT

//! Output node: writes the final artifact once per run

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::adk::error::NodeError;
use crate::adk::text;
use crate::waypoint::workflow::artifact::{FinalArtifact, ARTIFACT_PATH_KEY, SUMMARY_KEY};
use crate::waypoint::workflow::node::Node;
use crate::waypoint::workflow::state::{StateUpdate, WorkflowState};

const SLUG_WORDS: usize = 6;
const MAX_SUFFIX: usize = 1000;

/// Persists the run's artifact as Markdown.
///
/// The file is named `<prefix>_<slug>.md`; existing files are never
/// overwritten, a `-2`, `-3`, ... suffix is added instead. Content goes to
/// a temporary file first and is renamed over the reserved name.
pub struct PersistNode {
    name: String,
    output_dir: PathBuf,
    prefix: String,
    persist: bool,
}

impl PersistNode {
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            name: name.into(),
            output_dir: output_dir.into(),
            prefix: text::slugify(prefix, 4).replace('-', "_"),
            persist: true,
        }
    }

    /// With `false` the artifact is only returned to the caller
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Create the first free `<stem>[-n].md` in the output directory
    async fn reserve(&self, stem: &str) -> Result<PathBuf, NodeError> {
        for n in 1..=MAX_SUFFIX {
            let file_name = if n == 1 {
                format!("{}.md", stem)
            } else {
                format!("{}-{}.md", stem, n)
            };
            let path = self.output_dir.join(file_name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(NodeError::InvalidOutput(format!(
            "no free file name for {} in {}",
            stem,
            self.output_dir.display()
        )))
    }

    async fn write_atomic(&self, target: &Path, content: &str) -> Result<(), NodeError> {
        let tmp = self
            .output_dir
            .join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl Node for PersistNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, NodeError> {
        if let Some(existing) = state.get_str(ARTIFACT_PATH_KEY) {
            return Err(NodeError::AlreadyPersisted(existing.to_string()));
        }

        let artifact = FinalArtifact::from_state(state);
        if !self.persist {
            log::info!("Node {}: persistence disabled, returning artifact", self.name);
            return Ok(StateUpdate::new().message(format!("[Document Ready] {}", artifact.title)));
        }

        fs::create_dir_all(&self.output_dir).await?;
        let slug_source = state.get_str(SUMMARY_KEY).unwrap_or(&artifact.title);
        let stem = format!("{}_{}", self.prefix, text::slugify(slug_source, SLUG_WORDS));

        let path = self.reserve(&stem).await?;
        if let Err(e) = self.write_atomic(&path, &artifact.to_markdown()).await {
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }

        let shown = path.display().to_string();
        log::info!("Node {} saved artifact to {}", self.name, shown);
        Ok(StateUpdate::new()
            .set(ARTIFACT_PATH_KEY, Value::String(shown.clone()))
            .message(format!("[Document Saved] Summary saved to {}", shown)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("waypoint-output-{}", uuid::Uuid::new_v4()))
    }

    fn summary_state() -> WorkflowState {
        let mut state = WorkflowState::empty();
        state.update("city", json!("Tokyo"));
        state.update(SUMMARY_KEY, json!("Tokyo in July is hot and humid!"));
        state
    }

    #[tokio::test]
    async fn test_writes_markdown() {
        let dir = temp_dir();
        let node = PersistNode::new("output", &dir, "travel summary");
        let update = node.run(&summary_state()).await.unwrap();

        let path = update.get(ARTIFACT_PATH_KEY).unwrap().as_str().unwrap().to_string();
        assert!(path.ends_with("travel_summary_tokyo-in-july-is-hot-and.md"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Travel Plan: Tokyo"));
        assert_eq!(
            update.get("messages"),
            Some(&json!(format!("[Document Saved] Summary saved to {}", path)))
        );

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_never_overwrites() {
        let dir = temp_dir();
        let node = PersistNode::new("output", &dir, "report");

        let first = node.run(&summary_state()).await.unwrap();
        let second = node.run(&summary_state()).await.unwrap();
        let first = first.get(ARTIFACT_PATH_KEY).unwrap().as_str().unwrap();
        let second = second.get(ARTIFACT_PATH_KEY).unwrap().as_str().unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("-2.md"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_refuses_second_persist_in_one_run() {
        let mut state = summary_state();
        state.update(ARTIFACT_PATH_KEY, json!("output/report_x.md"));

        let node = PersistNode::new("output", temp_dir(), "report");
        let err = node.run(&state).await.unwrap_err();
        assert!(matches!(err, NodeError::AlreadyPersisted(p) if p == "output/report_x.md"));
    }

    #[tokio::test]
    async fn test_persist_disabled() {
        let dir = temp_dir();
        let node = PersistNode::new("output", &dir, "report").persist(false);
        let update = node.run(&summary_state()).await.unwrap();
        assert!(update.get(ARTIFACT_PATH_KEY).is_none());
        assert!(!dir.exists());
    }
}
