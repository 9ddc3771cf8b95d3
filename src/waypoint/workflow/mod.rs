// SPDX-License-Identifier: MIT

pub mod artifact;
pub mod builder;
pub mod condition;
pub mod graph;
pub mod loader;
pub mod node;
pub mod node_factory;
pub mod presets;
pub mod registry;
pub mod state;
pub mod types;

pub use artifact::FinalArtifact;
pub use builder::WorkflowBuilder;
pub use loader::WorkflowLoader;
pub use node::{Node, OnError};
pub use node_factory::{create_model, NodeFactory, NodeServices};
pub use registry::ToolRegistry;
